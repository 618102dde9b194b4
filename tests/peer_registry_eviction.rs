mod common;

use common::MockPeer;
use std::time::Duration;

/// A second peer claiming the same hostname evicts the first: the first's
/// connection is closed and the registry lookup resolves to the new one.
#[tokio::test]
async fn reconnecting_under_the_same_hostname_evicts_the_prior_peer() {
    let gateway = common::start().await;

    let first = MockPeer::connect(&gateway.ws_url(), "dupe.example").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let first_peer = gateway.state.peers.lookup("dupe.example").await.unwrap();
    assert!(!first_peer.is_closed());

    let _second = MockPeer::connect(&gateway.ws_url(), "dupe.example").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(first_peer.is_closed());
    let current = gateway.state.peers.lookup("dupe.example").await.unwrap();
    assert!(!std::sync::Arc::ptr_eq(&current, &first_peer));

    drop(first);
}
