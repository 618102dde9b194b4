mod common;

use common::MockPeer;
use std::time::Duration;
use tunnelgate::dispatch::{self, DispatchRequest};

/// Exercises the deadline branch of `dispatch::run` directly with a short
/// deadline rather than waiting out the real 10-minute `BUFFERED_DEADLINE`.
#[tokio::test]
async fn a_buffered_dispatch_that_never_gets_a_response_times_out() {
    let gateway = common::start().await;
    let _peer_conn = MockPeer::connect(&gateway.ws_url(), "slow.example").await;
    // Give the peer a moment to land in the registry before looking it up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let peer = gateway.state.peers.lookup("slow.example").await.unwrap();

    let req = DispatchRequest {
        hostname: "slow.example".to_owned(),
        method: axum::http::Method::GET,
        url: "/never-answered".to_owned(),
        headers: axum::http::HeaderMap::new(),
        body: axum::body::Bytes::new(),
        response_mode: gw_protocol::ResponseMode::Buffer,
        deadline: Some(Duration::from_millis(200)),
    };

    let response = dispatch::run(req, peer, gateway.state.log_recorder.clone()).await;
    assert_eq!(response.status(), 504);
}
