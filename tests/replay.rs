mod common;

use common::MockPeer;
use gw_protocol::{Frame, ForwardedResponse};
use std::collections::HashMap;
use std::time::Duration;

#[tokio::test]
async fn replaying_a_logged_exchange_reissues_it_to_the_current_peer() {
    let gateway = common::start().await;
    gateway
        .state
        .credential_store
        .upsert("replay.example", "s3cret")
        .await
        .unwrap();
    let mut peer = MockPeer::connect(&gateway.ws_url(), "replay.example").await;

    let client = reqwest::Client::new();
    let original = tokio::spawn({
        let base_url = gateway.base_url();
        async move {
            client
                .post(format!("{base_url}/submit"))
                .header(reqwest::header::HOST, "replay.example")
                .body("payload")
                .send()
                .await
                .unwrap()
        }
    });

    let forwarded = match peer.recv().await {
        Frame::ForwardedRequest(req) => req,
        other => panic!("expected forwardedRequest, got {other:?}"),
    };
    peer.send(&Frame::ForwardedResponse(ForwardedResponse {
        request_id: forwarded.request_id,
        status_code: 201,
        headers: HashMap::new(),
        body_b64: String::new(),
    }))
    .await;
    let response = original.await.unwrap();
    assert_eq!(response.status(), 201);

    let logged = gateway
        .state
        .log_store
        .find_recent_by_hostname("replay.example", 1)
        .await
        .unwrap();
    let log_id = logged[0].id;

    let client = reqwest::Client::new();
    let replay = tokio::spawn({
        let base_url = gateway.base_url();
        async move {
            client
                .post(format!("{base_url}/_tunnelgate/inspect"))
                .header(reqwest::header::HOST, "replay.example")
                .form(&[
                    ("token", "s3cret"),
                    ("action", "replay"),
                    ("logId", &log_id.to_string()),
                ])
                .send()
                .await
                .unwrap()
        }
    });

    let replayed = tokio::time::timeout(Duration::from_secs(5), peer.recv())
        .await
        .expect("expected the replayed request within 5s");
    let replayed = match replayed {
        Frame::ForwardedRequest(req) => req,
        other => panic!("expected forwardedRequest, got {other:?}"),
    };
    assert_eq!(replayed.url, "/submit");
    assert_eq!(replayed.method, "POST");

    peer.send(&Frame::ForwardedResponse(ForwardedResponse {
        request_id: replayed.request_id,
        status_code: 201,
        headers: HashMap::new(),
        body_b64: String::new(),
    }))
    .await;

    let response = replay.await.unwrap();
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Replayed POST /submit (status 201)"));
}
