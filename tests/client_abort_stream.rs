mod common;

use common::MockPeer;
use gw_protocol::{Frame, ForwardedResponseStreamChunk, ForwardedResponseStreamStart};
use std::collections::HashMap;
use std::time::Duration;

/// When the client drops an in-flight SSE response, the gateway must notice
/// and send `cancelForwardedRequest` rather than leave the dispatch dangling.
#[tokio::test]
async fn dropping_the_client_response_sends_a_cancel_frame() {
    let gateway = common::start().await;
    let mut peer = MockPeer::connect(&gateway.ws_url(), "abort.example").await;

    let client = reqwest::Client::new();
    let request = tokio::spawn({
        let base_url = gateway.base_url();
        async move {
            client
                .get(format!("{base_url}/stream"))
                .header(reqwest::header::HOST, "abort.example")
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await
                .unwrap()
        }
    });

    let forwarded = match peer.recv().await {
        Frame::ForwardedRequest(req) => req,
        other => panic!("expected forwardedRequest, got {other:?}"),
    };

    let mut headers = HashMap::new();
    headers.insert(
        "Content-Type".to_owned(),
        vec!["text/event-stream".to_owned()],
    );
    peer.send(&Frame::ForwardedResponseStreamStart(
        ForwardedResponseStreamStart {
            request_id: forwarded.request_id.clone(),
            status_code: 200,
            headers,
        },
    ))
    .await;

    let response = request.await.unwrap();
    assert_eq!(response.status(), 200);
    // Drop the client's in-flight response without reading the body, then
    // send a chunk: the stream forwarding task should see the send fail and
    // cancel.
    drop(response);

    peer.send(&Frame::ForwardedResponseStreamChunk(
        ForwardedResponseStreamChunk {
            request_id: forwarded.request_id.clone(),
            body_b64: "bW9yZQ==".to_owned(),
            is_final: false,
        },
    ))
    .await;

    let cancel = tokio::time::timeout(Duration::from_secs(5), peer.recv())
        .await
        .expect("expected a cancelForwardedRequest within 5s");
    match cancel {
        Frame::CancelForwardedRequest(cancel) => {
            assert_eq!(cancel.request_id, forwarded.request_id);
        }
        other => panic!("expected cancelForwardedRequest, got {other:?}"),
    }
}
