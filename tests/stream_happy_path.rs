mod common;

use common::MockPeer;
use futures_util::StreamExt;
use gw_protocol::{Frame, ForwardedResponseStreamChunk, ForwardedResponseStreamStart};
use std::collections::HashMap;

#[tokio::test]
async fn event_stream_accept_header_gets_chunks_as_they_arrive() {
    let gateway = common::start().await;
    let mut peer = MockPeer::connect(&gateway.ws_url(), "events.example").await;

    let client = reqwest::Client::new();
    let request = tokio::spawn({
        let base_url = gateway.base_url();
        async move {
            client
                .get(format!("{base_url}/stream"))
                .header(reqwest::header::HOST, "events.example")
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
    assert_eq!(forwarded.response_mode, gw_protocol::ResponseMode::Stream);

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

    let mut response = request.await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(!response.headers().contains_key("content-length"));

    peer.send(&Frame::ForwardedResponseStreamChunk(
        ForwardedResponseStreamChunk {
            request_id: forwarded.request_id.clone(),
            body_b64: "Zmlyc3Q=".to_owned(), // "first"
            is_final: false,
        },
    ))
    .await;
    peer.send(&Frame::ForwardedResponseStreamChunk(
        ForwardedResponseStreamChunk {
            request_id: forwarded.request_id.clone(),
            body_b64: "c2Vjb25k".to_owned(), // "second"
            is_final: true,
        },
    ))
    .await;

    let mut collected = Vec::new();
    while let Some(chunk) = response.chunk().await.unwrap() {
        collected.extend_from_slice(&chunk);
    }
    assert_eq!(String::from_utf8(collected).unwrap(), "firstsecond");
}
