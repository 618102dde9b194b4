//! C4: the request dispatcher state machine (spec §4.4).
//!
//! One call to [`run`] owns exactly one forwarded request end to end: it
//! issues the `forwardedRequest` frame, waits on the peer's reply frame(s),
//! and writes the HTTP response. Grounded on the teacher's `ws_forwarder.rs`
//! `tokio::select!` session loop for the race between inbound frames, peer
//! loss, and a deadline, and on `http/sse.rs`'s channel-backed streaming
//! response for the stream-mode body.
//!
//! Client-abort detection has two layers, both needed because axum/hyper has
//! no synchronous "the client hung up" signal:
//!
//! - [`Guard`]'s `Drop` impl is the general fallback: if this dispatch's
//!   future is dropped before it reaches a terminal state (because the
//!   underlying connection errored out and hyper dropped the handler), the
//!   guard unsubscribes from the peer and, for stream-mode dispatches, sends
//!   `cancelForwardedRequest`.
//! - For an already-streaming response, chunks are written through an mpsc
//!   channel backing the response body; a failed `send` means hyper already
//!   dropped the body receiver, which is a faster and more precise signal
//!   than waiting on `Guard::drop`. That path marks the dispatch terminated
//!   itself so the guard's fallback does not double-fire.

use crate::error::GatewayError;
use crate::headers::{
    canonicalize_request_headers, inject_forwarded_for, sanitize_response_headers,
    to_axum_header_map, to_json,
};
use crate::log_recorder::LogRecorderHandle;
use crate::peer::Peer;
use crate::store::{NewRequestLog, STREAMED_BODY_SENTINEL};
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap as AxumHeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD, Engine};
use gw_protocol::{CancelForwardedRequest, Frame, ForwardedRequest, HeaderMap, ResponseMode};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use uuid::Uuid;

/// No response received within this long and a buffered dispatch gives up.
pub const BUFFERED_DEADLINE: Duration = Duration::from_secs(600);
/// Deadline used for replayed requests (spec §4.6).
pub const REPLAY_DEADLINE: Duration = Duration::from_secs(30);

/// Everything needed to forward one inbound HTTP request to a peer.
pub struct DispatchRequest {
    pub hostname: String,
    pub method: Method,
    pub url: String,
    pub headers: AxumHeaderMap,
    pub body: Bytes,
    pub response_mode: ResponseMode,
    /// `None` disables the deadline entirely (used by stream mode, which has
    /// none per spec).
    pub deadline: Option<Duration>,
}

fn accepts_event_stream(headers: &AxumHeaderMap) -> bool {
    headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.to_ascii_lowercase().contains("text/event-stream"))
}

/// Choose buffered vs. streamed per spec §4.4: an `Accept: text/event-stream`
/// request gets a streamed response; everything else is buffered.
pub fn choose_response_mode(headers: &AxumHeaderMap) -> ResponseMode {
    if accepts_event_stream(headers) {
        ResponseMode::Stream
    } else {
        ResponseMode::Buffer
    }
}

/// RAII cleanup for a dispatch that never reaches a terminal state on its
/// own — see the module docs.
struct Guard {
    peer: Arc<Peer>,
    request_id: String,
    response_mode: ResponseMode,
    terminated: Arc<AtomicBool>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        if self.terminated.load(Ordering::SeqCst) {
            return;
        }
        let peer = self.peer.clone();
        let request_id = self.request_id.clone();
        let mode = self.response_mode;
        tokio::spawn(async move {
            if mode == ResponseMode::Stream {
                let _ = peer.send(Frame::CancelForwardedRequest(CancelForwardedRequest {
                    request_id: request_id.clone(),
                }));
            }
            peer.unsubscribe(&request_id).await;
        });
    }
}

/// Forward `req` to `peer` and drive it to an HTTP response.
///
/// On success where a peer response was actually delivered to the client,
/// the exchange is enqueued on `log_recorder` for persistence — for a
/// buffered response before `run` returns, for a streamed one once the
/// stream itself finishes, which can be well after `run` has returned the
/// response to the caller.
pub async fn run(req: DispatchRequest, peer: Arc<Peer>, log_recorder: LogRecorderHandle) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let request_headers = canonicalize_request_headers(&req.headers);
    let request_body_b64 = if req.body.is_empty() {
        String::new()
    } else {
        STANDARD.encode(&req.body)
    };

    let rx = peer.subscribe(&request_id).await;
    let terminated = Arc::new(AtomicBool::new(false));
    let guard = Guard {
        peer: peer.clone(),
        request_id: request_id.clone(),
        response_mode: req.response_mode,
        terminated: terminated.clone(),
    };

    let frame = Frame::ForwardedRequest(ForwardedRequest {
        request_id: request_id.clone(),
        url: req.url.clone(),
        method: req.method.to_string(),
        headers: request_headers.clone(),
        body_b64: request_body_b64.clone(),
        response_mode: req.response_mode,
    });

    if peer.send(frame).is_err() {
        terminated.store(true, Ordering::SeqCst);
        drop(guard);
        peer.unsubscribe(&request_id).await;
        return GatewayError::SendFailure.into_response();
    }

    let ctx = RequestContext {
        hostname: req.hostname,
        method: req.method.to_string(),
        path: req.url,
        request_headers,
        request_body_b64,
    };

    match req.response_mode {
        ResponseMode::Buffer => {
            run_buffered(peer, request_id, rx, req.deadline, terminated, guard, ctx, log_recorder).await
        }
        ResponseMode::Stream => run_stream(peer, request_id, rx, terminated, guard, ctx, log_recorder).await,
    }
}

/// Fields needed to build a `NewRequestLog` once a response arrives, kept
/// together so they can be threaded through the buffered/stream branches
/// without re-deriving them.
struct RequestContext {
    hostname: String,
    method: String,
    path: String,
    request_headers: HeaderMap,
    request_body_b64: String,
}

impl RequestContext {
    fn into_log(self, status: i32, response_headers: &HeaderMap, response_body: String) -> NewRequestLog {
        NewRequestLog {
            hostname: self.hostname,
            path: self.path,
            method: self.method,
            request_headers: to_json(&self.request_headers),
            request_body: self.request_body_b64,
            response_status: Some(status),
            response_headers: to_json(response_headers),
            response_body,
        }
    }
}

async fn run_buffered(
    peer: Arc<Peer>,
    request_id: String,
    mut rx: mpsc::UnboundedReceiver<Frame>,
    deadline: Option<Duration>,
    terminated: Arc<AtomicBool>,
    guard: Guard,
    ctx: RequestContext,
    log_recorder: LogRecorderHandle,
) -> Response {
    let mut closed_rx = peer.closed_signal();
    let sleep = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(Frame::ForwardedResponse(resp)) => {
                    terminated.store(true, Ordering::SeqCst);
                    drop(guard);
                    peer.unsubscribe(&request_id).await;

                    let body_bytes = STANDARD.decode(resp.body_b64.as_bytes()).unwrap_or_default();
                    let mut headers = sanitize_response_headers(&resp.headers, ResponseMode::Buffer, body_bytes.len());
                    inject_forwarded_for(&mut headers, peer.remote_ip());
                    let status = StatusCode::from_u16(resp.status_code).unwrap_or(StatusCode::BAD_GATEWAY);

                    let log = ctx.into_log(i32::from(resp.status_code), &headers, resp.body_b64);
                    log_recorder.enqueue(log).await;

                    let mut response = Response::new(Body::from(body_bytes));
                    *response.status_mut() = status;
                    *response.headers_mut() = to_axum_header_map(&headers);
                    return response;
                }
                Some(_) => continue, // unexpected frame shape for buffered mode: dropped, non-fatal
                None => {
                    terminated.store(true, Ordering::SeqCst);
                    drop(guard);
                    return GatewayError::PeerGone.into_response();
                }
            },
            _ = closed_rx.recv() => {
                terminated.store(true, Ordering::SeqCst);
                drop(guard);
                peer.unsubscribe(&request_id).await;
                return GatewayError::PeerGone.into_response();
            }
            () = &mut sleep => {
                terminated.store(true, Ordering::SeqCst);
                drop(guard);
                peer.unsubscribe(&request_id).await;
                return GatewayError::Timeout.into_response();
            }
        }
    }
}

async fn run_stream(
    peer: Arc<Peer>,
    request_id: String,
    mut rx: mpsc::UnboundedReceiver<Frame>,
    terminated: Arc<AtomicBool>,
    guard: Guard,
    ctx: RequestContext,
    log_recorder: LogRecorderHandle,
) -> Response {
    let mut closed_rx = peer.closed_signal();

    let (status, mut headers) = loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(Frame::ForwardedResponseStreamStart(start)) => {
                    let status = StatusCode::from_u16(start.status_code).unwrap_or(StatusCode::BAD_GATEWAY);
                    let headers = sanitize_response_headers(&start.headers, ResponseMode::Stream, 0);
                    break (status, headers);
                }
                Some(_) => continue, // chunk/duplicate-start/buffered response before a start: dropped
                None => {
                    terminated.store(true, Ordering::SeqCst);
                    drop(guard);
                    return GatewayError::PeerGone.into_response();
                }
            },
            _ = closed_rx.recv() => {
                terminated.store(true, Ordering::SeqCst);
                drop(guard);
                peer.unsubscribe(&request_id).await;
                return GatewayError::PeerGone.into_response();
            }
        }
    };

    inject_forwarded_for(&mut headers, peer.remote_ip());
    let axum_headers = to_axum_header_map(&headers);

    let (body_tx, body_rx) = mpsc::channel::<Result<Bytes, Infallible>>(16);
    let mut response = Response::new(Body::from_stream(ReceiverStream::new(body_rx)));
    *response.status_mut() = status;
    *response.headers_mut() = axum_headers;

    let status_for_log = i32::from(status.as_u16());

    // The HTTP response has now been committed; everything past this point
    // runs detached from the request handler, so `guard` moves into this
    // task rather than staying on `run`'s own stack.
    tokio::spawn(async move {
        let _guard = guard;
        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(Frame::ForwardedResponseStreamChunk(chunk)) => {
                        let data = STANDARD.decode(chunk.body_b64.as_bytes()).unwrap_or_default();
                        if !data.is_empty() && body_tx.send(Ok(Bytes::from(data))).await.is_err() {
                            // Client disconnected mid-stream: body receiver dropped.
                            terminated.store(true, Ordering::SeqCst);
                            let _ = peer.send(Frame::CancelForwardedRequest(CancelForwardedRequest {
                                request_id: request_id.clone(),
                            }));
                            peer.unsubscribe(&request_id).await;
                            return;
                        }
                        if chunk.is_final {
                            terminated.store(true, Ordering::SeqCst);
                            peer.unsubscribe(&request_id).await;
                            drop(body_tx);
                            let log = ctx.into_log(status_for_log, &headers, STREAMED_BODY_SENTINEL.to_owned());
                            log_recorder.enqueue(log).await;
                            return;
                        }
                    }
                    Some(_) => continue, // duplicate start / stray buffered response: dropped
                    None => {
                        terminated.store(true, Ordering::SeqCst);
                        peer.unsubscribe(&request_id).await;
                        return;
                    }
                },
                _ = closed_rx.recv() => {
                    // Peer lost after headers already committed: end the body,
                    // we cannot change the status line at this point.
                    terminated.store(true, Ordering::SeqCst);
                    peer.unsubscribe(&request_id).await;
                    return;
                }
            }
        }
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_mode_chosen_only_for_event_stream_accept_header() {
        let mut headers = AxumHeaderMap::new();
        headers.insert(axum::http::header::ACCEPT, "text/event-stream".parse().unwrap());
        assert_eq!(choose_response_mode(&headers), ResponseMode::Stream);

        let mut headers = AxumHeaderMap::new();
        headers.insert(axum::http::header::ACCEPT, "application/json".parse().unwrap());
        assert_eq!(choose_response_mode(&headers), ResponseMode::Buffer);

        assert_eq!(choose_response_mode(&AxumHeaderMap::new()), ResponseMode::Buffer);
    }
}
