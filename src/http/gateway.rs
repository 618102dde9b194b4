//! C9: the public HTTP surface — any method, any path, any bound hostname.
//!
//! This is the gateway's sole fallback route; `/_tunnelgate/*` paths are
//! matched first by their own explicit routes and never reach here.

use crate::dispatch::{self, DispatchRequest, BUFFERED_DEADLINE};
use crate::error::GatewayError;
use crate::registry::normalize_hostname;
use crate::state::GatewayState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use gw_protocol::ResponseMode;

pub async fn handle(
    State(state): State<GatewayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(hostname) = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(normalize_hostname)
    else {
        return GatewayError::BadRequest.into_response();
    };

    let Some(peer) = state.peers.lookup(&hostname).await else {
        return GatewayError::NoPeer(hostname).into_response();
    };

    let response_mode = dispatch::choose_response_mode(&headers);
    let deadline = match response_mode {
        ResponseMode::Buffer => Some(BUFFERED_DEADLINE),
        ResponseMode::Stream => None,
    };
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned());

    let req = DispatchRequest {
        hostname,
        method,
        url,
        headers,
        body,
        response_mode,
        deadline,
    };

    dispatch::run(req, peer, state.log_recorder.clone()).await
}
