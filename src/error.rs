//! The error taxonomy (spec §7) and its mapping onto HTTP responses.
//!
//! `DecodeFailure` and `StoreFailure` are deliberately not represented here:
//! the former never escapes the frame-handling loop it occurred in, and the
//! latter is logged and swallowed by the log recorder. Both are local,
//! non-fatal events, not dispatch outcomes.

use crate::http::response::json_error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing or malformed Host header")]
    BadRequest,
    #[error("no peer bound for hostname {0}")]
    NoPeer(String),
    #[error("peer disconnected mid-request")]
    PeerGone,
    #[error("failed to forward request to peer")]
    SendFailure,
    #[error("buffered dispatch timed out waiting for a response")]
    Timeout,
    #[error("client disconnected before a response was available")]
    ClientAbort,
    #[error("authentication token missing")]
    AuthMissing,
    #[error("authentication token invalid")]
    AuthInvalid,
    #[error("replay target not found")]
    NotFound,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::BadRequest => {
                json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string())
            }
            GatewayError::NoPeer(hostname) => json_error(
                StatusCode::NOT_FOUND,
                "NO_PEER",
                format!("no tunnel is currently connected for {hostname}"),
            ),
            GatewayError::PeerGone | GatewayError::SendFailure => {
                json_error(StatusCode::BAD_GATEWAY, "PEER_GONE", self.to_string())
            }
            GatewayError::Timeout => {
                json_error(StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", self.to_string())
            }
            GatewayError::ClientAbort => {
                // Never actually written to a client (the client is gone), kept
                // for completeness of the taxonomy / for log recorder bookkeeping.
                json_error(StatusCode::BAD_REQUEST, "CLIENT_ABORT", self.to_string())
            }
            GatewayError::AuthMissing | GatewayError::AuthInvalid => {
                json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            GatewayError::NotFound => {
                json_error(StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string())
            }
        }
    }
}
