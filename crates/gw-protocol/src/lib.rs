//! gw-protocol: control-channel message types and wire serialization.
//!
//! All control-channel messages use a top-level `type` field for discriminated
//! deserialization. Bodies are base64-encoded text so they survive a text
//! (JSON) transport unmodified. Header maps accept either a bare string or an
//! array of strings per header name on the wire, normalized to `Vec<String>`
//! once parsed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Header map as carried on the wire: string -> string-or-string-list.
pub type HeaderMap = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Buffer,
    Stream,
}

/// A fresh, collision-resistant opaque identifier correlating a forwarded
/// request with its eventual response frame(s).
pub type RequestId = String;

/// Gateway -> peer: forward an inbound public HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedRequest {
    pub request_id: RequestId,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: HeaderMap,
    #[serde(default)]
    pub body_b64: String,
    pub response_mode: ResponseMode,
}

/// Peer -> gateway: a complete, buffered response to a forwarded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedResponse {
    pub request_id: RequestId,
    pub status_code: u16,
    #[serde(default)]
    pub headers: HeaderMap,
    #[serde(default)]
    pub body_b64: String,
}

/// Peer -> gateway: the first frame of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedResponseStreamStart {
    pub request_id: RequestId,
    pub status_code: u16,
    #[serde(default)]
    pub headers: HeaderMap,
}

/// Peer -> gateway: a subsequent chunk of a streamed response.
///
/// Exactly one chunk per request-id carries `is_final = true`, ending the
/// stream. Subsequent chunks for the same id are dropped by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedResponseStreamChunk {
    pub request_id: RequestId,
    #[serde(default)]
    pub body_b64: String,
    #[serde(default)]
    pub is_final: bool,
}

/// Gateway -> peer: abort an in-flight streamed forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelForwardedRequest {
    pub request_id: RequestId,
}

/// All control-channel message kinds.
///
/// Serializes/deserializes using the `type` field as a tag:
///
/// ```json
/// { "type": "forwardedRequest", "requestId": "...", ... }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "forwardedRequest")]
    ForwardedRequest(ForwardedRequest),
    #[serde(rename = "forwardedResponse")]
    ForwardedResponse(ForwardedResponse),
    #[serde(rename = "forwardedResponseStreamStart")]
    ForwardedResponseStreamStart(ForwardedResponseStreamStart),
    #[serde(rename = "forwardedResponseStreamChunk")]
    ForwardedResponseStreamChunk(ForwardedResponseStreamChunk),
    #[serde(rename = "cancelForwardedRequest")]
    CancelForwardedRequest(CancelForwardedRequest),
}

impl Frame {
    /// The `requestId` every frame carries.
    pub fn request_id(&self) -> &str {
        match self {
            Frame::ForwardedRequest(f) => &f.request_id,
            Frame::ForwardedResponse(f) => &f.request_id,
            Frame::ForwardedResponseStreamStart(f) => &f.request_id,
            Frame::ForwardedResponseStreamChunk(f) => &f.request_id,
            Frame::CancelForwardedRequest(f) => &f.request_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::ForwardedRequest(_) => "forwardedRequest",
            Frame::ForwardedResponse(_) => "forwardedResponse",
            Frame::ForwardedResponseStreamStart(_) => "forwardedResponseStreamStart",
            Frame::ForwardedResponseStreamChunk(_) => "forwardedResponseStreamChunk",
            Frame::CancelForwardedRequest(_) => "cancelForwardedRequest",
        }
    }
}

/// Error decoding an inbound text message into a [`Frame`].
///
/// Never fatal to the owning connection — a malformed frame only affects
/// whichever dispatch it would otherwise have advanced.
#[derive(Debug)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed control-channel frame: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

/// Encode a frame as a single text message.
pub fn encode(frame: &Frame) -> String {
    serde_json::to_string(frame).expect("Frame serialization is infallible")
}

/// Decode a single text message into a frame.
///
/// Rejects messages missing `type`, carrying an unknown `type`, or otherwise
/// failing to parse. Callers are expected to drop the frame and log a
/// warning rather than treat this as fatal to the connection.
pub fn decode(text: &str) -> Result<Frame, DecodeError> {
    serde_json::from_str(text).map_err(|e| DecodeError(e.to_string()))
}
