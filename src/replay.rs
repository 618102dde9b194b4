//! C6: replay a previously logged exchange against the hostname's current
//! peer (spec §4.6). Reuses the C4 dispatcher directly — a replay is just a
//! synthetic forced-buffer dispatch with its own deadline, so the response
//! it produces is logged exactly the way a live buffered exchange is.

use crate::dispatch::{self, DispatchRequest, REPLAY_DEADLINE};
use crate::error::GatewayError;
use crate::http::response::internal_error;
use crate::state::GatewayState;
use axum::body::Bytes;
use axum::http::{HeaderMap as AxumHeaderMap, HeaderName, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD, Engine};
use gw_protocol::ResponseMode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub method: String,
    pub path: String,
    pub status_code: u16,
}

/// Re-send the request recorded as `log_id` through the peer currently bound
/// to `caller_hostname`. Fails with `NotFound` if the log doesn't exist or
/// belongs to a different hostname (a dashboard may only replay its own
/// hostname's history), and with `NoPeer` if nothing is connected right now.
pub async fn run(
    state: &GatewayState,
    caller_hostname: &str,
    log_id: i64,
) -> Result<ReplaySummary, Response> {
    let log = state
        .log_store
        .find_by_id(log_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| GatewayError::NotFound.into_response())?;

    if log.hostname != caller_hostname {
        return Err(GatewayError::NotFound.into_response());
    }

    let peer = state
        .peers
        .lookup(caller_hostname)
        .await
        .ok_or_else(|| GatewayError::NoPeer(caller_hostname.to_owned()).into_response())?;

    let mut headers = AxumHeaderMap::new();
    if let Ok(map) = serde_json::from_value::<gw_protocol::HeaderMap>(log.request_headers.clone()) {
        for (name, values) in &map {
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            for value in values {
                if let Ok(header_value) = HeaderValue::from_str(value) {
                    headers.append(header_name.clone(), header_value);
                }
            }
        }
    }

    let method = Method::from_bytes(log.method.as_bytes()).unwrap_or(Method::GET);
    let body = if log.request_body.is_empty() {
        Bytes::new()
    } else {
        Bytes::from(STANDARD.decode(log.request_body.as_bytes()).unwrap_or_default())
    };

    let req = DispatchRequest {
        hostname: caller_hostname.to_owned(),
        method: method.clone(),
        url: log.path.clone(),
        headers,
        body,
        response_mode: ResponseMode::Buffer,
        deadline: Some(REPLAY_DEADLINE),
    };

    let response = dispatch::run(req, peer, state.log_recorder.clone()).await;
    Ok(ReplaySummary {
        method: method.to_string(),
        path: log.path,
        status_code: response.status().as_u16(),
    })
}
