//! C7: the dashboard HTTP surface — `GET /_tunnelgate/inspect` renders a
//! hostname's recent exchanges, `POST /_tunnelgate/inspect` drives the
//! `prune` and `replay` actions. Gated by the per-hostname password stored
//! in [`crate::store::CredentialStore`].
//!
//! Host-scoped exactly like the public gateway (§4.3): the hostname being
//! inspected is resolved from the `Host` header, never from a caller-supplied
//! field, so a request can only ever act on the hostname it actually arrived
//! on.
//!
//! Rendering goes through the [`DashboardView`] trait rather than inline
//! HTML so a richer dashboard can be swapped in later without touching the
//! auth gate or action dispatch; [`DefaultDashboardView`] is the only
//! implementation here.

use crate::auth::{constant_time_eq, extract_presented_token};
use crate::error::GatewayError;
use crate::http::response::{internal_error, not_found};
use crate::registry::normalize_hostname;
use crate::replay;
use crate::state::GatewayState;
use crate::store::RequestLog;
use axum::extract::{Form, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

const DEFAULT_LOG_LIMIT: i64 = 50;
const MAX_LOG_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct InspectQuery {
    pub token: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct InspectAction {
    pub token: Option<String>,
    pub action: String,
    #[serde(rename = "logId")]
    pub log_id: Option<i64>,
}

fn resolve_hostname(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(normalize_hostname)
        .ok_or_else(|| GatewayError::BadRequest.into_response())
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)
}

async fn authorize(
    state: &GatewayState,
    hostname: &str,
    headers: &HeaderMap,
    form_token: Option<&str>,
    query_token: Option<&str>,
) -> Result<(), Response> {
    let expected = state
        .credential_store
        .get(hostname)
        .await
        .map_err(internal_error)?;
    let Some(expected) = expected else {
        return Err(not_found(format!(
            "no credential configured for {hostname}; provision one via CredentialStore::upsert"
        )));
    };

    match extract_presented_token(headers, form_token, query_token) {
        None => Err(GatewayError::AuthMissing.into_response()),
        Some(presented) if constant_time_eq(&presented, &expected) => Ok(()),
        Some(_) => Err(GatewayError::AuthInvalid.into_response()),
    }
}

async fn render_view(
    state: &GatewayState,
    hostname: &str,
    limit: i64,
    flash: Option<String>,
) -> Response {
    match state.log_store.find_recent_by_hostname(hostname, limit).await {
        Ok(logs) => {
            Html(DefaultDashboardView.render(hostname, &logs, flash.as_deref())).into_response()
        }
        Err(e) => internal_error(e),
    }
}

pub async fn get(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<InspectQuery>,
) -> Response {
    let hostname = match resolve_hostname(&headers) {
        Ok(h) => h,
        Err(response) => return response,
    };
    if let Err(response) = authorize(&state, &hostname, &headers, None, query.token.as_deref()).await
    {
        return response;
    }

    render_view(&state, &hostname, clamp_limit(query.limit), None).await
}

pub async fn post(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<InspectQuery>,
    Form(body): Form<InspectAction>,
) -> Response {
    let hostname = match resolve_hostname(&headers) {
        Ok(h) => h,
        Err(response) => return response,
    };
    if let Err(response) = authorize(
        &state,
        &hostname,
        &headers,
        body.token.as_deref(),
        query.token.as_deref(),
    )
    .await
    {
        return response;
    }

    let flash = match body.action.as_str() {
        "prune" => match state.log_store.delete_by_hostname(&hostname).await {
            Ok(count) => {
                state
                    .ops_log
                    .log(format!("pruned {count} logged exchanges for {hostname}"));
                format!("Pruned {count} logged exchange(s)")
            }
            Err(e) => return internal_error(e),
        },
        "replay" => match body.log_id {
            None => "replay requires logId".to_owned(),
            Some(log_id) => match replay::run(&state, &hostname, log_id).await {
                Ok(summary) => format!(
                    "Replayed {} {} (status {})",
                    summary.method, summary.path, summary.status_code
                ),
                Err(response) => return response,
            },
        },
        other => format!("Unknown action \"{other}\""),
    };

    render_view(&state, &hostname, DEFAULT_LOG_LIMIT, Some(flash)).await
}

/// A renderer for the dashboard HTML, kept behind a trait so presentation
/// can change independently of the auth gate and action dispatch above.
pub trait DashboardView {
    fn render(&self, hostname: &str, logs: &[RequestLog], flash: Option<&str>) -> String;
}

pub struct DefaultDashboardView;

impl DashboardView for DefaultDashboardView {
    fn render(&self, hostname: &str, logs: &[RequestLog], flash: Option<&str>) -> String {
        let mut rows = String::new();
        for log in logs {
            rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                log.id,
                html_escape(&log.created_at.to_rfc3339()),
                html_escape(&log.method),
                html_escape(&log.path),
                log.response_status.map_or_else(|| "-".to_owned(), |s| s.to_string()),
            ));
        }
        let flash_html = flash.map_or_else(String::new, |f| {
            format!("<p class=\"flash\">{}</p>\n", html_escape(f))
        });
        format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{host} — tunnelgate</title></head>\n\
             <body>\n<h1>{host}</h1>\n{flash_html}<table border=\"1\">\n\
             <thead><tr><th>id</th><th>time</th><th>method</th><th>path</th><th>status</th></tr></thead>\n\
             <tbody>\n{rows}</tbody>\n</table>\n</body></html>",
            host = html_escape(hostname),
        )
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
