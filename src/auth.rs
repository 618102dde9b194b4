//! Dashboard token extraction and constant-time comparison (spec §4.7).

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine};
use subtle::ConstantTimeEq;

pub fn extract_bearer(authorization: &str) -> Option<&str> {
    authorization.strip_prefix("Bearer ")
}

fn extract_basic_password(authorization: &str) -> Option<String> {
    let encoded = authorization.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (_user, password) = text.split_once(':')?;
    Some(password.to_owned())
}

/// Resolve the presented token per the precedence in spec §4.7: form field
/// `token` (POST only), query string `token`, `Authorization: Bearer`,
/// `Authorization: Basic` (password segment).
pub fn extract_presented_token(
    headers: &HeaderMap,
    form_token: Option<&str>,
    query_token: Option<&str>,
) -> Option<String> {
    if let Some(t) = form_token.filter(|t| !t.is_empty()) {
        return Some(t.to_owned());
    }
    if let Some(t) = query_token.filter(|t| !t.is_empty()) {
        return Some(t.to_owned());
    }
    let authorization = headers.get("authorization").and_then(|v| v.to_str().ok())?;
    if let Some(bearer) = extract_bearer(authorization) {
        return Some(bearer.to_owned());
    }
    extract_basic_password(authorization)
}

/// Constant-time string equality, used to compare a presented token against
/// the stored password so that timing cannot leak how many leading bytes
/// matched.
pub fn constant_time_eq(presented: &str, expected: &str) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
