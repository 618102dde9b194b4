//! Header canonicalization and sanitization (spec §4.4 "Header sanitization").
//!
//! Title-casing is meaningful on the control-channel's own JSON header maps
//! (which this module owns the casing of); it has no wire effect on the
//! actual HTTP response the gateway emits, since the `http`/`axum` crates
//! normalize `HeaderName`s to lowercase internally regardless — which is
//! correct and harmless, since HTTP header names are case-insensitive.

use axum::http::{HeaderMap as AxumHeaderMap, HeaderName, HeaderValue};
use gw_protocol::{HeaderMap, ResponseMode};
use serde_json::Value as Json;

/// `content-type` -> `Content-Type`, `x-forwarded-for` -> `X-Forwarded-For`.
pub fn title_case(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Build a title-cased control-channel header map from an inbound axum
/// request's headers.
pub fn canonicalize_request_headers(headers: &AxumHeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok().map(ToOwned::to_owned))
            .collect();
        out.entry(title_case(name.as_str())).or_default().extend(values);
    }
    out
}

const HOP_BY_HOP: &[&str] = &["transfer-encoding", "content-length"];

/// Remove hop-by-hop headers and recompute/omit `content-length`, re-casing
/// surviving names to title-case.
pub fn sanitize_response_headers(raw: &HeaderMap, mode: ResponseMode, body_len: usize) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, values) in raw {
        if HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        out.entry(title_case(name)).or_default().extend(values.clone());
    }
    if mode == ResponseMode::Buffer {
        out.insert("Content-Length".to_owned(), vec![body_len.to_string()]);
    }
    out
}

/// Inject `x-forwarded-for` (already title-cased as `X-Forwarded-For`).
pub fn inject_forwarded_for(headers: &mut HeaderMap, remote_ip: &str) {
    headers.insert("X-Forwarded-For".to_owned(), vec![remote_ip.to_owned()]);
}

/// Convert a control-channel header map into a real `axum` header map for
/// the outgoing HTTP response.
pub fn to_axum_header_map(map: &HeaderMap) -> AxumHeaderMap {
    let mut out = AxumHeaderMap::new();
    for (name, values) in map {
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(header_value) = HeaderValue::from_str(value) {
                out.append(header_name.clone(), header_value);
            }
        }
    }
    out
}

/// Serialize a control-channel header map for persistence in `RequestLog`.
pub fn to_json(map: &HeaderMap) -> Json {
    serde_json::to_value(map).unwrap_or(Json::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_cases_simple_and_hyphenated_names() {
        assert_eq!(title_case("content-type"), "Content-Type");
        assert_eq!(title_case("x-forwarded-for"), "X-Forwarded-For");
        assert_eq!(title_case("ETAG"), "Etag");
    }

    #[test]
    fn sanitize_strips_hop_by_hop_and_recomputes_content_length_when_buffered() {
        let mut raw = HeaderMap::new();
        raw.insert("content-type".to_owned(), vec!["text/plain".to_owned()]);
        raw.insert("Transfer-Encoding".to_owned(), vec!["chunked".to_owned()]);
        raw.insert("content-length".to_owned(), vec!["999".to_owned()]);

        let sanitized = sanitize_response_headers(&raw, ResponseMode::Buffer, 4);
        assert_eq!(sanitized.get("Content-Type"), Some(&vec!["text/plain".to_owned()]));
        assert!(!sanitized.contains_key("Transfer-Encoding"));
        assert_eq!(sanitized.get("Content-Length"), Some(&vec!["4".to_owned()]));
    }

    #[test]
    fn sanitize_omits_content_length_entirely_when_streamed() {
        let mut raw = HeaderMap::new();
        raw.insert("content-type".to_owned(), vec!["text/event-stream".to_owned()]);
        let sanitized = sanitize_response_headers(&raw, ResponseMode::Stream, 0);
        assert!(!sanitized.contains_key("Content-Length"));
    }
}
