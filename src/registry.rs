//! C3: the process-wide hostname -> peer registry.
//!
//! Grounded on the teacher's `state.rs` read-mostly `RwLock<HashMap<..>>`
//! registries (`active_forwarders`, `broadcast_registry`): writes are rare
//! (peer connect/disconnect), reads happen on every inbound request, so a
//! single `tokio::sync::RwLock` favoring concurrent readers is enough — no
//! need for a lock-free structure at this scale.

use crate::peer::Peer;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<Peer>>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a peer under `hostname`. If a peer was already bound there, it is
    /// closed first (failing its in-flight dispatches with `PeerGone`) and
    /// the evicted peer is returned.
    pub async fn bind(&self, hostname: &str, peer: Arc<Peer>) -> Option<Arc<Peer>> {
        let mut map = self.inner.write().await;
        let prior = map.insert(hostname.to_owned(), peer);
        if let Some(prior) = &prior {
            prior.close();
        }
        prior
    }

    pub async fn lookup(&self, hostname: &str) -> Option<Arc<Peer>> {
        self.inner.read().await.get(hostname).cloned()
    }

    /// Remove `hostname`'s entry, but only if it still points at `peer` —
    /// guards against a racing reconnect's new peer being unbound by a stale
    /// cleanup task for the old one.
    pub async fn unbind(&self, hostname: &str, peer: &Arc<Peer>) {
        let mut map = self.inner.write().await;
        if let Some(current) = map.get(hostname) {
            if Arc::ptr_eq(current, peer) {
                map.remove(hostname);
            }
        }
    }
}

/// Normalize a `Host` header value into a registry key: lowercased, port
/// stripped, parsed as a URL authority. Returns `None` on parse failure,
/// which the caller maps to HTTP 400.
pub fn normalize_hostname(host_header: &str) -> Option<String> {
    let authority = host_header.trim();
    if authority.is_empty() {
        return None;
    }
    // Reject header-injection-style values outright; a Host header is a
    // single authority, never multiple or whitespace-separated.
    if authority.chars().any(|c| c.is_whitespace()) {
        return None;
    }
    let host_part = if let Some(rest) = authority.strip_prefix('[') {
        // IPv6 literal: `[::1]:8080`.
        let end = rest.find(']')?;
        &rest[..end]
    } else {
        authority.rsplit_once(':').map_or(authority, |(host, port)| {
            if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() {
                host
            } else {
                authority
            }
        })
    };
    if host_part.is_empty() {
        return None;
    }
    Some(host_part.to_ascii_lowercase())
}
