//! C8: peer ingress — the `GET /_tunnelgate/peer` WebSocket upgrade that
//! binds a connecting tunnel client into the [`PeerRegistry`].
//!
//! Grounded on the teacher's `ws_forwarder.rs` handler shape: extract
//! identity from the upgrade request, register, spawn the session, clean up
//! on exit. This gateway's peer identity is simply the `Host` the peer wants
//! to own, not a token-authenticated device id — the spec names no peer
//! authentication, so none is added here.

use crate::peer::Peer;
use crate::registry::{normalize_hostname, PeerRegistry};
use crate::state::GatewayState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub async fn peer_ingress(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let Some(hostname) = headers
        .get("x-tunnelgate-hostname")
        .and_then(|v| v.to_str().ok())
        .and_then(normalize_hostname)
    else {
        return crate::http::response::bad_request(
            "missing or malformed X-Tunnelgate-Hostname header",
        )
        .into_response();
    };

    let remote_ip = remote_addr.ip().to_string();
    ws.on_upgrade(move |socket| handle_peer_socket(socket, state, hostname, remote_ip))
}

async fn handle_peer_socket(
    socket: axum::extract::ws::WebSocket,
    state: GatewayState,
    hostname: String,
    remote_ip: String,
) {
    let peer = Arc::new(Peer::spawn(socket, hostname.clone(), remote_ip.clone()));
    let evicted = state.peers.bind(&hostname, peer.clone()).await;
    if evicted.is_some() {
        state
            .ops_log
            .log(format!("peer for {hostname} reconnected, evicting prior connection"));
    } else {
        state.ops_log.log(format!("peer connected for {hostname} from {remote_ip}"));
    }
    info!(hostname = %hostname, remote_ip = %remote_ip, "peer connected");

    let mut closed = peer.closed_signal();
    let _ = closed.recv().await;

    unbind_on_disconnect(&state.peers, &hostname, &peer).await;
    state.ops_log.log(format!("peer for {hostname} disconnected"));
    info!(hostname = %hostname, "peer disconnected");
}

async fn unbind_on_disconnect(registry: &PeerRegistry, hostname: &str, peer: &Arc<Peer>) {
    registry.unbind(hostname, peer).await;
}
