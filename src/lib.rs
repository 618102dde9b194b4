pub mod auth;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod http;
pub mod log_recorder;
pub mod peer;
pub mod registry;
pub mod replay;
pub mod state;
pub mod store;
pub mod ws_peer;

pub use state::GatewayState;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/_tunnelgate/peer", get(ws_peer::peer_ingress))
        .route(
            "/_tunnelgate/inspect",
            get(http::inspector::get).post(http::inspector::post),
        )
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .fallback(http::gateway::handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}
