use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tunnelgate::config::Config;
use tunnelgate::state::GatewayState;
use tunnelgate::store::{PgCredentialStore, PgLogStore};
use tunnelgate::{db, log_recorder};

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    info!("connecting to database...");
    let pool = db::create_pool(&config.database_url).await;
    db::run_migrations(&pool).await;
    info!("migrations applied");

    let log_store = Arc::new(PgLogStore::new(pool.clone()));
    let credential_store = Arc::new(PgCredentialStore::new(pool));
    let log_recorder = log_recorder::spawn(log_store.clone(), config.log_recorder);

    let state = GatewayState::new(log_store, credential_store, log_recorder);
    let router = tunnelgate::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %config.bind_addr, "gateway listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");
    info!("gateway shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        () = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
