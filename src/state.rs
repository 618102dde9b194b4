//! Ambient: shared application state threaded through every handler.
//!
//! Grounded on the teacher's `state.rs` `AppState` (a `Clone` struct of
//! `Arc`-wrapped registries plus a `PgPool`), generalized to this gateway's
//! registries and store traits.

use crate::log_recorder::LogRecorderHandle;
use crate::registry::PeerRegistry;
use crate::store::{CredentialStore, LogStore};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct GatewayState {
    pub peers: PeerRegistry,
    pub log_store: Arc<dyn LogStore>,
    pub credential_store: Arc<dyn CredentialStore>,
    pub log_recorder: LogRecorderHandle,
    pub ops_log: Arc<gw_ui_log::OpsLogger<String>>,
}

impl GatewayState {
    pub fn new(
        log_store: Arc<dyn LogStore>,
        credential_store: Arc<dyn CredentialStore>,
        log_recorder: LogRecorderHandle,
    ) -> Self {
        let (ops_tx, _) = broadcast::channel(1024);
        let ops_log = Arc::new(gw_ui_log::OpsLogger::with_buffer(ops_tx, |entry| entry, 500));
        Self {
            peers: PeerRegistry::new(),
            log_store,
            credential_store,
            log_recorder,
            ops_log,
        }
    }
}
