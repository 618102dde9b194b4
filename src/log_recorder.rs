//! C5: fire-and-forget persistence of completed exchanges, plus scheduled pruning.
//!
//! Grounded on spec §9's design note ("fire-and-forget persistence... modeled
//! as an enqueue onto a bounded work queue with its own failure logging;
//! backpressure policy is drop-oldest") and on the teacher's `ws_forwarder.rs`
//! heartbeat `tokio::time::interval` for the periodic-tick shape of the prune
//! loop.

use crate::store::{LogStore, NewRequestLog};
use chrono::Duration as ChronoDuration;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::time::{interval, Duration};
use tracing::{error, warn};

const QUEUE_CAPACITY: usize = 256;

/// A cheap, cloneable front-end for enqueueing completed exchanges.
#[derive(Clone)]
pub struct LogRecorderHandle {
    queue: Arc<Mutex<VecDeque<NewRequestLog>>>,
    notify: Arc<Notify>,
}

impl LogRecorderHandle {
    /// Enqueue a completed exchange for persistence. Never blocks the
    /// caller; if the queue is already at capacity the oldest pending entry
    /// is dropped (and a warning logged) to make room.
    pub async fn enqueue(&self, log: NewRequestLog) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= QUEUE_CAPACITY {
            queue.pop_front();
            warn!("log recorder queue at capacity, dropping oldest pending RequestLog");
        }
        queue.push_back(log);
        drop(queue);
        self.notify.notify_one();
    }
}

pub struct LogRecorderConfig {
    pub prune_interval: Duration,
    pub max_age: ChronoDuration,
}

impl Default for LogRecorderConfig {
    fn default() -> Self {
        Self {
            prune_interval: Duration::from_secs(3600),
            max_age: ChronoDuration::days(14),
        }
    }
}

/// Spawn the background writer/pruner task and return a handle for enqueueing.
pub fn spawn(store: Arc<dyn LogStore>, config: LogRecorderConfig) -> LogRecorderHandle {
    let queue: Arc<Mutex<VecDeque<NewRequestLog>>> = Arc::new(Mutex::new(VecDeque::new()));
    let notify = Arc::new(Notify::new());

    let handle = LogRecorderHandle {
        queue: queue.clone(),
        notify: notify.clone(),
    };

    tokio::spawn(async move {
        let mut prune_tick = interval(config.prune_interval);
        prune_tick.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                () = notify.notified() => {
                    drain_queue(&queue, store.as_ref()).await;
                }
                _ = prune_tick.tick() => {
                    drain_queue(&queue, store.as_ref()).await;
                    prune_once(store.as_ref(), config.max_age).await;
                }
            }
        }
    });

    handle
}

async fn drain_queue(queue: &Arc<Mutex<VecDeque<NewRequestLog>>>, store: &dyn LogStore) {
    loop {
        let next = queue.lock().await.pop_front();
        let Some(log) = next else { break };
        if let Err(e) = store.insert(log).await {
            error!(error = %e, "failed to persist RequestLog; dropping");
        }
    }
}

async fn prune_once(store: &dyn LogStore, max_age: ChronoDuration) {
    let cutoff = chrono::Utc::now() - max_age;
    match store.delete_older_than(cutoff).await {
        Ok(count) if count > 0 => tracing::info!(count, "pruned aged-out request logs"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "failed to prune aged-out request logs"),
    }
}
