use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// An operational logger that formats timestamped entries, prints to
/// tracing, broadcasts to any live subscribers, and optionally buffers a
/// bounded tail for later retrieval.
pub struct OpsLogger<T: Clone + Send + 'static> {
    tx: broadcast::Sender<T>,
    map_fn: Arc<dyn Fn(String) -> T + Send + Sync>,
    buffer: Option<Arc<RwLock<VecDeque<String>>>>,
    max_entries: usize,
}

impl<T: Clone + Send> OpsLogger<T> {
    /// Create a broadcast-only logger (no buffer).
    pub fn new(
        tx: broadcast::Sender<T>,
        map_fn: impl Fn(String) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            tx,
            map_fn: Arc::new(map_fn),
            buffer: None,
            max_entries: 0,
        }
    }

    /// Create a logger with an in-memory ring buffer for retrieval.
    pub fn with_buffer(
        tx: broadcast::Sender<T>,
        map_fn: impl Fn(String) -> T + Send + Sync + 'static,
        max_entries: usize,
    ) -> Self {
        Self {
            tx,
            map_fn: Arc::new(map_fn),
            buffer: Some(Arc::new(RwLock::new(VecDeque::with_capacity(max_entries)))),
            max_entries,
        }
    }

    /// Format a timestamped log entry, print to tracing, broadcast, and optionally buffer.
    pub fn log(&self, msg: impl Display) {
        let entry = format!("{} {}", chrono::Utc::now().format("%H:%M:%S"), msg);
        tracing::info!("{}", entry);
        if let Some(ref buf) = self.buffer {
            if let Ok(mut entries) = buf.write() {
                entries.push_back(entry.clone());
                while entries.len() > self.max_entries {
                    entries.pop_front();
                }
            }
        }
        let _ = self.tx.send((self.map_fn)(entry));
    }

    /// Return a snapshot of buffered entries. Returns empty vec if no buffer.
    pub fn entries(&self) -> Vec<String> {
        match &self.buffer {
            Some(buf) => buf
                .read()
                .map(|b| b.iter().cloned().collect())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }
}
