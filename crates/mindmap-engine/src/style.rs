//! Style classes on node elements, with retries for elements that have not
//! rendered yet.
//!
//! Each (node, class) pair has at most one pending retry task. Applying a
//! new state for the pair aborts the old task first, so a stale retry can
//! never undo a newer change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use mindmap_core::NodeId;

use crate::host::HostGraphView;

type StyleKey = (NodeId, String);

pub struct StyleApplier {
    host: Arc<dyn HostGraphView>,
    schedule: Vec<Duration>,
    pending: Arc<DashMap<StyleKey, (u64, JoinHandle<()>)>>,
    generation: AtomicU64,
}

impl StyleApplier {
    pub fn new(host: Arc<dyn HostGraphView>, schedule: Vec<Duration>) -> Self {
        StyleApplier {
            host,
            schedule,
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Sets or clears `class` on the node's element. Returns `true` if it was
    /// applied immediately; otherwise a retry is scheduled (when running
    /// inside a tokio runtime) and `false` is returned.
    pub fn apply(&self, id: &NodeId, class: &str, on: bool) -> bool {
        let key = (id.clone(), class.to_string());
        self.cancel_key(&key);

        if self.host.set_element_class(id, class, on) {
            return true;
        }
        if self.schedule.is_empty() {
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(node = %id, class, "no runtime; style retry skipped");
            return false;
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let host = Arc::clone(&self.host);
        let schedule = self.schedule.clone();
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();
        let handle = runtime.spawn(async move {
            let (id, class) = &task_key;
            let signal = host.render_signal();
            let mut done = false;
            for (attempt, delay) in schedule.into_iter().enumerate() {
                match &signal {
                    Some(rendered) => {
                        tokio::select! {
                            _ = rendered.notified() => {}
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                }
                if host.set_element_class(id, class, on) {
                    tracing::debug!(node = %id, class = %class, attempt, "style applied after retry");
                    done = true;
                    break;
                }
            }
            if !done {
                tracing::debug!(node = %id, class = %class, "element never rendered; style dropped");
            }
            pending.remove_if(&task_key, |_, (g, _)| *g == generation);
        });
        self.pending.insert(key, (generation, handle));
        false
    }

    /// Aborts pending retries for every class on `id`.
    pub fn cancel(&self, id: &NodeId) {
        let keys: Vec<StyleKey> = self
            .pending
            .iter()
            .filter(|entry| entry.key().0 == *id)
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            self.cancel_key(&key);
        }
    }

    fn cancel_key(&self, key: &StyleKey) {
        if let Some((_, (_, handle))) = self.pending.remove(key) {
            handle.abort();
        }
    }

    pub fn has_pending(&self, id: &NodeId) -> bool {
        self.pending.iter().any(|entry| entry.key().0 == *id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for StyleApplier {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.value().1.abort();
        }
    }
}

impl std::fmt::Debug for StyleApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleApplier")
            .field("schedule", &self.schedule)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
