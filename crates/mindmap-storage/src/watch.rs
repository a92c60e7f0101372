//! Path-filtered change feed over a [`DocumentStore`] subscription.

use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::traits::{DocumentChange, DocumentStore};

/// Yields change notifications for a single document path.
#[derive(Debug)]
pub struct PathWatcher {
    path: PathBuf,
    rx: broadcast::Receiver<DocumentChange>,
}

impl PathWatcher {
    pub fn new(store: &dyn DocumentStore, path: impl Into<PathBuf>) -> Self {
        PathWatcher {
            path: path.into(),
            rx: store.subscribe(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next change to this path. Returns `None` once the store
    /// is gone. A lagged receiver reports a change, since one may have been
    /// missed.
    pub async fn changed(&mut self) -> Option<DocumentChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.path == self.path => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, path = %self.path.display(), "change feed lagged");
                    return Some(DocumentChange {
                        path: self.path.clone(),
                    });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking check: drains pending notifications and reports whether
    /// any concerned this path.
    pub fn has_changed(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.rx.try_recv() {
                Ok(change) => changed |= change.path == self.path,
                Err(broadcast::error::TryRecvError::Lagged(_)) => changed = true,
                Err(_) => return changed,
            }
        }
    }
}
