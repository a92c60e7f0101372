//! Read-reapply-write protocol for persisted documents.
//!
//! The host editor saves its in-memory graph on its own schedule. A plain
//! read-modify-write would silently discard anything the host saved between
//! our read and our write. [`AtomicMutator`] narrows that window:
//!
//! 1. Read the document and apply the update. No change reported: stop.
//! 2. Re-read the document and apply the update again to the fresh copy.
//! 3. Write only if the second application still reports a change.
//!
//! The window between the final read and the write remains; a write that
//! lands there is lost. Callers that need more must call again.
//!
//! The update closure runs up to twice, so it must be idempotent and must
//! not touch anything outside the document it is given.

use std::path::Path;
use std::sync::Arc;

use mindmap_core::CanvasDocument;

use crate::error::StorageError;
use crate::traits::DocumentStore;

/// How a [`AtomicMutator::try_modify`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The updated document was written.
    Written,
    /// The update reported no change on the first read.
    Unchanged,
    /// The update no longer applied after re-reading the document.
    StaleAfterReread,
    /// No document exists at the path.
    Missing,
}

impl MutationOutcome {
    pub fn is_written(self) -> bool {
        self == MutationOutcome::Written
    }
}

/// Serializes logical updates to a document against the host's autosave.
#[derive(Clone)]
pub struct AtomicMutator {
    store: Arc<dyn DocumentStore>,
}

impl AtomicMutator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        AtomicMutator { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Applies `update` with the double-check protocol. Returns `true` only
    /// when a write happened. Failures are logged and reported as `false`.
    pub fn modify<F>(&self, path: &Path, update: F) -> bool
    where
        F: FnMut(&mut CanvasDocument) -> bool,
    {
        match self.try_modify(path, update) {
            Ok(MutationOutcome::Written) => true,
            Ok(outcome) => {
                tracing::debug!(path = %path.display(), ?outcome, "document left unchanged");
                false
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "document update failed");
                false
            }
        }
    }

    /// Same protocol as [`AtomicMutator::modify`], but reports the outcome
    /// and surfaces errors.
    pub fn try_modify<F>(&self, path: &Path, mut update: F) -> Result<MutationOutcome, StorageError>
    where
        F: FnMut(&mut CanvasDocument) -> bool,
    {
        let Some(mut first) = self.store.load(path)? else {
            return Ok(MutationOutcome::Missing);
        };
        if !update(&mut first) {
            return Ok(MutationOutcome::Unchanged);
        }

        // The host may have autosaved since the first read.
        let Some(mut fresh) = self.store.load(path)? else {
            return Ok(MutationOutcome::Missing);
        };
        if !update(&mut fresh) {
            return Ok(MutationOutcome::StaleAfterReread);
        }

        self.store.save(path, &fresh)?;
        tracing::trace!(path = %path.display(), "document written");
        Ok(MutationOutcome::Written)
    }

    /// Loads the current document, logging failures and returning `None`.
    pub fn load(&self, path: &Path) -> Option<CanvasDocument> {
        match self.store.load(path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "document read failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for AtomicMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicMutator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use mindmap_core::{CanvasNode, NodeId};

    fn setup() -> (Arc<InMemoryStore>, AtomicMutator) {
        let store = Arc::new(InMemoryStore::new());
        let mut doc = CanvasDocument::default();
        doc.add_node(CanvasNode::text("a", "A", 0.0, 0.0, 10.0, 10.0)).unwrap();
        store.insert("doc.canvas", doc.to_json().unwrap());
        let mutator = AtomicMutator::new(store.clone());
        (store, mutator)
    }

    #[test]
    fn unchanged_update_does_not_write() {
        let (store, mutator) = setup();
        assert!(!mutator.modify(Path::new("doc.canvas"), |_| false));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn changed_update_writes_once() {
        let (store, mutator) = setup();
        let written = mutator.modify(Path::new("doc.canvas"), |doc| {
            doc.node_mut(&NodeId::from("a")).map(|n| n.x = 5.0).is_some()
        });
        assert!(written);
        assert_eq!(store.write_count(), 1);
        let doc = store.load(Path::new("doc.canvas")).unwrap().unwrap();
        assert_eq!(doc.node(&NodeId::from("a")).unwrap().x, 5.0);
    }

    #[test]
    fn update_runs_twice_before_writing() {
        let (_, mutator) = setup();
        let mut calls = 0;
        mutator.modify(Path::new("doc.canvas"), |_| {
            calls += 1;
            true
        });
        assert_eq!(calls, 2);
    }

    #[test]
    fn missing_document_is_not_an_error() {
        let (_, mutator) = setup();
        let outcome = mutator.try_modify(Path::new("ghost.canvas"), |_| true).unwrap();
        assert_eq!(outcome, MutationOutcome::Missing);
        assert!(!mutator.modify(Path::new("ghost.canvas"), |_| true));
    }

    #[test]
    fn parse_failure_returns_false() {
        let (store, mutator) = setup();
        store.insert("broken.canvas", "{ nope");
        assert!(mutator.try_modify(Path::new("broken.canvas"), |_| true).is_err());
        assert!(!mutator.modify(Path::new("broken.canvas"), |_| true));
        assert_eq!(store.write_count(), 0);
    }
}
