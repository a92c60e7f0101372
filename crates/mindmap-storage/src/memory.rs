//! In-memory implementation of [`DocumentStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and headless
//! sessions. Documents live in a `DashMap` keyed by path, so the store can be
//! shared behind an `Arc` between the engine and a simulated host.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::error::StorageError;
use crate::traits::{DocumentChange, DocumentStore};

/// Capacity of the change-notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// In-memory implementation of [`DocumentStore`].
#[derive(Debug)]
pub struct InMemoryStore {
    documents: DashMap<PathBuf, String>,
    changes: broadcast::Sender<DocumentChange>,
    writes: AtomicUsize,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        InMemoryStore {
            documents: DashMap::new(),
            changes,
            writes: AtomicUsize::new(0),
        }
    }

    /// Seeds a document without counting it as a write or announcing it.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.documents.insert(path.into(), contents.into());
    }

    /// Removes a document, returning its text.
    pub fn remove(&self, path: &Path) -> Option<String> {
        self.documents.remove(path).map(|(_, text)| text)
    }

    /// Current text of a document.
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.documents.get(path).map(|entry| entry.value().clone())
    }

    /// Number of successful [`DocumentStore::write`] calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryStore {
    fn read(&self, path: &Path) -> Result<Option<String>, StorageError> {
        Ok(self.contents(path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), StorageError> {
        self.documents.insert(path.to_path_buf(), contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        // No receivers is fine; nobody is watching yet.
        let _ = self.changes.send(DocumentChange {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }
}
