//! The [`DocumentStore`] trait defining the storage contract for canvas
//! documents.
//!
//! The store is a plain text store: it reads and writes whole documents and
//! announces writes. It makes no concurrency promises of its own; callers
//! that need to avoid lost updates go through [`crate::AtomicMutator`].
//!
//! The trait is synchronous. All interleaving with the host editor happens
//! between calls, never inside one.

use std::path::{Path, PathBuf};

use tokio::sync::broadcast;

use mindmap_core::CanvasDocument;

use crate::error::StorageError;

/// Announcement that the document at `path` was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub path: PathBuf,
}

/// The storage contract for canvas documents.
pub trait DocumentStore: Send + Sync {
    /// Reads the document text. `Ok(None)` when no document exists.
    fn read(&self, path: &Path) -> Result<Option<String>, StorageError>;

    /// Replaces the document text and announces the change.
    fn write(&self, path: &Path, contents: &str) -> Result<(), StorageError>;

    /// Subscribes to write announcements for all paths. Use
    /// [`crate::PathWatcher`] to filter by path.
    fn subscribe(&self) -> broadcast::Receiver<DocumentChange>;

    /// Reads and parses the document.
    fn load(&self, path: &Path) -> Result<Option<CanvasDocument>, StorageError> {
        match self.read(path)? {
            Some(text) => Ok(Some(CanvasDocument::from_json(&text)?)),
            None => Ok(None),
        }
    }

    /// Serializes and writes the document.
    fn save(&self, path: &Path, doc: &CanvasDocument) -> Result<(), StorageError> {
        self.write(path, &doc.to_json()?)
    }
}
