//! Filesystem implementation of [`DocumentStore`].
//!
//! [`FsStore`] reads documents straight from disk and writes them by
//! writing a sibling temporary file and renaming it over the target, so a
//! reader never observes a half-written document. Only writes made through
//! this store are announced; changes made by other processes are not
//! watched.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::broadcast;

use crate::error::StorageError;
use crate::traits::{DocumentChange, DocumentStore};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Filesystem-backed implementation of [`DocumentStore`].
#[derive(Debug)]
pub struct FsStore {
    changes: broadcast::Sender<DocumentChange>,
}

impl FsStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        FsStore { changes }
    }

    fn io_error(path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Default for FsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for FsStore {
    fn read(&self, path: &Path) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(path, e)),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), StorageError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| Self::io_error(path, e))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| Self::io_error(path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Self::io_error(path, e))?;
        tmp.persist(path).map_err(|e| StorageError::Persist {
            path: path.to_path_buf(),
            reason: e.error.to_string(),
        })?;

        let _ = self.changes.send(DocumentChange {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }
}
