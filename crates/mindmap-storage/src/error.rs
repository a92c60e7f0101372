//! Storage error types for mindmap-storage.
//!
//! [`StorageError`] covers the failure modes of the storage layer: I/O,
//! document parse/serialize failures, missing documents and failed atomic
//! replaces.

use std::path::PathBuf;

use mindmap_core::CoreError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document text could not be parsed or serialized.
    #[error("document error: {0}")]
    Document(#[from] CoreError),

    /// No document exists at the path.
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The temporary file could not be moved over the target.
    #[error("failed to persist {}: {reason}", path.display())]
    Persist { path: PathBuf, reason: String },
}
