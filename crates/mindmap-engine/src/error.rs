//! Engine error types.

use std::path::PathBuf;

use mindmap_core::{CoreError, NodeId};
use mindmap_layout::LayoutError;
use mindmap_storage::StorageError;

/// Failures reported by a [`crate::HostGraphView`] when it cannot apply an
/// update.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("node {0} is not in the host graph")]
    UnknownNode(NodeId),

    /// The host has no way to perform this kind of update.
    #[error("operation not supported by this host")]
    Unsupported,
}

/// Errors from engine operations that return `Result`.
///
/// Event handlers on [`crate::FloatingStateEngine`] never return these; they
/// log and carry on.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("cannot read settings {path}: {source}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    #[error("document not found: {}", .0.display())]
    DocumentMissing(PathBuf),
}
