//! Core error types for mindmap-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the canvas document model.

use crate::id::{EdgeId, NodeId};
use thiserror::Error;

/// Core errors produced by the mindmap-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The document text is not a valid canvas document.
    #[error("invalid canvas document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// A node id was not found in the document.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// An edge id was not found in the document.
    #[error("edge not found: {id}")]
    EdgeNotFound { id: EdgeId },

    /// An id is already taken by another node or edge.
    #[error("duplicate id: '{id}'")]
    DuplicateId { id: String },
}
