//! Floating-node records.
//!
//! A node is *floating* when the edge to its parent was deleted and no other
//! incoming edge remains. The record keeps the former parent so a later edge
//! can restore the relationship. Descendants of a floating node travel with
//! it and are marked as subtree members.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// Persisted floating record, stored both on the node (`floating`) and in
/// `metadata.floatingNodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingInfo {
    #[serde(default = "default_true")]
    pub is_floating: bool,
    pub original_parent: NodeId,
    /// Milliseconds since the Unix epoch at which the node detached.
    #[serde(default, alias = "floatingSince")]
    pub since_timestamp: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_subtree_node: bool,
}

fn default_true() -> bool {
    true
}

impl FloatingInfo {
    /// Record for the node whose incoming edge was deleted.
    pub fn root(original_parent: NodeId, since_timestamp: u64) -> Self {
        FloatingInfo {
            is_floating: true,
            original_parent,
            since_timestamp,
            is_subtree_node: false,
        }
    }

    /// Record for a descendant carried along with a floating root.
    pub fn subtree(parent: NodeId, since_timestamp: u64) -> Self {
        FloatingInfo {
            is_floating: true,
            original_parent: parent,
            since_timestamp,
            is_subtree_node: true,
        }
    }

    /// Compares everything except the timestamp. Re-detaching an already
    /// floating node must not churn the stored record.
    pub fn same_attachment(&self, other: &FloatingInfo) -> bool {
        self.is_floating == other.is_floating
            && self.original_parent == other.original_parent
            && self.is_subtree_node == other.is_subtree_node
    }

    /// Same record promoted to an island root.
    pub fn promoted(&self) -> Self {
        FloatingInfo {
            is_subtree_node: false,
            ..self.clone()
        }
    }

    pub fn state(&self) -> FloatingState {
        FloatingState::from_record(Some(self))
    }
}

/// Classification of a node as seen by the floating-state engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FloatingState {
    Attached,
    Floating {
        original_parent: NodeId,
        since_timestamp: u64,
        is_subtree_root: bool,
    },
}

impl FloatingState {
    /// Interprets an optional stored record. Records with `isFloating: false`
    /// (written by older versions) count as attached.
    pub fn from_record(record: Option<&FloatingInfo>) -> Self {
        match record {
            Some(info) if info.is_floating => FloatingState::Floating {
                original_parent: info.original_parent.clone(),
                since_timestamp: info.since_timestamp,
                is_subtree_root: !info.is_subtree_node,
            },
            _ => FloatingState::Attached,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, FloatingState::Floating { .. })
    }
}

/// Current wall-clock time in milliseconds, the unit of `since_timestamp`.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
