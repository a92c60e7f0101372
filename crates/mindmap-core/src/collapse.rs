//! Collapsed-node bookkeeping.

use std::collections::BTreeSet;

use crate::document::CanvasDocument;
use crate::id::NodeId;

/// The set of node ids marked collapsed. A collapsed node stays visible;
/// everything below it is hidden from layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseState {
    collapsed: BTreeSet<NodeId>,
}

impl CollapseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the persisted `metadata.collapsedNodes` set.
    pub fn from_document(doc: &CanvasDocument) -> Self {
        CollapseState {
            collapsed: doc.collapsed_nodes(),
        }
    }

    pub fn is_collapsed(&self, id: &NodeId) -> bool {
        self.collapsed.contains(id)
    }

    /// Returns `true` if the node was not already collapsed.
    pub fn collapse(&mut self, id: NodeId) -> bool {
        self.collapsed.insert(id)
    }

    /// Returns `true` if the node was collapsed.
    pub fn expand(&mut self, id: &NodeId) -> bool {
        self.collapsed.remove(id)
    }

    /// Flips the flag and returns the new state (`true` = collapsed).
    pub fn toggle(&mut self, id: &NodeId) -> bool {
        if self.collapsed.remove(id) {
            false
        } else {
            self.collapsed.insert(id.clone());
            true
        }
    }

    /// Drops ids for which `exists` is false and returns them.
    pub fn retain_existing(&mut self, exists: impl Fn(&NodeId) -> bool) -> Vec<NodeId> {
        let stale: Vec<NodeId> = self.collapsed.iter().filter(|id| !exists(id)).cloned().collect();
        for id in &stale {
            self.collapsed.remove(id);
        }
        stale
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.collapsed.iter()
    }

    pub fn len(&self) -> usize {
        self.collapsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collapsed.is_empty()
    }

    pub fn as_set(&self) -> &BTreeSet<NodeId> {
        &self.collapsed
    }
}

impl FromIterator<NodeId> for CollapseState {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        CollapseState {
            collapsed: iter.into_iter().collect(),
        }
    }
}
