//! Visibility resolution under collapse state.
//!
//! A node is visible unless one of its tree ancestors is collapsed. Hidden
//! nodes stay in the document; layout simply never sees them, so siblings
//! close the gap.

use std::collections::BTreeSet;

use crate::collapse::CollapseState;
use crate::edge::TreeEdge;
use crate::id::NodeId;
use crate::tree::TreeIndex;

/// Output of [`VisibilityResolver::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleSet {
    /// Visible node ids, in tree-index node order.
    pub nodes: Vec<NodeId>,
    /// Edges whose endpoints are both visible.
    pub edges: Vec<TreeEdge>,
    /// Nodes hidden under a collapsed ancestor.
    pub hidden: BTreeSet<NodeId>,
}

impl VisibleSet {
    pub fn is_visible(&self, id: &NodeId) -> bool {
        !self.hidden.contains(id) && self.nodes.contains(id)
    }
}

/// Computes which nodes and edges layout should consider.
pub struct VisibilityResolver<'a> {
    tree: &'a TreeIndex,
    collapsed: &'a CollapseState,
}

impl<'a> VisibilityResolver<'a> {
    pub fn new(tree: &'a TreeIndex, collapsed: &'a CollapseState) -> Self {
        VisibilityResolver { tree, collapsed }
    }

    /// Nodes hidden because `id` is collapsed.
    pub fn hidden_below(&self, id: &NodeId) -> Vec<NodeId> {
        self.tree.descendants(id)
    }

    pub fn resolve(&self, edges: &[TreeEdge]) -> VisibleSet {
        let mut hidden = BTreeSet::new();
        for id in self.collapsed.iter().filter(|id| self.tree.contains(id)) {
            hidden.extend(self.hidden_below(id));
        }

        let nodes: Vec<NodeId> = self
            .tree
            .node_ids()
            .filter(|id| !hidden.contains(*id))
            .cloned()
            .collect();
        let edges = edges
            .iter()
            .filter(|e| {
                self.tree.contains(&e.from)
                    && self.tree.contains(&e.to)
                    && !hidden.contains(&e.from)
                    && !hidden.contains(&e.to)
            })
            .cloned()
            .collect();

        VisibleSet {
            nodes,
            edges,
            hidden,
        }
    }
}
