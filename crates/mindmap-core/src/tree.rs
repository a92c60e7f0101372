//! TreeIndex: the forest structure embedded in a general canvas graph.
//!
//! Canvas edges form an arbitrary directed graph. Tree operations (layout,
//! collapse, floating subtrees) need a forest, so [`TreeIndex`] picks at most
//! one parent edge per node and keeps the rest only as incoming-edge counts.
//!
//! # Parent selection
//!
//! Edges are considered in document order. The host appends edges as they
//! are drawn, so document order is creation order and the *first* incoming
//! edge wins. Later incoming edges still count as incoming (a node with any
//! incoming edge is never floating) but do not shape the tree. An edge that
//! would close a cycle is treated the same way.
//!
//! Edges whose endpoints are not in the node set are ignored entirely.

use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use smallvec::SmallVec;

use crate::edge::TreeEdge;
use crate::id::{EdgeId, NodeId};

/// Weight of a parent edge in the forest graph.
#[derive(Debug, Clone)]
struct ParentLink {
    edge: EdgeId,
    /// Position of the edge in the source edge list; orders siblings.
    order: usize,
}

/// Forest view over a node set and an edge list.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    forest: StableDiGraph<NodeId, ParentLink>,
    indices: IndexMap<NodeId, NodeIndex>,
    parents: HashMap<NodeId, TreeEdge>,
    incoming: HashMap<NodeId, SmallVec<[EdgeId; 2]>>,
}

impl TreeIndex {
    /// Builds the forest. Node order is preserved for [`TreeIndex::roots`].
    pub fn build<'a>(
        nodes: impl IntoIterator<Item = &'a NodeId>,
        edges: &[TreeEdge],
    ) -> Self {
        let mut index = TreeIndex::default();
        for id in nodes {
            if !index.indices.contains_key(id) {
                let idx = index.forest.add_node(id.clone());
                index.indices.insert(id.clone(), idx);
            }
        }

        for (order, edge) in edges.iter().enumerate() {
            let (Some(&from), Some(&to)) = (index.indices.get(&edge.from), index.indices.get(&edge.to))
            else {
                tracing::trace!(edge = %edge.id, "ignoring edge with missing endpoint");
                continue;
            };
            if edge.is_self_loop() {
                continue;
            }
            index
                .incoming
                .entry(edge.to.clone())
                .or_default()
                .push(edge.id.clone());

            if index.parents.contains_key(&edge.to) {
                tracing::debug!(node = %edge.to, edge = %edge.id, "extra parent edge ignored for tree structure");
                continue;
            }
            if has_path_connecting(&index.forest, to, from, None) {
                tracing::debug!(edge = %edge.id, "edge would close a cycle; ignored for tree structure");
                continue;
            }
            index.forest.add_edge(
                from,
                to,
                ParentLink {
                    edge: edge.id.clone(),
                    order,
                },
            );
            index.parents.insert(edge.to.clone(), edge.clone());
        }
        index
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn contains(&self, id: &NodeId) -> bool {
        self.indices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.indices.keys()
    }

    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.parents.get(id).map(|e| &e.from)
    }

    /// The edge chosen as `id`'s tree parent.
    pub fn parent_edge(&self, id: &NodeId) -> Option<&TreeEdge> {
        self.parents.get(id)
    }

    /// Number of incoming edges from nodes in the set, tree or not.
    pub fn incoming_count(&self, id: &NodeId) -> usize {
        self.incoming.get(id).map_or(0, |v| v.len())
    }

    pub fn has_incoming(&self, id: &NodeId) -> bool {
        self.incoming_count(id) > 0
    }

    /// Tree children in edge order.
    pub fn children(&self, id: &NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.indices.get(id) else {
            return Vec::new();
        };
        let mut children: Vec<(usize, NodeId)> = self
            .forest
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.weight().order, self.forest[e.target()].clone()))
            .collect();
        children.sort_by_key(|(order, _)| *order);
        children.into_iter().map(|(_, child)| child).collect()
    }

    /// Nodes without a tree parent, in node order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.indices
            .keys()
            .filter(|id| !self.parents.contains_key(*id))
            .cloned()
            .collect()
    }

    /// All descendants in depth-first pre-order, excluding `id` itself.
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            stack.extend(self.children(&next).into_iter().rev());
            out.push(next);
        }
        out
    }

    /// `id` followed by its descendants in pre-order.
    pub fn subtree(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = vec![id.clone()];
        out.extend(self.descendants(id));
        out
    }

    /// Ancestors from the parent upwards.
    pub fn ancestors(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            out.push(parent.clone());
            current = parent;
        }
        out
    }

    /// Distance from the tree root; roots have depth 0.
    pub fn depth(&self, id: &NodeId) -> Option<usize> {
        self.contains(id).then(|| self.ancestors(id).len())
    }

    /// The root of the tree containing `id`.
    pub fn root_of(&self, id: &NodeId) -> Option<NodeId> {
        if !self.contains(id) {
            return None;
        }
        Some(self.ancestors(id).pop().unwrap_or_else(|| id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::from(*n)).collect()
    }

    fn edge(id: &str, from: &str, to: &str) -> TreeEdge {
        TreeEdge::new(id, from, to)
    }

    fn sample() -> TreeIndex {
        // a -> b -> d
        //   -> c
        let nodes = ids(&["a", "b", "c", "d"]);
        TreeIndex::build(
            &nodes,
            &[edge("1", "a", "b"), edge("2", "a", "c"), edge("3", "b", "d")],
        )
    }

    #[test]
    fn parents_children_and_roots() {
        let tree = sample();
        assert_eq!(tree.roots(), ids(&["a"]));
        assert_eq!(tree.children(&NodeId::from("a")), ids(&["b", "c"]));
        assert_eq!(tree.parent(&NodeId::from("d")), Some(&NodeId::from("b")));
        assert_eq!(tree.depth(&NodeId::from("d")), Some(2));
        assert_eq!(tree.root_of(&NodeId::from("d")), Some(NodeId::from("a")));
    }

    #[test]
    fn descendants_are_preorder() {
        let tree = sample();
        assert_eq!(tree.descendants(&NodeId::from("a")), ids(&["b", "d", "c"]));
        assert_eq!(tree.subtree(&NodeId::from("b")), ids(&["b", "d"]));
        assert!(tree.descendants(&NodeId::from("c")).is_empty());
    }

    #[test]
    fn first_parent_wins() {
        let nodes = ids(&["a", "b", "c"]);
        let tree = TreeIndex::build(&nodes, &[edge("1", "b", "c"), edge("2", "a", "c")]);
        assert_eq!(tree.parent(&NodeId::from("c")), Some(&NodeId::from("b")));
        assert_eq!(tree.incoming_count(&NodeId::from("c")), 2);
        assert_eq!(tree.roots(), ids(&["a", "b"]));
    }

    #[test]
    fn cycles_do_not_loop_forever() {
        let nodes = ids(&["a", "b"]);
        let tree = TreeIndex::build(&nodes, &[edge("1", "a", "b"), edge("2", "b", "a")]);
        assert_eq!(tree.parent(&NodeId::from("b")), Some(&NodeId::from("a")));
        assert_eq!(tree.parent(&NodeId::from("a")), None);
        assert!(tree.has_incoming(&NodeId::from("a")));
        assert_eq!(tree.descendants(&NodeId::from("a")), ids(&["b"]));
    }

    #[test]
    fn orphan_edges_and_self_loops_are_ignored() {
        let nodes = ids(&["a", "b"]);
        let tree = TreeIndex::build(
            &nodes,
            &[edge("1", "a", "ghost"), edge("2", "b", "b"), edge("3", "ghost", "b")],
        );
        assert_eq!(tree.roots(), ids(&["a", "b"]));
        assert_eq!(tree.incoming_count(&NodeId::from("b")), 0);
        assert_eq!(tree.depth(&NodeId::from("ghost")), None);
    }

    #[test]
    fn sibling_order_follows_edge_order() {
        let nodes = ids(&["r", "z", "y", "x"]);
        let tree = TreeIndex::build(
            &nodes,
            &[edge("1", "r", "x"), edge("2", "r", "z"), edge("3", "r", "y")],
        );
        assert_eq!(tree.children(&NodeId::from("r")), ids(&["x", "z", "y"]));
    }
}
