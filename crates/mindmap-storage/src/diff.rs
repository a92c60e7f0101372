//! Edge-set differencing.
//!
//! Compares a previous edge snapshot with the current one by derived edge
//! key (`from->to`). An edge that was deleted and redrawn between the same
//! nodes under a new id is therefore not reported as new.

use std::collections::HashSet;

use mindmap_core::{EdgeKey, TreeEdge};

/// Edges added and removed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeDiff {
    /// Edges present now but not before, in current order.
    pub added: Vec<TreeEdge>,
    /// Edges present before but not now, in previous order.
    pub removed: Vec<TreeEdge>,
}

impl EdgeDiff {
    pub fn between(previous: &[TreeEdge], current: &[TreeEdge]) -> Self {
        let before: HashSet<EdgeKey> = previous.iter().map(TreeEdge::key).collect();
        let after: HashSet<EdgeKey> = current.iter().map(TreeEdge::key).collect();

        let mut seen = HashSet::new();
        let added = current
            .iter()
            .filter(|e| !before.contains(&e.key()) && seen.insert(e.key()))
            .cloned()
            .collect();
        let removed = previous
            .iter()
            .filter(|e| !after.contains(&e.key()))
            .cloned()
            .collect();

        EdgeDiff { added, removed }
    }

    /// Returns true if nothing changed.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_added_and_removed() {
        let before = vec![TreeEdge::new("1", "a", "b"), TreeEdge::new("2", "a", "c")];
        let after = vec![TreeEdge::new("1", "a", "b"), TreeEdge::new("3", "b", "d")];
        let diff = EdgeDiff::between(&before, &after);
        assert_eq!(diff.added, vec![TreeEdge::new("3", "b", "d")]);
        assert_eq!(diff.removed, vec![TreeEdge::new("2", "a", "c")]);
        assert!(!diff.is_clean());
    }

    #[test]
    fn redrawn_edge_is_not_new() {
        let before = vec![TreeEdge::new("1", "a", "b")];
        let after = vec![TreeEdge::new("9", "a", "b")];
        assert!(EdgeDiff::between(&before, &after).is_clean());
    }

    #[test]
    fn duplicate_new_edges_reported_once() {
        let after = vec![TreeEdge::new("1", "a", "b"), TreeEdge::new("2", "a", "b")];
        assert_eq!(EdgeDiff::between(&[], &after).added.len(), 1);
    }
}
