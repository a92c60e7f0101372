//! New-edge detection from two producers.
//!
//! Edges reach the engine either as host `edge-create` events or through a
//! polling diff of the edge set, for edges the host created without an
//! event. Both producers feed one channel; [`EdgeChangeDetector::drain`]
//! deduplicates by edge key (`from->to`) against the set of edges already
//! seen, so an edge announced by both paths is handled once.
//!
//! Deleted edges are retired by id. The persisted document can still hold a
//! retired edge until the host autosaves, so retired ids are filtered out of
//! every edge set the engine looks at until no copy carries them any more.

use std::collections::HashSet;

use tokio::sync::mpsc;

use mindmap_core::{EdgeId, EdgeKey, TreeEdge};
use mindmap_storage::{fingerprint_tree_edges, EdgeDiff};

/// Where a new edge was observed.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeSignal {
    Event(TreeEdge),
    Poll(TreeEdge),
}

impl EdgeSignal {
    pub fn edge(&self) -> &TreeEdge {
        match self {
            EdgeSignal::Event(edge) | EdgeSignal::Poll(edge) => edge,
        }
    }
}

#[derive(Debug)]
pub struct EdgeChangeDetector {
    tx: mpsc::UnboundedSender<EdgeSignal>,
    rx: mpsc::UnboundedReceiver<EdgeSignal>,
    seen: HashSet<EdgeKey>,
    retired: HashSet<EdgeId>,
    snapshot: Vec<TreeEdge>,
    fingerprint: blake3::Hash,
}

impl EdgeChangeDetector {
    /// Starts with `initial` as the already-known edge set.
    pub fn new(initial: &[TreeEdge]) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        EdgeChangeDetector {
            tx,
            rx,
            seen: initial.iter().map(TreeEdge::key).collect(),
            retired: HashSet::new(),
            snapshot: initial.to_vec(),
            fingerprint: fingerprint_tree_edges(initial),
        }
    }

    /// Producer handle for event sources outside the engine.
    pub fn sender(&self) -> mpsc::UnboundedSender<EdgeSignal> {
        self.tx.clone()
    }

    /// Event path. An announced edge is live again even if its id was
    /// retired.
    pub fn announce(&mut self, edge: TreeEdge) {
        self.retired.remove(&edge.id);
        // The receiver lives in `self`, so the channel cannot be closed here.
        let _ = self.tx.send(EdgeSignal::Event(edge));
    }

    /// Polling path. Compares `current` with the last polled snapshot and
    /// queues edges that appeared. Returns how many were queued.
    pub fn poll(&mut self, current: &[TreeEdge]) -> usize {
        let fingerprint = fingerprint_tree_edges(current);
        if fingerprint == self.fingerprint {
            return 0;
        }
        let diff = EdgeDiff::between(&self.snapshot, current);
        for removed in &diff.removed {
            self.seen.remove(&removed.key());
        }
        let queued = diff.added.len();
        for edge in diff.added {
            let _ = self.tx.send(EdgeSignal::Poll(edge));
        }
        self.snapshot = current.to_vec();
        self.fingerprint = fingerprint;
        queued
    }

    /// Forgets a deleted edge so that drawing it again counts as new, by
    /// either producer.
    pub fn forget(&mut self, key: &EdgeKey) {
        self.seen.remove(key);
        let before = self.snapshot.len();
        self.snapshot.retain(|e| e.key() != *key);
        if self.snapshot.len() != before {
            self.fingerprint = fingerprint_tree_edges(&self.snapshot);
        }
    }

    /// Forgets a deleted edge and retires its id.
    pub fn retire(&mut self, edge: &TreeEdge) {
        self.forget(&edge.key());
        self.retired.insert(edge.id.clone());
    }

    /// Drops retired edges from `edges`. Ids that no longer appear in
    /// `edges` at all are released.
    pub fn without_retired(&mut self, edges: Vec<TreeEdge>) -> Vec<TreeEdge> {
        if self.retired.is_empty() {
            return edges;
        }
        let present: HashSet<&str> = edges.iter().map(|e| e.id.as_str()).collect();
        self.retired.retain(|id| present.contains(id.as_str()));
        edges
            .into_iter()
            .filter(|e| !self.retired.contains(&e.id))
            .collect()
    }

    /// Takes every queued signal and returns the edges not seen before, in
    /// arrival order.
    pub fn drain(&mut self) -> Vec<TreeEdge> {
        let mut fresh = Vec::new();
        while let Ok(signal) = self.rx.try_recv() {
            let edge = signal.edge();
            if self.seen.insert(edge.key()) {
                tracing::debug!(edge = %edge.key(), ?signal, "new edge");
                fresh.push(edge.clone());
            } else {
                tracing::trace!(edge = %edge.key(), "edge already handled");
            }
        }
        fresh
    }
}
