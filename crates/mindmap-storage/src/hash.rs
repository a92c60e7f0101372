//! Deterministic fingerprints of edge sets using blake3.
//!
//! The new-edge polling fallback runs often and usually finds nothing. A
//! fingerprint over the sorted edge ids lets it skip the full diff when the
//! edge set is unchanged.
//!
//! # Determinism
//!
//! Ids are sorted before hashing and each id is followed by a NUL separator,
//! so the same set always produces the same hash regardless of order and
//! `["ab"]` never collides with `["a", "b"]`.

use mindmap_core::{CanvasEdge, TreeEdge};

/// Fingerprint of a persisted edge list, keyed on edge ids.
pub fn fingerprint_edges(edges: &[CanvasEdge]) -> blake3::Hash {
    fingerprint_ids(edges.iter().map(|e| e.id.as_str()))
}

/// Fingerprint of a normalized edge list, keyed on edge ids.
pub fn fingerprint_tree_edges(edges: &[TreeEdge]) -> blake3::Hash {
    fingerprint_ids(edges.iter().map(|e| e.id.as_str()))
}

fn fingerprint_ids<'a>(ids: impl Iterator<Item = &'a str>) -> blake3::Hash {
    let mut sorted: Vec<&str> = ids.collect();
    sorted.sort_unstable();
    let mut hasher = blake3::Hasher::new();
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}
