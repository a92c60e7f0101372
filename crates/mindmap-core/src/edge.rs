//! Canvas edges and the canonical tree-edge view.
//!
//! The persisted document stores edge endpoints in several shapes: a bare
//! node id string, or an object wrapping an id. [`CanvasEdge`] keeps whatever
//! shape was read so it is written back untouched, and normalizes on access.
//! Everything past the ingress boundary works with [`TreeEdge`], which only
//! exists when both endpoints resolve to a node id.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{EdgeId, NodeId};

// ---------------------------------------------------------------------------
// Endpoint normalization
// ---------------------------------------------------------------------------

/// Keys checked, in order, when an endpoint is an object.
const WRAPPED_ID_KEYS: [&str; 3] = ["id", "nodeId", "node"];

/// One end of a persisted edge, in whatever shape the document used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    /// Bare node id.
    Id(String),
    /// Object wrapping a node id (`{"id": "..."}`, `{"node": {...}}`).
    Object(Map<String, Value>),
    /// Anything else. Never resolves to a node.
    Other(Value),
}

impl Endpoint {
    /// Resolves the endpoint to a node id. Returns `None` for shapes that do
    /// not carry a usable id; such edges are inert for tree purposes.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Endpoint::Id(id) => non_empty(id),
            Endpoint::Object(map) => id_from_object(map),
            Endpoint::Other(_) => None,
        }
    }
}

impl From<&NodeId> for Endpoint {
    fn from(id: &NodeId) -> Self {
        Endpoint::Id(id.0.clone())
    }
}

fn non_empty(id: &str) -> Option<NodeId> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(NodeId::from(trimmed))
    }
}

fn id_from_object(map: &Map<String, Value>) -> Option<NodeId> {
    WRAPPED_ID_KEYS.iter().find_map(|key| match map.get(*key)? {
        Value::String(id) => non_empty(id),
        Value::Object(inner) => id_from_object(inner),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Persisted edge
// ---------------------------------------------------------------------------

/// An edge exactly as stored in the canvas document.
///
/// Unknown fields (`fromSide`, `toSide`, `color`, labels) are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasEdge {
    #[serde(default)]
    pub id: EdgeId,
    #[serde(rename = "fromNode", default, skip_serializing_if = "Option::is_none")]
    pub from_node: Option<Endpoint>,
    #[serde(rename = "toNode", default, skip_serializing_if = "Option::is_none")]
    pub to_node: Option<Endpoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanvasEdge {
    /// Creates an edge with bare-id endpoints, the shape the host writes.
    pub fn new(id: impl Into<EdgeId>, from: &NodeId, to: &NodeId) -> Self {
        CanvasEdge {
            id: id.into(),
            from_node: Some(Endpoint::from(from)),
            to_node: Some(Endpoint::from(to)),
            extra: Map::new(),
        }
    }

    /// Normalized source node id.
    pub fn from_id(&self) -> Option<NodeId> {
        self.from_node.as_ref().and_then(Endpoint::node_id)
    }

    /// Normalized target node id.
    pub fn to_id(&self) -> Option<NodeId> {
        self.to_node.as_ref().and_then(Endpoint::node_id)
    }

    /// Canonical view of this edge, or `None` when an endpoint is unusable.
    pub fn tree_edge(&self) -> Option<TreeEdge> {
        Some(TreeEdge {
            id: self.id.clone(),
            from: self.from_id()?,
            to: self.to_id()?,
        })
    }

    /// Derived identity used for new-edge deduplication: `from->to` when
    /// both endpoints resolve, otherwise the edge id.
    pub fn key(&self) -> EdgeKey {
        match (self.from_id(), self.to_id()) {
            (Some(from), Some(to)) => EdgeKey::between(&from, &to),
            _ => EdgeKey(format!("#{}", self.id)),
        }
    }
}

/// Normalizes a slice of persisted edges, dropping inert ones.
pub fn tree_edges<'a>(edges: impl IntoIterator<Item = &'a CanvasEdge>) -> Vec<TreeEdge> {
    edges.into_iter().filter_map(CanvasEdge::tree_edge).collect()
}

// ---------------------------------------------------------------------------
// Canonical edge
// ---------------------------------------------------------------------------

/// A normalized edge with both endpoints resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
}

impl TreeEdge {
    pub fn new(id: impl Into<EdgeId>, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        TreeEdge {
            id: id.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::between(&self.from, &self.to)
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

impl From<&TreeEdge> for CanvasEdge {
    fn from(edge: &TreeEdge) -> Self {
        CanvasEdge::new(edge.id.clone(), &edge.from, &edge.to)
    }
}

/// Derived edge identity used to deduplicate edge notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(pub String);

impl EdgeKey {
    pub fn between(from: &NodeId, to: &NodeId) -> Self {
        EdgeKey(format!("{}->{}", from, to))
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
