//! The persisted canvas document.
//!
//! [`CanvasDocument`] is the full `{nodes, edges, metadata}` JSON the host
//! editor reads and writes. This crate owns only `metadata.floatingNodes`,
//! `metadata.collapsedNodes` and each node's `floating` field; everything
//! else is carried through `extra` maps so a round trip never drops data the
//! host put there.
//!
//! # Floating records
//!
//! Floating state is stored twice: on the node itself and in
//! `metadata.floatingNodes`. Writers always update both; readers merge them
//! with the node field taking precedence, so documents that only populated
//! one side still load.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::edge::{tree_edges, CanvasEdge, TreeEdge};
use crate::error::CoreError;
use crate::floating::FloatingInfo;
use crate::id::{EdgeId, NodeId};
use crate::node::CanvasNode;
use crate::tree::TreeIndex;

/// Document-level metadata block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_nodes: Option<BTreeMap<NodeId, FloatingInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed_nodes: Option<Vec<NodeId>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.floating_nodes.is_none() && self.collapsed_nodes.is_none() && self.extra.is_empty()
    }
}

/// The full persisted graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasDocument {
    #[serde(default)]
    pub nodes: Vec<CanvasNode>,
    #[serde(default)]
    pub edges: Vec<CanvasEdge>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanvasDocument {
    /// Parses document text. Empty text is an empty document, which is what
    /// the host writes for a freshly created canvas.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        if text.trim().is_empty() {
            return Ok(CanvasDocument::default());
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes with tab indentation, matching the host's own output.
    pub fn to_json(&self) -> Result<String, CoreError> {
        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only ever emits UTF-8.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    // -----------------------------------------------------------------------
    // Node and edge access
    // -----------------------------------------------------------------------

    pub fn node(&self, id: &NodeId) -> Option<&CanvasNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut CanvasNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&CanvasEdge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Normalized edges; inert edges are dropped.
    pub fn tree_edges(&self) -> Vec<TreeEdge> {
        tree_edges(&self.edges)
    }

    /// Builds the tree index over this document's nodes and edges.
    pub fn tree(&self) -> TreeIndex {
        TreeIndex::build(self.nodes.iter().map(|n| &n.id), &self.tree_edges())
    }

    /// Appends a node, rejecting duplicate ids.
    pub fn add_node(&mut self, node: CanvasNode) -> Result<(), CoreError> {
        if self.contains_node(&node.id) {
            return Err(CoreError::DuplicateId { id: node.id.0 });
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Appends an edge, rejecting duplicate ids.
    pub fn add_edge(&mut self, edge: CanvasEdge) -> Result<(), CoreError> {
        if self.edge(&edge.id).is_some() {
            return Err(CoreError::DuplicateId { id: edge.id.0 });
        }
        self.edges.push(edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<CanvasEdge> {
        let pos = self.edges.iter().position(|e| &e.id == id)?;
        Some(self.edges.remove(pos))
    }

    /// Removes a node together with its edges, its floating record and its
    /// collapse flag, the same cascade the host performs.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<CanvasNode> {
        let pos = self.nodes.iter().position(|n| &n.id == id)?;
        let node = self.nodes.remove(pos);
        self.edges
            .retain(|e| e.from_id().as_ref() != Some(id) && e.to_id().as_ref() != Some(id));
        if let Some(map) = self.metadata.floating_nodes.as_mut() {
            map.remove(id);
        }
        if let Some(collapsed) = self.metadata.collapsed_nodes.as_mut() {
            collapsed.retain(|c| c != id);
        }
        Some(node)
    }

    // -----------------------------------------------------------------------
    // Floating records
    // -----------------------------------------------------------------------

    /// Merged view of all active floating records. Node fields win over
    /// metadata entries.
    pub fn floating_nodes(&self) -> BTreeMap<NodeId, FloatingInfo> {
        let mut merged: BTreeMap<NodeId, FloatingInfo> = self
            .metadata
            .floating_nodes
            .iter()
            .flatten()
            .map(|(id, info)| (id.clone(), info.clone()))
            .collect();
        for node in &self.nodes {
            if let Some(info) = &node.floating {
                merged.insert(node.id.clone(), info.clone());
            }
        }
        merged.retain(|_, info| info.is_floating);
        merged
    }

    pub fn floating_record(&self, id: &NodeId) -> Option<FloatingInfo> {
        let from_node = self.node(id).and_then(|n| n.floating.clone());
        let record = from_node.or_else(|| {
            self.metadata
                .floating_nodes
                .as_ref()
                .and_then(|m| m.get(id).cloned())
        });
        record.filter(|info| info.is_floating)
    }

    /// Writes a floating record to both locations. An existing record with
    /// the same attachment keeps its original timestamp. Returns whether the
    /// document changed; a missing node is left alone.
    pub fn set_floating(&mut self, id: &NodeId, info: FloatingInfo) -> bool {
        let record = match self.floating_record(id) {
            Some(existing) if existing.same_attachment(&info) => existing,
            _ => info,
        };
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        let mut changed = false;
        if node.floating.as_ref() != Some(&record) {
            node.floating = Some(record.clone());
            changed = true;
        }
        let map = self.metadata.floating_nodes.get_or_insert_with(BTreeMap::new);
        if map.get(id) != Some(&record) {
            map.insert(id.clone(), record);
            changed = true;
        }
        changed
    }

    /// Removes a floating record from both locations.
    pub fn clear_floating(&mut self, id: &NodeId) -> bool {
        let mut changed = false;
        if let Some(node) = self.node_mut(id) {
            if node.floating.take().is_some() {
                changed = true;
            }
        }
        if let Some(map) = self.metadata.floating_nodes.as_mut() {
            if map.remove(id).is_some() {
                changed = true;
            }
        }
        changed
    }

    /// Makes the stored floating records match `desired` exactly: records
    /// not in `desired` are cleared, the rest are written to both places.
    pub fn sync_floating(&mut self, desired: &BTreeMap<NodeId, FloatingInfo>) -> bool {
        let mut stored: BTreeSet<NodeId> = self
            .metadata
            .floating_nodes
            .iter()
            .flatten()
            .map(|(id, _)| id.clone())
            .collect();
        stored.extend(
            self.nodes
                .iter()
                .filter(|n| n.floating.is_some())
                .map(|n| n.id.clone()),
        );

        let mut changed = false;
        for id in stored.iter().filter(|id| !desired.contains_key(*id)) {
            changed |= self.clear_floating(id);
        }
        for (id, info) in desired {
            changed |= self.set_floating(id, info.clone());
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Collapse flags
    // -----------------------------------------------------------------------

    pub fn collapsed_nodes(&self) -> BTreeSet<NodeId> {
        self.metadata
            .collapsed_nodes
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Replaces the persisted collapse set. Returns whether it changed.
    pub fn set_collapsed_nodes(&mut self, collapsed: &BTreeSet<NodeId>) -> bool {
        if self.collapsed_nodes() == *collapsed && self.metadata.collapsed_nodes.is_some() {
            return false;
        }
        if collapsed.is_empty() && self.metadata.collapsed_nodes.is_none() {
            return false;
        }
        self.metadata.collapsed_nodes = Some(collapsed.iter().cloned().collect());
        true
    }
}
