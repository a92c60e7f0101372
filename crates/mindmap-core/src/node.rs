//! Canvas nodes as persisted by the host editor.
//!
//! [`CanvasNode`] mirrors one entry of the document's `nodes` array. Fields
//! this crate does not own (`color`, `url`, host-private keys) round-trip
//! through `extra`. Coordinates are read leniently: anything that is not a
//! number becomes NaN, which layout later clamps to zero.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::floating::FloatingInfo;
use crate::id::NodeId;

/// The host's node `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Text,
    File,
    Link,
    Group,
    /// Unrecognized type, kept verbatim.
    Other(String),
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => NodeKind::Text,
            "file" => NodeKind::File,
            "link" => NodeKind::Link,
            "group" => NodeKind::Group,
            _ => NodeKind::Other(s),
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Text => "text".to_string(),
            NodeKind::File => "file".to_string(),
            NodeKind::Link => "link".to_string(),
            NodeKind::Group => "group".to_string(),
            NodeKind::Other(s) => s,
        }
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from(self.clone()))
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(NodeKind::from(String::deserialize(deserializer)?))
    }
}

/// A node in the canvas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    #[serde(default)]
    pub id: NodeId,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default = "nan", deserialize_with = "lenient_f64", serialize_with = "compact_f64")]
    pub x: f64,
    #[serde(default = "nan", deserialize_with = "lenient_f64", serialize_with = "compact_f64")]
    pub y: f64,
    #[serde(default = "nan", deserialize_with = "lenient_f64", serialize_with = "compact_f64")]
    pub width: f64,
    #[serde(default = "nan", deserialize_with = "lenient_f64", serialize_with = "compact_f64")]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Redundant projection of the floating record; see `metadata.floatingNodes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating: Option<FloatingInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn nan() -> f64 {
    f64::NAN
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

/// Writes whole numbers without a fractional part, as the host does.
/// Non-finite values serialize as `null`.
fn compact_f64<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

impl CanvasNode {
    /// Creates a text node.
    pub fn text(id: impl Into<NodeId>, text: &str, x: f64, y: f64, width: f64, height: f64) -> Self {
        CanvasNode {
            id: id.into(),
            kind: NodeKind::Text,
            x,
            y,
            width,
            height,
            text: Some(text.to_string()),
            file: None,
            floating: None,
            extra: Map::new(),
        }
    }

    /// Creates a file node pointing at `file`.
    pub fn file(id: impl Into<NodeId>, file: &str, x: f64, y: f64, width: f64, height: f64) -> Self {
        CanvasNode {
            kind: NodeKind::File,
            text: None,
            file: Some(file.to_string()),
            ..CanvasNode::text(id, "", x, y, width, height)
        }
    }

    /// True when the node's own field carries an active floating record.
    pub fn is_floating(&self) -> bool {
        self.floating.as_ref().is_some_and(|f| f.is_floating)
    }
}

/// A partial node update, the structured counterpart of the host's
/// `setData(partial)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// `Some(None)` clears the floating field, `None` leaves it untouched.
    pub floating: Option<Option<FloatingInfo>>,
}

impl NodePatch {
    pub fn geometry(x: f64, y: f64, width: f64, height: f64) -> Self {
        NodePatch {
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
            floating: None,
        }
    }

    pub fn floating(record: Option<FloatingInfo>) -> Self {
        NodePatch {
            floating: Some(record),
            ..NodePatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == NodePatch::default()
    }

    /// Applies the patch, returning whether anything changed.
    pub fn apply(&self, node: &mut CanvasNode) -> bool {
        let mut changed = false;
        for (slot, value) in [
            (&mut node.x, self.x),
            (&mut node.y, self.y),
            (&mut node.width, self.width),
            (&mut node.height, self.height),
        ] {
            if let Some(v) = value {
                // NaN != NaN, so compare bit patterns to stay idempotent.
                if slot.to_bits() != v.to_bits() {
                    *slot = v;
                    changed = true;
                }
            }
        }
        if let Some(floating) = &self.floating {
            if node.floating != *floating {
                node.floating = floating.clone();
                changed = true;
            }
        }
        changed
    }
}
