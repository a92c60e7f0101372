//! The host editor as seen by the engine.
//!
//! [`HostGraphView`] is the narrow surface the engine needs from the canvas
//! editor: the live node and edge lists, per-node updates, style classes on
//! rendered elements, and the save/update hooks. [`HeadlessHost`] implements
//! it over a [`mindmap_storage::DocumentStore`] for the CLI and for tests.

use std::sync::Arc;

use tokio::sync::Notify;

use mindmap_core::{CanvasEdge, CanvasNode, NodeId, NodePatch};

use crate::error::HostError;

mod headless;

pub use headless::HeadlessHost;

/// Structural events raised by the host editor.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    EdgeCreated(CanvasEdge),
    EdgeDeleted(CanvasEdge),
    NodeCreated(NodeId),
    NodeDeleted(NodeId),
    NodeMoved(NodeId),
}

/// Live, mutable graph owned by the host editor.
pub trait HostGraphView: Send + Sync {
    fn nodes(&self) -> Vec<CanvasNode>;

    fn edges(&self) -> Vec<CanvasEdge>;

    fn node_data(&self, id: &NodeId) -> Option<CanvasNode>;

    /// Structured partial update (`setData`). Position and size changes made
    /// this way also trigger the host's own resize handling.
    fn set_node_data(&self, id: &NodeId, patch: &NodePatch) -> Result<(), HostError>;

    /// Writes raw coordinates and asks the node to redraw.
    fn set_node_position(
        &self,
        _id: &NodeId,
        _x: f64,
        _y: f64,
        _width: f64,
        _height: f64,
    ) -> Result<(), HostError> {
        Err(HostError::Unsupported)
    }

    /// Moves the rendered element only. Nothing is persisted.
    fn set_visual_transform(&self, _id: &NodeId, _x: f64, _y: f64) -> bool {
        false
    }

    fn has_element(&self, id: &NodeId) -> bool;

    /// Adds or removes a class on the node's element. Returns `false` if
    /// the element does not exist yet.
    fn set_element_class(&self, id: &NodeId, class: &str, on: bool) -> bool;

    /// Signalled whenever new elements finish rendering. Hosts without such
    /// a signal return `None` and style retries fall back to plain delays.
    fn render_signal(&self) -> Option<Arc<Notify>> {
        None
    }

    /// Persist the in-memory graph (the host's own autosave).
    fn request_save(&self);

    /// Redraw after in-memory changes.
    fn request_update(&self);

    /// A node gained or lost a visible child; refresh its buttons/overlays.
    fn refresh_controls(&self, _id: &NodeId) {}

    /// Show a single user-facing message.
    fn notify(&self, _message: &str) {}
}
