use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use mindmap_core::{CanvasDocument, CanvasEdge, CanvasNode, EdgeId, NodeId, NodePatch};
use mindmap_storage::DocumentStore;

use crate::error::{EngineError, HostError};
use crate::host::HostGraphView;

/// A host without a screen: the live graph is an in-memory copy of the
/// document, "elements" exist once a node is rendered, and `request_save`
/// writes the copy back to the store the way an editor autosave does.
pub struct HeadlessHost {
    store: Arc<dyn DocumentStore>,
    path: PathBuf,
    state: Mutex<HostState>,
    rendered: Arc<Notify>,
}

#[derive(Default)]
struct HostState {
    doc: CanvasDocument,
    elements: HashSet<NodeId>,
    classes: HashMap<NodeId, BTreeSet<String>>,
    transforms: HashMap<NodeId, (f64, f64)>,
    notifications: Vec<String>,
    refreshed: Vec<NodeId>,
    saves: usize,
    updates: usize,
    defer_render: bool,
    defer_save: bool,
    raw_updates_only: bool,
}

impl HeadlessHost {
    /// Loads the document at `path`, with every node already rendered.
    pub fn open(store: Arc<dyn DocumentStore>, path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        let doc = store
            .load(&path)?
            .ok_or_else(|| EngineError::DocumentMissing(path.clone()))?;
        Ok(Self::with_document(store, path, doc))
    }

    pub fn with_document(store: Arc<dyn DocumentStore>, path: impl Into<PathBuf>, doc: CanvasDocument) -> Self {
        let elements = doc.nodes.iter().map(|n| n.id.clone()).collect();
        HeadlessHost {
            store,
            path: path.into(),
            state: Mutex::new(HostState {
                doc,
                elements,
                ..HostState::default()
            }),
            rendered: Arc::new(Notify::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When set, nodes added afterwards have no element until
    /// [`HeadlessHost::render`] is called.
    pub fn set_defer_render(&self, defer: bool) {
        self.state().defer_render = defer;
    }

    /// When set, `request_save` is counted but nothing is written, like an
    /// editor whose autosave has not fired yet.
    pub fn set_defer_save(&self, defer: bool) {
        self.state().defer_save = defer;
    }

    /// When set, structured geometry updates are refused, as on hosts that
    /// only expose raw coordinates.
    pub fn set_raw_updates_only(&self, raw: bool) {
        self.state().raw_updates_only = raw;
    }

    pub fn add_node(&self, node: CanvasNode) -> Result<(), EngineError> {
        let mut state = self.state();
        let id = node.id.clone();
        state.doc.add_node(node)?;
        if !state.defer_render {
            state.elements.insert(id);
        }
        Ok(())
    }

    pub fn add_edge(&self, edge: CanvasEdge) -> Result<(), EngineError> {
        self.state().doc.add_edge(edge)?;
        Ok(())
    }

    pub fn remove_edge(&self, id: &EdgeId) -> Option<CanvasEdge> {
        self.state().doc.remove_edge(id)
    }

    pub fn remove_node(&self, id: &NodeId) -> Option<CanvasNode> {
        let mut state = self.state();
        state.elements.remove(id);
        state.classes.remove(id);
        state.doc.remove_node(id)
    }

    /// Creates the element for `id` and wakes anything waiting on renders.
    pub fn render(&self, id: &NodeId) {
        {
            let mut state = self.state();
            if !state.doc.contains_node(id) {
                return;
            }
            state.elements.insert(id.clone());
        }
        self.rendered.notify_waiters();
    }

    /// Replaces the live graph with what the store holds now.
    pub fn reload(&self) -> Result<bool, EngineError> {
        let Some(doc) = self.store.load(&self.path)? else {
            return Ok(false);
        };
        let mut state = self.state();
        let ids: HashSet<NodeId> = doc.nodes.iter().map(|n| n.id.clone()).collect();
        state.elements.retain(|id| ids.contains(id));
        if !state.defer_render {
            state.elements.extend(ids);
        }
        state.doc = doc;
        Ok(true)
    }

    pub fn document(&self) -> CanvasDocument {
        self.state().doc.clone()
    }

    pub fn classes(&self, id: &NodeId) -> BTreeSet<String> {
        self.state().classes.get(id).cloned().unwrap_or_default()
    }

    pub fn has_class(&self, id: &NodeId, class: &str) -> bool {
        self.state().classes.get(id).is_some_and(|c| c.contains(class))
    }

    pub fn transform(&self, id: &NodeId) -> Option<(f64, f64)> {
        self.state().transforms.get(id).copied()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.state().notifications.clone()
    }

    pub fn refreshed(&self) -> Vec<NodeId> {
        self.state().refreshed.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state().saves
    }

    pub fn update_count(&self) -> usize {
        self.state().updates
    }
}

impl HostGraphView for HeadlessHost {
    fn nodes(&self) -> Vec<CanvasNode> {
        self.state().doc.nodes.clone()
    }

    fn edges(&self) -> Vec<CanvasEdge> {
        self.state().doc.edges.clone()
    }

    fn node_data(&self, id: &NodeId) -> Option<CanvasNode> {
        self.state().doc.node(id).cloned()
    }

    fn set_node_data(&self, id: &NodeId, patch: &NodePatch) -> Result<(), HostError> {
        let mut state = self.state();
        let touches_geometry =
            patch.x.is_some() || patch.y.is_some() || patch.width.is_some() || patch.height.is_some();
        if touches_geometry && state.raw_updates_only {
            return Err(HostError::Unsupported);
        }
        if !state.doc.contains_node(id) {
            return Err(HostError::UnknownNode(id.clone()));
        }
        // The floating record lives on the node and in metadata; keep both.
        match &patch.floating {
            Some(Some(info)) => {
                state.doc.set_floating(id, info.clone());
            }
            Some(None) => {
                state.doc.clear_floating(id);
            }
            None => {}
        }
        let geometry = NodePatch {
            floating: None,
            ..patch.clone()
        };
        if let Some(node) = state.doc.node_mut(id) {
            geometry.apply(node);
        }
        Ok(())
    }

    fn set_node_position(&self, id: &NodeId, x: f64, y: f64, width: f64, height: f64) -> Result<(), HostError> {
        let mut state = self.state();
        let node = state
            .doc
            .node_mut(id)
            .ok_or_else(|| HostError::UnknownNode(id.clone()))?;
        node.x = x;
        node.y = y;
        node.width = width;
        node.height = height;
        state.updates += 1;
        Ok(())
    }

    fn set_visual_transform(&self, id: &NodeId, x: f64, y: f64) -> bool {
        let mut state = self.state();
        if !state.elements.contains(id) {
            return false;
        }
        state.transforms.insert(id.clone(), (x, y));
        true
    }

    fn has_element(&self, id: &NodeId) -> bool {
        self.state().elements.contains(id)
    }

    fn set_element_class(&self, id: &NodeId, class: &str, on: bool) -> bool {
        let mut state = self.state();
        if !state.elements.contains(id) {
            return false;
        }
        let classes = state.classes.entry(id.clone()).or_default();
        if on {
            classes.insert(class.to_string());
        } else {
            classes.remove(class);
        }
        true
    }

    fn render_signal(&self) -> Option<Arc<Notify>> {
        Some(self.rendered.clone())
    }

    /// Writes the live copy. `metadata.collapsedNodes` is not tracked by the
    /// host, so the stored value is carried over.
    fn request_save(&self) {
        let mut state = self.state();
        state.saves += 1;
        if state.defer_save {
            return;
        }
        let mut doc = state.doc.clone();
        match self.store.load(&self.path) {
            Ok(Some(stored)) => doc.metadata.collapsed_nodes = stored.metadata.collapsed_nodes,
            Ok(None) => {}
            Err(e) => tracing::debug!(path = %self.path.display(), error = %e, "stored copy unreadable"),
        }
        if let Err(e) = self.store.save(&self.path, &doc) {
            tracing::warn!(path = %self.path.display(), error = %e, "autosave failed");
        }
    }

    fn request_update(&self) {
        self.state().updates += 1;
    }

    fn refresh_controls(&self, id: &NodeId) {
        self.state().refreshed.push(id.clone());
    }

    fn notify(&self, message: &str) {
        tracing::info!(message, "host notice");
        self.state().notifications.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindmap_storage::InMemoryStore;

    fn host() -> (Arc<InMemoryStore>, HeadlessHost) {
        let store = Arc::new(InMemoryStore::new());
        let mut doc = CanvasDocument::default();
        doc.add_node(CanvasNode::text("a", "A", 0.0, 0.0, 100.0, 60.0)).unwrap();
        store.insert("m.canvas", doc.to_json().unwrap());
        let host = HeadlessHost::open(store.clone(), "m.canvas").unwrap();
        (store, host)
    }

    #[test]
    fn open_missing_document_fails() {
        let store = Arc::new(InMemoryStore::new());
        assert!(matches!(
            HeadlessHost::open(store, "none.canvas"),
            Err(EngineError::DocumentMissing(_))
        ));
    }

    #[test]
    fn classes_need_an_element() {
        let (_, host) = host();
        host.set_defer_render(true);
        host.add_node(CanvasNode::text("b", "B", 0.0, 0.0, 100.0, 60.0)).unwrap();
        let b = NodeId::from("b");
        assert!(!host.set_element_class(&b, "x", true));
        host.render(&b);
        assert!(host.set_element_class(&b, "x", true));
        assert!(host.has_class(&b, "x"));
    }

    #[test]
    fn request_save_writes_live_copy() {
        let (store, host) = host();
        host.add_node(CanvasNode::text("b", "B", 0.0, 0.0, 100.0, 60.0)).unwrap();
        host.request_save();
        let saved = store.load(Path::new("m.canvas")).unwrap().unwrap();
        assert!(saved.contains_node(&NodeId::from("b")));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn deferred_save_writes_nothing() {
        let (store, host) = host();
        host.set_defer_save(true);
        host.add_node(CanvasNode::text("b", "B", 0.0, 0.0, 100.0, 60.0)).unwrap();
        host.request_save();
        assert_eq!(host.save_count(), 1);
        assert_eq!(store.write_count(), 0);
        assert!(!store.load(Path::new("m.canvas")).unwrap().unwrap().contains_node(&NodeId::from("b")));
    }

    #[test]
    fn raw_only_host_refuses_structured_geometry() {
        let (_, host) = host();
        host.set_raw_updates_only(true);
        let a = NodeId::from("a");
        assert_eq!(
            host.set_node_data(&a, &NodePatch::geometry(1.0, 2.0, 3.0, 4.0)),
            Err(HostError::Unsupported)
        );
        host.set_node_position(&a, 1.0, 2.0, 3.0, 4.0).unwrap();
        assert_eq!(host.node_data(&a).unwrap().y, 2.0);
    }
}
