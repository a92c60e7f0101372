//! Collapse state with persistence and element styling.
//!
//! The collapsed set is stored in `metadata.collapsedNodes` so it survives
//! reloads. Collapsed nodes get the collapsed class; nodes hidden under
//! them get the hidden class and are left out of layout.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use mindmap_core::edge::tree_edges;
use mindmap_core::{CollapseState, NodeId, TreeIndex, VisibilityResolver, VisibleSet};
use mindmap_storage::AtomicMutator;

use crate::config::EngineSettings;
use crate::host::HostGraphView;
use crate::style::StyleApplier;

pub struct CollapseController {
    path: PathBuf,
    host: Arc<dyn HostGraphView>,
    mutator: AtomicMutator,
    styles: Arc<StyleApplier>,
    settings: EngineSettings,
    state: CollapseState,
    collapsed_styled: BTreeSet<NodeId>,
    hidden_styled: BTreeSet<NodeId>,
}

impl CollapseController {
    /// Restores the collapsed set persisted in the document.
    pub fn new(
        path: impl Into<PathBuf>,
        host: Arc<dyn HostGraphView>,
        mutator: AtomicMutator,
        styles: Arc<StyleApplier>,
        settings: EngineSettings,
    ) -> Self {
        let path = path.into();
        let state = mutator
            .load(&path)
            .map(|doc| CollapseState::from_document(&doc))
            .unwrap_or_default();
        CollapseController {
            path,
            host,
            mutator,
            styles,
            settings,
            state,
            collapsed_styled: BTreeSet::new(),
            hidden_styled: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> &CollapseState {
        &self.state
    }

    pub fn is_collapsed(&self, id: &NodeId) -> bool {
        self.state.is_collapsed(id)
    }

    /// Flips the collapsed flag of `id`. Returns the new flag, or `None` if
    /// the host has no such node.
    pub fn toggle(&mut self, id: &NodeId) -> Option<bool> {
        if self.host.node_data(id).is_none() {
            tracing::debug!(node = %id, "collapse toggle for unknown node");
            return None;
        }
        let collapsed = self.state.toggle(id);
        self.persist();
        self.apply_styles();
        self.host.refresh_controls(id);
        self.host.request_update();
        tracing::info!(node = %id, collapsed, "collapse toggled");
        Some(collapsed)
    }

    /// Drops a deleted node from the collapsed set.
    pub fn forget(&mut self, id: &NodeId) -> bool {
        if !self.state.expand(id) {
            return false;
        }
        self.persist();
        self.collapsed_styled.remove(id);
        self.hidden_styled.remove(id);
        true
    }

    /// Drops ids of nodes the host no longer has.
    pub fn purge_missing(&mut self) -> Vec<NodeId> {
        let present: BTreeSet<NodeId> = self.host.nodes().into_iter().map(|n| n.id).collect();
        let removed = self.state.retain_existing(|id| present.contains(id));
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "dropped collapse flags of deleted nodes");
            self.persist();
        }
        removed
    }

    /// Re-reads the persisted set, e.g. after an external change.
    pub fn reload(&mut self) -> bool {
        let Some(doc) = self.mutator.load(&self.path) else {
            return false;
        };
        let state = CollapseState::from_document(&doc);
        if state == self.state {
            return false;
        }
        self.state = state;
        self.apply_styles();
        true
    }

    /// Visible nodes and edges of the host graph under the current state.
    pub fn visible(&self) -> (TreeIndex, VisibleSet) {
        let nodes = self.host.nodes();
        let edges = tree_edges(&self.host.edges());
        let tree = TreeIndex::build(nodes.iter().map(|n| &n.id), &edges);
        let visible = VisibilityResolver::new(&tree, &self.state).resolve(&edges);
        (tree, visible)
    }

    /// Brings collapsed and hidden classes in line with the current state.
    pub fn apply_styles(&mut self) {
        let (tree, visible) = self.visible();

        let collapsed: BTreeSet<NodeId> = self
            .state
            .iter()
            .filter(|id| tree.contains(id) && !visible.hidden.contains(*id))
            .cloned()
            .collect();
        for id in self.collapsed_styled.difference(&collapsed) {
            self.styles.apply(id, &self.settings.collapsed_class, false);
        }
        for id in &collapsed {
            self.styles.apply(id, &self.settings.collapsed_class, true);
        }
        for id in self.hidden_styled.difference(&visible.hidden) {
            self.styles.apply(id, &self.settings.hidden_class, false);
        }
        for id in &visible.hidden {
            self.styles.apply(id, &self.settings.hidden_class, true);
        }
        self.collapsed_styled = collapsed;
        self.hidden_styled = visible.hidden;
    }

    fn persist(&self) -> bool {
        let collapsed = self.state.as_set();
        self.mutator
            .modify(&self.path, |doc| doc.set_collapsed_nodes(collapsed))
    }
}

impl std::fmt::Debug for CollapseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollapseController")
            .field("path", &self.path)
            .field("collapsed", &self.state.len())
            .finish_non_exhaustive()
    }
}
