//! The floating-state engine.
//!
//! # Lifecycle
//!
//! A node starts attached. When the last edge into it is deleted it becomes
//! a floating root, recording the edge's source as `originalParent`, and
//! every descendant is marked floating as a subtree member. When any edge
//! into a floating node is created, its record and those of its current
//! descendants are cleared. Deleting a floating node drops its record.
//!
//! # Representations
//!
//! Floating state lives in three places that can disagree: the persisted
//! document (written through [`AtomicMutator`]), the host's live node data,
//! and the floating class on rendered elements. Event handlers update all
//! three. [`FloatingStateEngine::reapply_all_floating_styles`] is the
//! periodic pass that recomputes the truth from the merged edge set and
//! repairs whichever copy drifted.
//!
//! A deleted edge can linger in the persisted document until the host
//! autosaves. The detach writes the edge's removal together with the new
//! records, and the detector keeps the id retired so neither polling nor
//! reconciliation mistakes the stale copy for a live parent.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use mindmap_core::edge::tree_edges;
use mindmap_core::floating::now_millis;
use mindmap_core::{
    CanvasDocument, CanvasEdge, CanvasNode, EdgeId, FloatingInfo, NodeId, NodePatch, TreeEdge, TreeIndex,
};
use mindmap_storage::AtomicMutator;

use crate::config::EngineSettings;
use crate::detector::EdgeChangeDetector;
use crate::host::HostGraphView;
use crate::style::StyleApplier;

/// What a reconciliation pass found and fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Nodes floating after the pass.
    pub floating: Vec<NodeId>,
    /// Records dropped because the node has a parent again.
    pub demoted: Vec<NodeId>,
    /// Subtree members that lost their own parent and became island roots.
    pub promoted: Vec<NodeId>,
    /// Records for nodes that no longer exist.
    pub purged: Vec<NodeId>,
    /// Whether the document was written.
    pub wrote: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.demoted.is_empty() && self.promoted.is_empty() && self.purged.is_empty() && !self.wrote
    }
}

/// Floating-state engine for one open document.
pub struct FloatingStateEngine {
    path: PathBuf,
    host: Arc<dyn HostGraphView>,
    mutator: AtomicMutator,
    styles: Arc<StyleApplier>,
    detector: EdgeChangeDetector,
    settings: EngineSettings,
    /// Last known-good records. May be stale between passes.
    cache: BTreeMap<NodeId, FloatingInfo>,
    styled: BTreeSet<NodeId>,
    /// Nodes shielded from reconciliation right after reconnecting.
    reconnected: HashMap<NodeId, Instant>,
}

impl FloatingStateEngine {
    pub fn new(
        path: impl Into<PathBuf>,
        host: Arc<dyn HostGraphView>,
        mutator: AtomicMutator,
        styles: Arc<StyleApplier>,
        settings: EngineSettings,
    ) -> Self {
        let path = path.into();
        let doc = mutator.load(&path);
        let live = tree_edges(&host.edges());
        let detector = EdgeChangeDetector::new(&merged_edges(live, doc.as_ref()));

        let mut cache = BTreeMap::new();
        if let Some(doc) = &doc {
            for (id, info) in doc.floating_nodes() {
                merge_record(&mut cache, id, info);
            }
        }
        for node in host.nodes() {
            if let Some(info) = node.floating.filter(|info| info.is_floating) {
                merge_record(&mut cache, node.id, info);
            }
        }

        FloatingStateEngine {
            path,
            host,
            mutator,
            styles,
            detector,
            settings,
            cache,
            styled: BTreeSet::new(),
            reconnected: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_floating(&self, id: &NodeId) -> bool {
        self.cache.contains_key(id)
    }

    pub fn record(&self, id: &NodeId) -> Option<&FloatingInfo> {
        self.cache.get(id)
    }

    pub fn floating_nodes(&self) -> &BTreeMap<NodeId, FloatingInfo> {
        &self.cache
    }

    /// Handles an `edge-delete` event. Returns `true` if the edge's target
    /// became floating.
    pub fn handle_edge_deleted(&mut self, edge: &CanvasEdge) -> bool {
        let Some(deleted) = edge.tree_edge() else {
            self.detector.forget(&edge.key());
            tracing::debug!(edge = %edge.id, "deleted edge has no resolvable endpoints");
            return false;
        };
        self.detector.retire(&deleted);

        let nodes = self.host.nodes();
        let edges: Vec<TreeEdge> = tree_edges(&self.host.edges())
            .into_iter()
            .filter(|e| e.id != deleted.id)
            .collect();
        let tree = build_tree(&nodes, &edges);
        if !tree.contains(&deleted.to) {
            tracing::debug!(node = %deleted.to, "target of deleted edge is gone");
            return false;
        }
        if tree.has_incoming(&deleted.to) {
            tracing::debug!(node = %deleted.to, "target still has an incoming edge");
            return false;
        }

        let now = now_millis();
        let mut records = BTreeMap::new();
        records.insert(deleted.to.clone(), FloatingInfo::root(deleted.from.clone(), now));
        for id in tree.descendants(&deleted.to) {
            let parent = tree.parent(&id).cloned().unwrap_or_else(|| deleted.to.clone());
            records.insert(id, FloatingInfo::subtree(parent, now));
        }
        for id in records.keys() {
            self.reconnected.remove(id);
        }

        let persisted = self.commit(&records, &[], Some(&deleted.id));
        self.host.refresh_controls(&deleted.from);
        self.host.request_update();
        self.host.request_save();
        tracing::info!(
            node = %deleted.to,
            original_parent = %deleted.from,
            subtree = records.len() - 1,
            persisted,
            "node detached"
        );
        true
    }

    /// Handles an `edge-create` event. Yields once first so the host can
    /// finish its own update. Returns the nodes that were reattached.
    pub async fn handle_edge_created(&mut self, edge: &CanvasEdge) -> Vec<NodeId> {
        tokio::task::yield_now().await;
        match edge.tree_edge() {
            Some(edge) => self.detector.announce(edge),
            None => tracing::debug!(edge = %edge.id, "created edge has no resolvable endpoints"),
        }
        self.process_new_edges()
    }

    /// Polling fallback: diffs the merged edge set against the last poll and
    /// handles edges that arrived without an event.
    pub fn check_for_new_edges(&mut self) -> Vec<NodeId> {
        let doc = self.mutator.load(&self.path);
        let edges = self
            .detector
            .without_retired(merged_edges(tree_edges(&self.host.edges()), doc.as_ref()));
        let queued = self.detector.poll(&edges);
        if queued > 0 {
            tracing::debug!(queued, "edges found by polling");
        }
        self.process_new_edges()
    }

    /// Handles a `node-delete` event. Returns whether a record was dropped.
    pub fn handle_node_deleted(&mut self, id: &NodeId) -> bool {
        self.styles.cancel(id);
        self.styled.remove(id);
        self.reconnected.remove(id);
        let cached = self.cache.remove(id).is_some();
        let persisted = self.mutator.modify(&self.path, |doc| doc.clear_floating(id));
        if cached || persisted {
            tracing::info!(node = %id, "floating record removed with node");
        }
        cached || persisted
    }

    /// Recomputes which nodes are really floating and repairs the document,
    /// the host's node data and element styles to match.
    ///
    /// Running it twice with nothing changed in between writes nothing the
    /// second time and reports clean.
    pub fn reapply_all_floating_styles(&mut self) -> ReconcileReport {
        let doc = self.mutator.load(&self.path);
        let host_nodes = self.host.nodes();
        let nodes: Vec<CanvasNode> = if host_nodes.is_empty() {
            doc.as_ref().map(|d| d.nodes.clone()).unwrap_or_default()
        } else {
            host_nodes
        };
        let edges = self
            .detector
            .without_retired(merged_edges(tree_edges(&self.host.edges()), doc.as_ref()));
        let tree = build_tree(&nodes, &edges);

        // Ids with a record somewhere outside the cache.
        let mut recorded = BTreeSet::new();
        let mut candidates = BTreeMap::new();
        if let Some(doc) = &doc {
            for (id, info) in doc.floating_nodes() {
                recorded.insert(id.clone());
                merge_record(&mut candidates, id, info);
            }
        }
        for node in &nodes {
            if let Some(info) = node.floating.as_ref().filter(|info| info.is_floating) {
                recorded.insert(node.id.clone());
                merge_record(&mut candidates, node.id.clone(), info.clone());
            }
        }
        for (id, info) in &self.cache {
            merge_record(&mut candidates, id.clone(), info.clone());
        }

        let window = self.settings.reconnect_debounce();
        self.reconnected.retain(|_, at| at.elapsed() < window);

        let mut report = ReconcileReport::default();
        let mut desired: BTreeMap<NodeId, FloatingInfo> = BTreeMap::new();
        let mut members = Vec::new();
        let mut refresh: BTreeSet<NodeId> = BTreeSet::new();
        for (id, info) in candidates.iter() {
            if !tree.contains(id) {
                report.purged.push(id.clone());
                continue;
            }
            if self.reconnected.contains_key(id) {
                // Shielded: a stale copy is cleared, but the reattach itself
                // already refreshed the parent.
                if recorded.contains(id) {
                    report.demoted.push(id.clone());
                }
                continue;
            }
            let parentless = !tree.has_incoming(id);
            match (info.is_subtree_node, parentless) {
                (false, true) => {
                    desired.insert(id.clone(), info.clone());
                }
                (false, false) => {
                    report.demoted.push(id.clone());
                    refresh.extend(tree.parent(id).cloned());
                }
                (true, true) => {
                    report.promoted.push(id.clone());
                    desired.insert(id.clone(), info.promoted());
                    if tree.contains(&info.original_parent) {
                        refresh.insert(info.original_parent.clone());
                    }
                }
                (true, false) => members.push((id, info)),
            }
        }
        // Subtree members stay floating only while their tree root is a
        // floating root.
        for (id, info) in members {
            let anchored = tree
                .root_of(id)
                .is_some_and(|root| desired.get(&root).is_some_and(|r| !r.is_subtree_node));
            if anchored {
                desired.insert(id.clone(), info.clone());
            } else {
                report.demoted.push(id.clone());
                refresh.extend(tree.parent(id).cloned());
            }
        }

        if let Some(doc) = &doc {
            if doc.clone().sync_floating(&desired) {
                report.wrote = self.mutator.modify(&self.path, |doc| doc.sync_floating(&desired));
            }
        }

        let mut mirrored = 0;
        for node in &nodes {
            let current = node.floating.as_ref().filter(|info| info.is_floating);
            let wanted = desired.get(&node.id);
            let agrees = match (current, wanted) {
                (Some(a), Some(b)) => a.same_attachment(b),
                (None, None) => true,
                _ => false,
            };
            if !agrees && self.mirror(&node.id, wanted.cloned()) {
                mirrored += 1;
            }
        }
        for parent in &refresh {
            self.host.refresh_controls(parent);
        }
        if mirrored > 0 || !refresh.is_empty() {
            self.host.request_update();
        }

        let stale: Vec<NodeId> = self
            .styled
            .iter()
            .chain(candidates.keys())
            .filter(|id| !desired.contains_key(*id) && tree.contains(id))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for id in &stale {
            self.style(id, false);
        }
        for id in &report.purged {
            self.styles.cancel(id);
            self.styled.remove(id);
        }
        for id in desired.keys() {
            self.style(id, true);
        }

        report.floating = desired.keys().cloned().collect();
        self.cache = desired;
        if report.is_clean() {
            tracing::debug!(floating = report.floating.len(), "floating state consistent");
        } else {
            tracing::info!(
                floating = report.floating.len(),
                demoted = report.demoted.len(),
                promoted = report.promoted.len(),
                purged = report.purged.len(),
                wrote = report.wrote,
                mirrored,
                "floating state repaired"
            );
        }
        report
    }

    fn process_new_edges(&mut self) -> Vec<NodeId> {
        let mut reattached = Vec::new();
        for edge in self.detector.drain() {
            reattached.extend(self.reattach(&edge));
        }
        reattached
    }

    fn reattach(&mut self, edge: &TreeEdge) -> Vec<NodeId> {
        if edge.is_self_loop() {
            return Vec::new();
        }
        let target = &edge.to;
        let live_record = self
            .host
            .node_data(target)
            .and_then(|n| n.floating)
            .filter(|info| info.is_floating);
        if !self.cache.contains_key(target) && live_record.is_none() {
            return Vec::new();
        }

        let nodes = self.host.nodes();
        let mut edges = tree_edges(&self.host.edges());
        if !edges.iter().any(|e| e.id == edge.id) {
            edges.push(edge.clone());
        }
        let tree = build_tree(&nodes, &edges);

        let mut cleared = vec![target.clone()];
        cleared.extend(
            tree.descendants(target)
                .into_iter()
                .filter(|id| self.cache.contains_key(id)),
        );
        let now = Instant::now();
        for id in &cleared {
            self.reconnected.insert(id.clone(), now);
        }

        let persisted = self.commit(&BTreeMap::new(), &cleared, None);
        self.host.refresh_controls(&edge.from);
        self.host.request_update();
        self.host.request_save();
        tracing::info!(node = %target, parent = %edge.from, cleared = cleared.len(), persisted, "node reattached");
        cleared
    }

    /// Writes `set` and clears `clear` in the document (dropping the
    /// `retired` edge there too), mirrors both into the host and updates
    /// styles. Returns whether the document was written.
    fn commit(
        &mut self,
        set: &BTreeMap<NodeId, FloatingInfo>,
        clear: &[NodeId],
        retired: Option<&EdgeId>,
    ) -> bool {
        let persisted = self.mutator.modify(&self.path, |doc| {
            let mut changed = false;
            if let Some(edge) = retired {
                changed |= doc.remove_edge(edge).is_some();
            }
            for id in clear {
                changed |= doc.clear_floating(id);
            }
            for (id, info) in set {
                changed |= doc.set_floating(id, info.clone());
            }
            changed
        });

        for id in clear {
            self.cache.remove(id);
            self.mirror(id, None);
            self.style(id, false);
        }
        for (id, info) in set {
            merge_record(&mut self.cache, id.clone(), info.clone());
            let record = self.cache.get(id).cloned();
            self.mirror(id, record);
            self.style(id, true);
        }
        persisted
    }

    /// Copies a record onto the host's node data. Returns whether the host
    /// accepted it.
    fn mirror(&self, id: &NodeId, record: Option<FloatingInfo>) -> bool {
        match self.host.set_node_data(id, &NodePatch::floating(record)) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(node = %id, error = %e, "host rejected floating update");
                false
            }
        }
    }

    fn style(&mut self, id: &NodeId, on: bool) {
        self.styles.apply(id, &self.settings.floating_class, on);
        if on {
            self.styled.insert(id.clone());
        } else {
            self.styled.remove(id);
        }
    }
}

impl std::fmt::Debug for FloatingStateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloatingStateEngine")
            .field("path", &self.path)
            .field("floating", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Inserts `info` unless an equivalent record is already there, so the
/// earliest timestamp survives.
fn merge_record(records: &mut BTreeMap<NodeId, FloatingInfo>, id: NodeId, info: FloatingInfo) {
    match records.get(&id) {
        Some(existing) if existing.same_attachment(&info) => {}
        _ => {
            records.insert(id, info);
        }
    }
}

/// Live edges plus persisted edges the host does not have (yet or any
/// more), deduplicated by id.
fn merged_edges(live: Vec<TreeEdge>, doc: Option<&CanvasDocument>) -> Vec<TreeEdge> {
    let mut ids: HashSet<_> = live.iter().map(|e| e.id.clone()).collect();
    let mut edges = live;
    if let Some(doc) = doc {
        edges.extend(doc.tree_edges().into_iter().filter(|e| ids.insert(e.id.clone())));
    }
    edges
}

fn build_tree(nodes: &[CanvasNode], edges: &[TreeEdge]) -> TreeIndex {
    TreeIndex::build(nodes.iter().map(|n| &n.id), edges)
}
