//! One open mindmap document: host events in, layout and floating state
//! out.
//!
//! Control flow for a structural change: the host raises an event, the
//! floating engine persists the new classification through the atomic
//! mutator and mirrors it into the host, then (with `auto_layout`) the
//! layout engine recomputes positions over the visible nodes and pushes
//! them back through the host, whose autosave closes the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use mindmap_core::edge::tree_edges;
use mindmap_core::{CanvasNode, NodeId, NodePatch};
use mindmap_layout::{LayoutEngine, LayoutInput, NodeBox};
use mindmap_storage::{AtomicMutator, DocumentStore, PathWatcher};

use crate::collapse::CollapseController;
use crate::config::MindmapSettings;
use crate::engine::{FloatingStateEngine, ReconcileReport};
use crate::error::EngineError;
use crate::host::{HostEvent, HostGraphView};
use crate::style::StyleApplier;

/// Message shown when layout fails.
pub const LAYOUT_FAILED_NOTICE: &str = "Mindmap layout could not be computed";

/// How a computed box reached the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutApplication {
    /// Through the host's structured update.
    Structured,
    /// By writing raw coordinates.
    Raw,
    /// Visual transform only; not persisted.
    Visual,
    Failed,
}

pub struct MindmapSession {
    path: PathBuf,
    host: Arc<dyn HostGraphView>,
    mutator: AtomicMutator,
    settings: MindmapSettings,
    layout: LayoutEngine,
    floating: FloatingStateEngine,
    collapse: CollapseController,
    watcher: PathWatcher,
    opening: ReconcileReport,
}

impl MindmapSession {
    /// Opens `path` and converges floating and collapse state once.
    pub fn open(
        store: Arc<dyn DocumentStore>,
        host: Arc<dyn HostGraphView>,
        path: impl Into<PathBuf>,
        settings: MindmapSettings,
    ) -> Self {
        let path = path.into();
        let mutator = AtomicMutator::new(Arc::clone(&store));
        let styles = Arc::new(StyleApplier::new(
            Arc::clone(&host),
            settings.engine.style_retry_schedule(),
        ));
        let floating = FloatingStateEngine::new(
            path.clone(),
            Arc::clone(&host),
            mutator.clone(),
            Arc::clone(&styles),
            settings.engine.clone(),
        );
        let collapse = CollapseController::new(
            path.clone(),
            Arc::clone(&host),
            mutator.clone(),
            styles,
            settings.engine.clone(),
        );
        let watcher = PathWatcher::new(store.as_ref(), path.clone());

        let mut session = MindmapSession {
            path,
            host,
            mutator,
            layout: LayoutEngine::new(settings.layout.clone()),
            settings,
            floating,
            collapse,
            watcher,
            opening: ReconcileReport::default(),
        };
        session.collapse.purge_missing();
        session.collapse.apply_styles();
        session.opening = session.floating.reapply_all_floating_styles();
        tracing::debug!(path = %session.path.display(), "mindmap session opened");
        session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn host(&self) -> &Arc<dyn HostGraphView> {
        &self.host
    }

    pub fn settings(&self) -> &MindmapSettings {
        &self.settings
    }

    pub fn floating(&self) -> &FloatingStateEngine {
        &self.floating
    }

    pub fn collapse(&self) -> &CollapseController {
        &self.collapse
    }

    /// What the reconciliation pass run by [`MindmapSession::open`] repaired.
    pub fn opening_report(&self) -> &ReconcileReport {
        &self.opening
    }

    /// Dispatches one host event.
    pub async fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::EdgeDeleted(edge) => {
                self.floating.handle_edge_deleted(&edge);
                self.relayout();
            }
            HostEvent::EdgeCreated(edge) => {
                self.floating.handle_edge_created(&edge).await;
                self.relayout();
            }
            HostEvent::NodeCreated(id) => {
                // Let the host settle the new node's size first.
                tokio::time::sleep(self.settings.engine.node_settle()).await;
                tracing::debug!(node = %id, "node created");
                self.floating.check_for_new_edges();
                self.relayout();
            }
            HostEvent::NodeDeleted(id) => {
                self.floating.handle_node_deleted(&id);
                self.collapse.forget(&id);
                self.relayout();
            }
            HostEvent::NodeMoved(id) => {
                tracing::trace!(node = %id, "node moved by user");
            }
        }
    }

    /// Lays out the visible nodes and pushes the result to the host. On
    /// failure the user gets a single notice and `false` is returned.
    pub fn arrange(&mut self) -> bool {
        match self.try_arrange() {
            Ok(moved) => {
                tracing::debug!(moved, "layout applied");
                true
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "layout failed");
                self.host.notify(LAYOUT_FAILED_NOTICE);
                false
            }
        }
    }

    /// Like [`MindmapSession::arrange`], returning the number of nodes whose
    /// geometry changed.
    pub fn try_arrange(&mut self) -> Result<usize, EngineError> {
        let all_nodes: IndexMap<NodeId, CanvasNode> =
            self.host.nodes().into_iter().map(|n| (n.id.clone(), n)).collect();
        let edges = tree_edges(&self.host.edges());
        let (_, visible) = self.collapse.visible();
        let visible_nodes: IndexMap<NodeId, CanvasNode> = visible
            .nodes
            .iter()
            .filter_map(|id| all_nodes.get(id).map(|n| (id.clone(), n.clone())))
            .collect();

        let doc = self.mutator.load(&self.path);
        let mut input = LayoutInput::new(&visible_nodes, &visible.edges)
            .with_original_edges(&edges)
            .with_all_nodes(&all_nodes);
        if let Some(doc) = &doc {
            input = input.with_document(doc);
        }
        let result = self.layout.arrange(&input)?;
        if result.is_empty() {
            tracing::debug!("nothing visible to lay out");
            return Ok(0);
        }

        let mut moved = 0;
        for (id, target) in result.iter() {
            if visible_nodes.get(id).is_some_and(|node| same_geometry(node, target)) {
                continue;
            }
            match self.apply_box(id, target) {
                LayoutApplication::Failed => {
                    tracing::debug!(node = %id, "could not position node");
                }
                _ => moved += 1,
            }
        }
        if moved > 0 {
            self.host.request_update();
            self.host.request_save();
        }
        self.collapse.apply_styles();
        Ok(moved)
    }

    /// Structured update, then raw coordinates, then a visual transform.
    fn apply_box(&self, id: &NodeId, target: &NodeBox) -> LayoutApplication {
        let patch = NodePatch::geometry(target.x, target.y, target.width, target.height);
        if self.host.set_node_data(id, &patch).is_ok() {
            return LayoutApplication::Structured;
        }
        if self
            .host
            .set_node_position(id, target.x, target.y, target.width, target.height)
            .is_ok()
        {
            return LayoutApplication::Raw;
        }
        if self.host.set_visual_transform(id, target.x, target.y) {
            return LayoutApplication::Visual;
        }
        LayoutApplication::Failed
    }

    /// Flips collapse on `id` and re-lays out. Returns the new flag.
    pub fn toggle_collapse(&mut self, id: &NodeId) -> Option<bool> {
        let collapsed = self.collapse.toggle(id)?;
        self.relayout();
        Some(collapsed)
    }

    /// Runs the reconciliation pass on its own.
    pub fn reconcile(&mut self) -> ReconcileReport {
        self.floating.reapply_all_floating_styles()
    }

    /// Periodic work: the new-edge polling fallback, then reconciliation.
    pub fn tick(&mut self) -> ReconcileReport {
        let reattached = self.floating.check_for_new_edges();
        let report = self.floating.reapply_all_floating_styles();
        if !reattached.is_empty() || !report.is_clean() {
            self.relayout();
        }
        report
    }

    /// The document changed on disk (host autosave, sync, another tool).
    pub fn handle_document_changed(&mut self) -> ReconcileReport {
        let collapse_changed = self.collapse.reload();
        let report = self.floating.reapply_all_floating_styles();
        if collapse_changed || !report.is_clean() {
            self.relayout();
        }
        report
    }

    /// Processes host events, polling ticks and document changes until the
    /// event channel closes.
    pub async fn run(&mut self, mut events: mpsc::Receiver<HostEvent>) {
        let mut ticker = tokio::time::interval(self.settings.engine.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watching = true;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    self.tick();
                }
                change = self.watcher.changed(), if watching => match change {
                    Some(_) => {
                        self.handle_document_changed();
                    }
                    None => watching = false,
                },
            }
        }
        tracing::debug!(path = %self.path.display(), "mindmap session closed");
    }

    fn relayout(&mut self) {
        if self.settings.engine.auto_layout {
            self.arrange();
        }
    }
}

impl std::fmt::Debug for MindmapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MindmapSession")
            .field("path", &self.path)
            .field("floating", &self.floating)
            .field("collapse", &self.collapse)
            .finish_non_exhaustive()
    }
}

fn same_geometry(node: &CanvasNode, target: &NodeBox) -> bool {
    node.x.to_bits() == target.x.to_bits()
        && node.y.to_bits() == target.y.to_bits()
        && node.width.to_bits() == target.width.to_bits()
        && node.height.to_bits() == target.height.to_bits()
}
