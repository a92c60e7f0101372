//! End-to-end floating-state scenarios over a headless host.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mindmap_core::{CanvasDocument, CanvasEdge, CanvasNode, EdgeId, FloatingInfo, NodeId};
use mindmap_engine::session::LAYOUT_FAILED_NOTICE;
use mindmap_engine::{HeadlessHost, HostEvent, HostGraphView, MindmapSession, MindmapSettings};
use mindmap_storage::{DocumentStore, InMemoryStore};

const PATH: &str = "map.canvas";

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn document(nodes: &[&str], edges: &[(&str, &str, &str)]) -> CanvasDocument {
    let mut doc = CanvasDocument::default();
    for (i, name) in nodes.iter().enumerate() {
        doc.add_node(CanvasNode::text(*name, name, 0.0, i as f64 * 100.0, 300.0, 60.0))
            .unwrap();
    }
    for (edge, from, to) in edges {
        doc.add_edge(CanvasEdge::new(*edge, &id(from), &id(to))).unwrap();
    }
    doc
}

struct Fixture {
    store: Arc<InMemoryStore>,
    host: Arc<HeadlessHost>,
    session: MindmapSession,
}

impl Fixture {
    fn open(doc: CanvasDocument) -> Self {
        Self::open_with(doc, MindmapSettings::default())
    }

    fn open_with(doc: CanvasDocument, settings: MindmapSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store.insert(PATH, doc.to_json().unwrap());
        let host = Arc::new(HeadlessHost::open(store.clone(), PATH).unwrap());
        let session = MindmapSession::open(store.clone(), host.clone(), PATH, settings);
        Fixture { store, host, session }
    }

    fn persisted(&self) -> CanvasDocument {
        self.store.load(Path::new(PATH)).unwrap().unwrap()
    }

    async fn delete_edge(&mut self, edge: &str) {
        let edge = self.host.remove_edge(&EdgeId::from(edge)).unwrap();
        self.session.handle_event(HostEvent::EdgeDeleted(edge)).await;
    }

    async fn create_edge(&mut self, edge: &str, from: &str, to: &str) {
        let edge = CanvasEdge::new(edge, &id(from), &id(to));
        self.host.add_edge(edge.clone()).unwrap();
        self.session.handle_event(HostEvent::EdgeCreated(edge)).await;
    }

    fn x_of(&self, node: &str) -> f64 {
        self.host.node_data(&id(node)).unwrap().x
    }
}

#[tokio::test]
async fn detach_and_reattach_child() {
    let mut fx = Fixture::open(document(&["A", "B", "C"], &[("ab", "A", "B"), ("ac", "A", "C")]));
    assert!(fx.session.arrange());
    let column_one = fx.x_of("B");
    assert_eq!(fx.x_of("C"), column_one);

    fx.delete_edge("ac").await;

    let record = fx.session.floating().record(&id("C")).cloned().unwrap();
    assert_eq!(record.original_parent, id("A"));
    assert!(!record.is_subtree_node);
    let persisted = fx.persisted();
    assert_eq!(persisted.floating_record(&id("C")), Some(record.clone()));
    assert_eq!(
        persisted.metadata.floating_nodes.as_ref().and_then(|m| m.get(&id("C"))),
        Some(&record)
    );
    assert!(fx.host.has_class(&id("C"), "mindmap-floating"));
    assert!(fx.host.refreshed().contains(&id("A")));
    // The island keeps the column next to its former parent.
    assert_eq!(fx.x_of("C"), column_one);

    let refreshed = fx.host.refreshed().len();
    fx.create_edge("ac2", "A", "C").await;

    assert!(!fx.session.floating().is_floating(&id("C")));
    assert!(fx.host.refreshed()[refreshed..].contains(&id("A")));
    let persisted = fx.persisted();
    assert_eq!(persisted.floating_record(&id("C")), None);
    assert!(persisted.floating_nodes().is_empty());
    assert!(!fx.host.has_class(&id("C"), "mindmap-floating"));
    assert_eq!(fx.x_of("C"), column_one);
}

#[tokio::test]
async fn edge_from_second_parent_keeps_node_attached() {
    let mut fx = Fixture::open(document(
        &["A", "B", "C"],
        &[("ac", "A", "C"), ("bc", "B", "C")],
    ));
    fx.delete_edge("ac").await;
    assert!(!fx.session.floating().is_floating(&id("C")));
    assert!(fx.persisted().floating_nodes().is_empty());
}

#[tokio::test]
async fn subtree_moves_as_a_unit() {
    let mut fx = Fixture::open(document(
        &["A", "B", "D", "E"],
        &[("ab", "A", "B"), ("bd", "B", "D"), ("be", "B", "E")],
    ));
    fx.delete_edge("ab").await;

    let floating = fx.persisted().floating_nodes();
    assert_eq!(floating.len(), 3);
    assert!(!floating[&id("B")].is_subtree_node);
    for member in ["D", "E"] {
        let record = &floating[&id(member)];
        assert!(record.is_subtree_node);
        assert_eq!(record.original_parent, id("B"));
    }

    // D independently loses its edge, then B is reconnected.
    fx.delete_edge("bd").await;
    fx.create_edge("ab2", "A", "B").await;

    let floating = fx.persisted().floating_nodes();
    assert!(!floating.contains_key(&id("B")));
    assert!(!floating.contains_key(&id("E")));
    let d = &floating[&id("D")];
    assert!(!d.is_subtree_node);
    assert_eq!(d.original_parent, id("B"));
}

#[tokio::test]
async fn reconciliation_repairs_then_settles() {
    let mut fx = Fixture::open(document(&["A", "B", "C"], &[("ab", "A", "B")]));

    // Stale state from an earlier session: B claims to float while it has a
    // parent, and a record survives for a node that no longer exists.
    let mut stale = fx.persisted();
    stale.set_floating(&id("B"), FloatingInfo::root(id("A"), 1));
    stale
        .metadata
        .floating_nodes
        .get_or_insert_with(BTreeMap::new)
        .insert(id("ghost"), FloatingInfo::root(id("A"), 1));
    fx.store.insert(PATH, stale.to_json().unwrap());

    let first = fx.session.reconcile();
    assert_eq!(first.demoted, vec![id("B")]);
    assert_eq!(first.purged, vec![id("ghost")]);
    assert!(first.wrote);
    // B is a visible child of A again.
    assert_eq!(fx.host.refreshed(), vec![id("A")]);
    assert!(fx.persisted().floating_nodes().is_empty());
    assert!(fx.persisted().metadata.floating_nodes.unwrap_or_default().is_empty());

    let writes = fx.store.write_count();
    let second = fx.session.reconcile();
    assert!(second.is_clean(), "{second:?}");
    assert_eq!(second.floating, first.floating);
    assert_eq!(fx.store.write_count(), writes);
    assert_eq!(fx.host.refreshed(), vec![id("A")]);
}

#[tokio::test]
async fn detach_survives_pending_autosave() {
    let mut fx = Fixture::open(document(&["A", "B", "C"], &[("ab", "A", "B"), ("ac", "A", "C")]));
    fx.host.set_defer_save(true);
    fx.delete_edge("ac").await;

    // Only the engine's own write has reached the file.
    let persisted = fx.persisted();
    assert!(persisted.edge(&EdgeId::from("ac")).is_none());
    assert!(persisted.floating_record(&id("C")).is_some());

    let report = fx.session.tick();
    assert!(report.demoted.is_empty(), "{report:?}");
    assert!(fx.session.floating().is_floating(&id("C")));
    assert!(fx.persisted().floating_record(&id("C")).is_some());
}

#[tokio::test]
async fn stale_autosave_does_not_undo_detach() {
    let mut fx = Fixture::open(document(&["A", "B", "C"], &[("ab", "A", "B"), ("ac", "A", "C")]));
    let before_delete = fx.persisted();
    fx.host.set_defer_save(true);
    fx.delete_edge("ac").await;

    // An autosave of the pre-delete copy lands after the detach.
    fx.store.insert(PATH, before_delete.to_json().unwrap());

    let report = fx.session.tick();
    assert!(report.demoted.is_empty(), "{report:?}");
    assert!(fx.session.floating().is_floating(&id("C")));
    let record = fx.persisted().floating_record(&id("C")).unwrap();
    assert_eq!(record.original_parent, id("A"));

    // Once the host saves, the edge is gone everywhere and nothing changes.
    fx.host.set_defer_save(false);
    fx.host.request_save();
    fx.session.tick();
    assert!(fx.session.floating().is_floating(&id("C")));
    assert!(fx.session.reconcile().is_clean());
}

#[tokio::test]
async fn orphaned_subtree_member_is_promoted() {
    let mut fx = Fixture::open(document(&["A", "B", "D"], &[("ab", "A", "B"), ("bd", "B", "D")]));
    fx.delete_edge("ab").await;
    // B is deleted outright; D keeps a subtree record but has no parent.
    fx.host.remove_node(&id("B"));
    fx.session.handle_event(HostEvent::NodeDeleted(id("B"))).await;

    let report = fx.session.reconcile();
    assert_eq!(report.promoted, vec![id("D")]);
    let d = fx.persisted().floating_record(&id("D")).unwrap();
    assert!(!d.is_subtree_node);
    assert!(fx.persisted().floating_record(&id("B")).is_none());
}

#[tokio::test]
async fn promotion_refreshes_surviving_parent() {
    let mut fx = Fixture::open(document(&["A", "B", "D"], &[("ab", "A", "B"), ("bd", "B", "D")]));
    fx.delete_edge("ab").await;
    assert!(fx.session.floating().record(&id("D")).is_some_and(|r| r.is_subtree_node));

    // The B to D edge disappears without an event and the host saves.
    fx.host.remove_edge(&EdgeId::from("bd")).unwrap();
    fx.host.request_save();
    let refreshed = fx.host.refreshed().len();

    let report = fx.session.reconcile();
    assert_eq!(report.promoted, vec![id("D")]);
    assert!(fx.host.refreshed()[refreshed..].contains(&id("B")));
}

#[tokio::test]
async fn polled_edge_and_late_event_handled_once() {
    let mut fx = Fixture::open(document(&["A", "B", "C"], &[("ab", "A", "B"), ("ac", "A", "C")]));
    fx.delete_edge("ac").await;
    assert!(fx.session.floating().is_floating(&id("C")));

    // Edge created programmatically: no event yet.
    let edge = CanvasEdge::new("ac2", &id("A"), &id("C"));
    fx.host.add_edge(edge.clone()).unwrap();
    fx.session.tick();
    assert!(!fx.session.floating().is_floating(&id("C")));

    let writes = fx.store.write_count();
    let saves = fx.host.save_count();
    fx.session.handle_event(HostEvent::EdgeCreated(edge)).await;
    assert_eq!(fx.store.write_count(), writes);
    assert_eq!(fx.host.save_count(), saves);
}

#[tokio::test(start_paused = true)]
async fn reconnected_node_is_shielded_briefly() {
    let mut fx = Fixture::open(document(&["A", "B", "C"], &[("ab", "A", "B"), ("ac", "A", "C")]));
    fx.delete_edge("ac").await;
    let stale = fx.persisted();
    fx.create_edge("ac2", "A", "C").await;

    // The host loses the new edge again before anything lands, and the file
    // still shows the pre-reconnect state.
    fx.host.remove_edge(&EdgeId::from("ac2"));
    fx.store.insert(PATH, stale.to_json().unwrap());
    let report = fx.session.reconcile();
    assert!(report.demoted.contains(&id("C")));
    assert!(!fx.session.floating().is_floating(&id("C")));
    // Still inside the window, but the stale copy is already repaired.
    let again = fx.session.reconcile();
    assert!(again.is_clean(), "{again:?}");

    tokio::time::advance(Duration::from_secs(1)).await;
    fx.store.insert(PATH, stale.to_json().unwrap());
    fx.session.reconcile();
    assert!(fx.session.floating().is_floating(&id("C")));
}

#[tokio::test]
async fn deleting_floating_node_drops_its_record() {
    let mut fx = Fixture::open(document(&["A", "C"], &[("ac", "A", "C")]));
    fx.delete_edge("ac").await;
    assert!(fx.persisted().floating_record(&id("C")).is_some());

    fx.host.remove_node(&id("C"));
    fx.session.handle_event(HostEvent::NodeDeleted(id("C"))).await;
    assert!(!fx.session.floating().is_floating(&id("C")));
    let persisted = fx.persisted();
    assert!(persisted.metadata.floating_nodes.unwrap_or_default().is_empty());
}

#[tokio::test(start_paused = true)]
async fn style_waits_for_render() {
    let mut fx = Fixture::open(document(&["A"], &[]));
    fx.host.set_defer_render(true);
    fx.host
        .add_node(CanvasNode::text("X", "X", 0.0, 0.0, 300.0, 60.0))
        .unwrap();
    fx.host.add_edge(CanvasEdge::new("ax", &id("A"), &id("X"))).unwrap();

    fx.delete_edge("ax").await;
    assert!(fx.session.floating().is_floating(&id("X")));
    assert!(!fx.host.has_class(&id("X"), "mindmap-floating"));

    tokio::time::sleep(Duration::from_millis(10)).await;
    fx.host.render(&id("X"));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(fx.host.has_class(&id("X"), "mindmap-floating"));
}

#[tokio::test]
async fn collapse_hides_descendants_from_layout() {
    let mut fx = Fixture::open(document(
        &["R", "A", "A1", "A2", "B"],
        &[("ra", "R", "A"), ("a1", "A", "A1"), ("a2", "A", "A2"), ("rb", "R", "B")],
    ));
    assert!(fx.session.arrange());
    let before = fx.host.node_data(&id("B")).unwrap().y;
    let hidden_y = fx.host.node_data(&id("A1")).unwrap().y;

    assert_eq!(fx.session.toggle_collapse(&id("A")), Some(true));
    let after = fx.host.node_data(&id("B")).unwrap().y;
    assert!(after < before, "B moves up into reclaimed space");
    // Hidden nodes are not repositioned.
    assert_eq!(fx.host.node_data(&id("A1")).unwrap().y, hidden_y);
    assert!(fx.host.has_class(&id("A1"), "mindmap-hidden"));
    assert_eq!(fx.persisted().collapsed_nodes().len(), 1);
}

#[tokio::test]
async fn layout_falls_back_to_raw_coordinates() {
    let mut fx = Fixture::open(document(&["A", "B"], &[("ab", "A", "B")]));
    fx.host.set_raw_updates_only(true);
    assert_eq!(fx.session.try_arrange().unwrap(), 2);
    assert_eq!(fx.x_of("B"), 300.0 + 80.0);
    // Already in place: nothing to move the second time.
    assert_eq!(fx.session.try_arrange().unwrap(), 0);
}

#[tokio::test]
async fn layout_failure_notifies_once() {
    let mut settings = MindmapSettings::default();
    settings.layout.vertical_spacing = f64::NAN;
    let mut fx = Fixture::open_with(document(&["A"], &[]), settings);
    assert!(!fx.session.arrange());
    assert_eq!(fx.host.notifications(), vec![LAYOUT_FAILED_NOTICE.to_string()]);
}

#[tokio::test]
async fn external_change_triggers_reconcile() {
    let mut fx = Fixture::open(document(&["A", "B"], &[("ab", "A", "B")]));
    let mut stale = fx.persisted();
    stale.set_floating(&id("B"), FloatingInfo::root(id("A"), 1));
    fx.store.insert(PATH, stale.to_json().unwrap());

    let report = fx.session.handle_document_changed();
    assert_eq!(report.demoted, vec![id("B")]);
    assert!(fx.persisted().floating_nodes().is_empty());
}
