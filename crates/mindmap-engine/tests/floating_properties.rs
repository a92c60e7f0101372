//! Property tests for the floating invariant, subtree marking and
//! idempotent reconciliation.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use mindmap_core::edge::tree_edges;
use mindmap_core::{CanvasDocument, CanvasEdge, CanvasNode, EdgeId, NodeId, TreeIndex};
use mindmap_engine::{EngineSettings, FloatingStateEngine, HeadlessHost, HostGraphView, StyleApplier};
use mindmap_storage::{AtomicMutator, InMemoryStore};

const PATH: &str = "prop.canvas";

/// Node `i` hangs under some node `< i`, or is a root.
fn forest() -> impl Strategy<Value = Vec<Option<usize>>> {
    (2usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                if i == 0 {
                    Just(None).boxed()
                } else {
                    prop::option::weighted(0.85, 0..i).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

fn setup(parents: &[Option<usize>]) -> (Arc<InMemoryStore>, Arc<HeadlessHost>, FloatingStateEngine) {
    let mut doc = CanvasDocument::default();
    for i in 0..parents.len() {
        let name = format!("n{i}");
        doc.add_node(CanvasNode::text(name.as_str(), &name, 0.0, 0.0, 100.0, 60.0))
            .unwrap();
    }
    for (i, parent) in parents.iter().enumerate() {
        if let Some(p) = parent {
            let edge = CanvasEdge::new(format!("e{i}"), &NodeId::new(format!("n{p}")), &NodeId::new(format!("n{i}")));
            doc.add_edge(edge).unwrap();
        }
    }
    let store = Arc::new(InMemoryStore::new());
    store.insert(PATH, doc.to_json().unwrap());
    let host = Arc::new(HeadlessHost::open(store.clone(), PATH).unwrap());
    let styles = Arc::new(StyleApplier::new(host.clone(), Vec::new()));
    let engine = FloatingStateEngine::new(
        PATH,
        host.clone(),
        AtomicMutator::new(store.clone()),
        styles,
        EngineSettings::default(),
    );
    (store, host, engine)
}

proptest! {
    #[test]
    fn floating_roots_are_exactly_detached_nodes(
        parents in forest(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let (store, host, mut engine) = setup(&parents);

        let mut detached = BTreeSet::new();
        for pick in picks {
            let i = pick.index(parents.len());
            if let Some(edge) = host.remove_edge(&EdgeId::new(format!("e{i}"))) {
                prop_assert!(engine.handle_edge_deleted(&edge));
                detached.insert(NodeId::new(format!("n{i}")));
            }
        }

        let report = engine.reapply_all_floating_styles();
        prop_assert!(report.is_clean(), "{:?}", report);

        let nodes = host.nodes();
        let tree = TreeIndex::build(nodes.iter().map(|n| &n.id), &tree_edges(&host.edges()));
        let records = engine.floating_nodes().clone();
        let roots: BTreeSet<NodeId> = records
            .iter()
            .filter(|(_, info)| !info.is_subtree_node)
            .map(|(id, _)| id.clone())
            .collect();
        prop_assert_eq!(&roots, &detached);

        for root in &roots {
            prop_assert!(!tree.has_incoming(root));
            for member in tree.descendants(root) {
                let record = records.get(&member);
                prop_assert!(record.is_some_and(|r| r.is_subtree_node), "{} unmarked", member);
            }
        }
        for (id, info) in records.iter().filter(|(_, info)| info.is_subtree_node) {
            prop_assert!(tree.has_incoming(id));
            prop_assert!(tree.root_of(id).is_some_and(|r| roots.contains(&r)));
            prop_assert_eq!(tree.parent(id), Some(&info.original_parent));
        }

        let writes = store.write_count();
        let again = engine.reapply_all_floating_styles();
        prop_assert!(again.is_clean());
        prop_assert_eq!(again.floating, report.floating);
        prop_assert_eq!(store.write_count(), writes);
    }
}
