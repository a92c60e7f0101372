//! Simulated host autosave racing the atomic mutator.
//!
//! [`RacingStore`] performs an "external" write immediately before a chosen
//! read, standing in for the host editor saving its in-memory graph between
//! the mutator's first and second read.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use mindmap_core::{CanvasDocument, CanvasEdge, CanvasNode, FloatingInfo, NodeId};
use mindmap_storage::{AtomicMutator, DocumentChange, DocumentStore, InMemoryStore, MutationOutcome};

type ExternalWrite = Box<dyn FnOnce(&mut CanvasDocument) + Send>;

struct RacingStore {
    inner: InMemoryStore,
    reads: AtomicUsize,
    trigger_on_read: usize,
    external: Mutex<Option<ExternalWrite>>,
}

impl RacingStore {
    fn new(doc: &CanvasDocument, trigger_on_read: usize, external: ExternalWrite) -> Self {
        let inner = InMemoryStore::new();
        inner.insert(PATH, doc.to_json().unwrap());
        RacingStore {
            inner,
            reads: AtomicUsize::new(0),
            trigger_on_read,
            external: Mutex::new(Some(external)),
        }
    }
}

impl DocumentStore for RacingStore {
    fn read(&self, path: &Path) -> Result<Option<String>, mindmap_storage::StorageError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.trigger_on_read {
            if let Some(external) = self.external.lock().unwrap().take() {
                let mut doc = self.inner.load(path)?.unwrap();
                external(&mut doc);
                self.inner.save(path, &doc)?;
            }
        }
        self.inner.read(path)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), mindmap_storage::StorageError> {
        self.inner.write(path, contents)
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.inner.subscribe()
    }
}

const PATH: &str = "race.canvas";

fn base_document() -> CanvasDocument {
    let mut doc = CanvasDocument::default();
    for id in ["a", "b", "c"] {
        doc.add_node(CanvasNode::text(id, id, 0.0, 0.0, 100.0, 40.0)).unwrap();
    }
    doc.add_edge(CanvasEdge::new("ab", &NodeId::from("a"), &NodeId::from("b")))
        .unwrap();
    doc
}

fn mark_c_floating(doc: &mut CanvasDocument) -> bool {
    doc.set_floating(&NodeId::from("c"), FloatingInfo::root(NodeId::from("a"), 42))
}

#[test]
fn external_write_is_kept_and_update_still_applies() {
    let store = Arc::new(RacingStore::new(
        &base_document(),
        2,
        Box::new(|doc| {
            doc.add_node(CanvasNode::text("h", "from host", 0.0, 200.0, 100.0, 40.0))
                .unwrap();
        }),
    ));
    let mutator = AtomicMutator::new(store.clone());

    let outcome = mutator.try_modify(Path::new(PATH), mark_c_floating).unwrap();
    assert_eq!(outcome, MutationOutcome::Written);

    let doc = store.load(Path::new(PATH)).unwrap().unwrap();
    assert!(doc.contains_node(&NodeId::from("h")), "host autosave lost");
    assert!(doc.floating_record(&NodeId::from("c")).is_some(), "update lost");
}

#[test]
fn update_that_no_longer_applies_is_dropped() {
    let store = Arc::new(RacingStore::new(
        &base_document(),
        2,
        Box::new(|doc| {
            doc.remove_node(&NodeId::from("c"));
        }),
    ));
    let mutator = AtomicMutator::new(store.clone());

    let outcome = mutator.try_modify(Path::new(PATH), mark_c_floating).unwrap();
    assert_eq!(outcome, MutationOutcome::StaleAfterReread);

    let doc = store.load(Path::new(PATH)).unwrap().unwrap();
    assert!(!doc.contains_node(&NodeId::from("c")));
    assert!(doc.metadata.floating_nodes.is_none());
    // Only the simulated autosave wrote.
    assert_eq!(store.inner.write_count(), 1);
}

#[test]
fn external_write_that_already_applied_the_change_is_a_no_op() {
    let store = Arc::new(RacingStore::new(
        &base_document(),
        2,
        Box::new(|doc| {
            mark_c_floating(doc);
        }),
    ));
    let mutator = AtomicMutator::new(store.clone());

    assert!(!mutator.modify(Path::new(PATH), mark_c_floating));
    assert_eq!(store.inner.write_count(), 1);
}

#[test]
fn successful_write_costs_exactly_two_reads() {
    let store = Arc::new(RacingStore::new(&base_document(), 3, Box::new(|_| {})));
    let mutator = AtomicMutator::new(store.clone());
    assert!(mutator.modify(Path::new(PATH), mark_c_floating));
    assert_eq!(store.reads.load(Ordering::SeqCst), 2);
}
