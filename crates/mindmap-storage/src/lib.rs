//! Storage abstraction for canvas documents.
//!
//! Provides the [`DocumentStore`] trait defining the storage contract the
//! host's document store satisfies, the [`InMemoryStore`] and [`FsStore`]
//! backends, and the [`AtomicMutator`] read-reapply-write protocol that all
//! document updates go through.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: DocumentStore trait and change notifications
//! - [`memory`]: InMemoryStore implementation
//! - [`fs`]: FsStore implementation (atomic replace via tempfile)
//! - [`watch`]: path-filtered change feed
//! - [`mutator`]: AtomicMutator double-check protocol
//! - [`hash`]: blake3 fingerprints of edge sets
//! - [`diff`]: added/removed edges between two snapshots

pub mod diff;
pub mod error;
pub mod fs;
pub mod hash;
pub mod memory;
pub mod mutator;
pub mod traits;
pub mod watch;

// Re-export key types for ergonomic use.
pub use diff::EdgeDiff;
pub use error::StorageError;
pub use fs::FsStore;
pub use hash::{fingerprint_edges, fingerprint_tree_edges};
pub use memory::InMemoryStore;
pub use mutator::{AtomicMutator, MutationOutcome};
pub use traits::{DocumentChange, DocumentStore};
pub use watch::PathWatcher;
