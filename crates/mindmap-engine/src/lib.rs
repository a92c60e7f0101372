//! Floating-state engine, collapse handling and event glue for mindmaps on
//! a canvas editor.
//!
//! The engine keeps three loosely synchronized views of a document in step:
//! the persisted JSON (through [`mindmap_storage::AtomicMutator`]), the
//! host editor's live graph ([`HostGraphView`]) and the style classes on
//! rendered node elements ([`StyleApplier`]). [`MindmapSession`] ties them to
//! host events and the layout engine for one open document.

pub mod collapse;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod host;
pub mod session;
pub mod style;

pub use collapse::CollapseController;
pub use config::{EngineSettings, MindmapSettings};
pub use detector::{EdgeChangeDetector, EdgeSignal};
pub use engine::{FloatingStateEngine, ReconcileReport};
pub use error::{EngineError, HostError};
pub use host::{HeadlessHost, HostEvent, HostGraphView};
pub use session::{LayoutApplication, MindmapSession};
pub use style::StyleApplier;
