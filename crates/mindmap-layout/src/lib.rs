//! Mindmap tree layout.
//!
//! [`LayoutEngine::arrange`] positions a forest of trees embedded in a canvas
//! graph: one column per depth, tidy-tree vertical centering, and floating
//! subtrees laid out as separate islands below the main trees.
//!
//! # Modules
//!
//! - [`settings`]: LayoutSettings with per-field defaults
//! - [`measure`]: content classification and text-height seam
//! - [`arrange`]: the layout algorithm
//! - [`error`]: LayoutError

pub mod arrange;
pub mod error;
pub mod measure;
pub mod settings;

pub use arrange::{LayoutEngine, LayoutInput, LayoutResult, NodeBox};
pub use error::LayoutError;
pub use measure::{ContentClass, DefaultMeasure, NodeMeasure};
pub use settings::LayoutSettings;
