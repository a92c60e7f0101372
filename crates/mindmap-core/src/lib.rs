pub mod collapse;
pub mod document;
pub mod edge;
pub mod error;
pub mod floating;
pub mod id;
pub mod node;
pub mod tree;
pub mod visibility;

// Re-export commonly used types
pub use collapse::CollapseState;
pub use document::{CanvasDocument, Metadata};
pub use edge::{CanvasEdge, EdgeKey, Endpoint, TreeEdge};
pub use error::CoreError;
pub use floating::{FloatingInfo, FloatingState};
pub use id::{EdgeId, NodeId};
pub use node::{CanvasNode, NodeKind, NodePatch};
pub use tree::TreeIndex;
pub use visibility::{VisibilityResolver, VisibleSet};
