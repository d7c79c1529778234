//! Render compositor (frame graph).
//!
//! The compositor builds a dependency-ordered list of render nodes for one
//! view and executes it each frame, allocating and releasing each node's
//! pooled resources exactly when needed. See [`compositor::RenderCompositor`]
//! for the scheduling core and [`nodes`] for the concrete node types.

pub mod compositor;
pub mod context;
pub mod nodes;
pub mod registry;

pub use compositor::RenderCompositor;
pub use context::{ClearContext, ExecuteInputs, FrameTiming, NodeContext, ViewPersistentState};
pub use registry::{NodeRegistry, NodeType};

use std::fmt;

/// Stable identifier of a node type.
///
/// Dependency lists name nodes by id, and the id is what the registry keys
/// on, so these must be unique and stable across frames.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub &'static str);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
