//! Node type registry.
//!
//! Maps a stable [`NodeId`] to the pair of functions the compositor needs to
//! materialize a graph: a constructor and a dependency function. This is a
//! plain data table of `fn` pointers rather than a trait-object hierarchy —
//! dispatch stays flat, and the registered graph stays inspectable for
//! debugging tools.
//!
//! Dependency functions must be **pure** with respect to the view snapshot:
//! calling one twice for the same view configuration must return the same
//! list. The compositor caches the graph built from these answers across
//! frames, so an impure dependency function would silently corrupt the
//! cached schedule.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::NodeId;
use super::nodes::{self, RenderNode};
use crate::view::RendererView;

/// Constructor + dependency function for one node type.
pub struct NodeType {
    pub id: NodeId,
    /// Creates a fresh node instance in its unbuilt state.
    pub create: fn() -> RenderNode,
    /// Returns the node-type ids this node reads from, given the view's
    /// current configuration. Pure function of the view snapshot.
    pub dependencies: fn(&RendererView) -> SmallVec<[NodeId; 4]>,
}

/// Registry of all known node types.
pub struct NodeRegistry {
    types: FxHashMap<NodeId, NodeType>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: FxHashMap::default(),
        }
    }

    /// Creates a registry pre-populated with every built-in node type.
    #[must_use]
    pub fn with_builtin_nodes() -> Self {
        let mut registry = Self::new();
        for node_type in nodes::builtin_node_types() {
            registry.register(node_type);
        }
        registry
    }

    /// Registers a node type. Duplicate ids are an error in the node-type
    /// table; the offending registration replaces the original so the
    /// mistake is at least visible.
    pub fn register(&mut self, node_type: NodeType) {
        let id = node_type.id;
        if self.types.insert(id, node_type).is_some() {
            log::error!("found two render compositor nodes with the same name \"{id}\"");
        }
    }

    /// Looks up a node type by id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&NodeType> {
        self.types.get(&id)
    }

    /// Number of registered node types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtin_nodes()
    }
}
