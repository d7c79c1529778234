//! The render compositor: builds and executes the node graph for one view.
//!
//! # Build
//!
//! [`RenderCompositor::build`] starts from a final node id and registers it
//! plus all transitive dependencies depth-first. Because a node is only
//! appended after every one of its dependencies, the resulting list is a
//! valid topological order: every node's inputs appear strictly earlier.
//! Shared sub-graphs collapse — a node reached through several paths is
//! registered once. Cycles and unknown node types abort the build; the
//! compositor is then invalid and [`execute`](RenderCompositor::execute) is
//! a silent no-op until the next successful rebuild.
//!
//! # Execute
//!
//! Nodes render in build order. `last_use` marks the latest position at
//! which each node's outputs are still read; after every render, all
//! rendered-but-uncleared nodes whose `last_use` has passed are cleared,
//! releasing their pooled resources. The result: no pooled texture or
//! buffer is held alive by more nodes than necessary, and never released
//! before its final reader has rendered.
//!
//! Build is O(N + E); execute performs exactly N render calls and N clear
//! calls. The per-step release sweep is linear in the node count, which is
//! fine at the graph sizes a view produces (N < 30).

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::context::{ClearContext, ExecuteInputs, NodeContext};
use super::nodes::RenderNode;
use super::registry::NodeRegistry;
use super::NodeId;
use crate::errors::{EmberError, Result};
use crate::view::RendererView;

/// Bookkeeping for one node in the built graph.
struct NodeInfo {
    id: NodeId,
    node: RenderNode,
    /// Indices (into the node list) of this node's inputs, in the order its
    /// dependency function declared them.
    inputs: SmallVec<[usize; 4]>,
    /// Index of the last node that reads this node's outputs. `None` until
    /// a consumer registers, which only the final node can end up without.
    last_use: Option<usize>,
    cleared: bool,
}

/// Three-state visit marker used during the depth-first build.
///
/// "Currently resolving" is distinct from "not yet visited" (absent from the
/// map), so a back edge is unambiguously a cycle.
#[derive(Clone, Copy)]
enum VisitState {
    InProgress,
    Done(usize),
}

/// Dependency-ordered node list for a single view, built once per
/// configuration and executed once per frame.
#[derive(Default)]
pub struct RenderCompositor {
    nodes: Vec<NodeInfo>,
    valid: bool,
}

impl RenderCompositor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last build succeeded.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of nodes in the built graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids in execution order (debug tooling and tests).
    pub fn node_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|info| info.id)
    }

    /// Index of a node id in the execution order.
    #[must_use]
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|info| info.id == id)
    }

    /// Rebuilds the node graph for `view`, rooted at `final_node`.
    ///
    /// Call whenever a setting that influences node dependencies changes.
    /// On failure the error is logged, the node list is dropped and the
    /// compositor is marked invalid; this view then renders nothing until a
    /// later build succeeds.
    pub fn build(
        &mut self,
        registry: &NodeRegistry,
        view: &RendererView,
        final_node: NodeId,
    ) -> Result<()> {
        self.clear_nodes();

        let mut visited: FxHashMap<NodeId, VisitState> = FxHashMap::default();
        let result = self.register_node(registry, view, &mut visited, final_node);

        match result {
            Ok(_) => {
                self.valid = true;
                Ok(())
            }
            Err(error) => {
                log::error!("render compositor build failed: {error}");
                self.clear_nodes();
                Err(error)
            }
        }
    }

    /// Depth-first registration of `id` and everything it depends on.
    /// Returns the node's index in the execution order.
    fn register_node(
        &mut self,
        registry: &NodeRegistry,
        view: &RendererView,
        visited: &mut FxHashMap<NodeId, VisitState>,
        id: NodeId,
    ) -> Result<usize> {
        match visited.get(&id) {
            Some(VisitState::Done(index)) => return Ok(*index),
            Some(VisitState::InProgress) => {
                return Err(EmberError::CircularDependency(id));
            }
            None => {}
        }

        let node_type = registry.get(id).ok_or(EmberError::UnknownNodeType(id))?;
        visited.insert(id, VisitState::InProgress);

        let dependencies = (node_type.dependencies)(view);
        let mut input_indices: SmallVec<[usize; 4]> = SmallVec::new();
        for dependency in &dependencies {
            input_indices.push(self.register_node(registry, view, visited, *dependency)?);
        }

        let index = self.nodes.len();
        self.nodes.push(NodeInfo {
            id,
            node: (node_type.create)(),
            inputs: input_indices.clone(),
            last_use: None,
            cleared: false,
        });
        visited.insert(id, VisitState::Done(index));

        // This node is now the latest reader of each of its dependencies.
        for input_index in input_indices {
            let dependency = &mut self.nodes[input_index];
            dependency.last_use = Some(match dependency.last_use {
                Some(existing) => existing.max(index),
                None => index,
            });
        }

        Ok(index)
    }

    /// Executes the built graph. A no-op when the compositor is invalid.
    pub fn execute(&mut self, inputs: &mut ExecuteInputs<'_>) {
        if !self.valid {
            return;
        }

        for info in &mut self.nodes {
            info.cleared = false;
        }

        for index in 0..self.nodes.len() {
            let (before, rest) = self.nodes.split_at_mut(index);
            let current = &mut rest[0];

            let node_inputs: SmallVec<[&RenderNode; 4]> = current
                .inputs
                .iter()
                .map(|&input| &before[input].node)
                .collect();

            inputs.encoder.push_debug_group(current.id.0);
            current.node.render(&mut NodeContext {
                device: &mut *inputs.device,
                pool: &mut *inputs.pool,
                encoder: &mut *inputs.encoder,
                view: inputs.view,
                view_group: inputs.view_group,
                scene: inputs.scene,
                textures: inputs.textures,
                frame: inputs.frame,
                extensions: &mut *inputs.extensions,
                persistent: &mut *inputs.persistent,
                inputs: node_inputs.as_slice(),
            });
            inputs.encoder.pop_debug_group();
            drop(node_inputs);

            // Release every node whose final reader has now rendered.
            for info in &mut self.nodes[..=index] {
                if info.cleared {
                    continue;
                }
                if info.last_use.is_some_and(|last| last <= index) {
                    info.node.clear(&mut ClearContext {
                        device: &mut *inputs.device,
                        pool: &mut *inputs.pool,
                        persistent: &mut *inputs.persistent,
                    });
                    info.cleared = true;
                }
            }
        }

        // The final node usually has no readers, so its `last_use` never
        // fired above; clear it unconditionally.
        if let Some(last) = self.nodes.last_mut() {
            if !last.cleared {
                last.node.clear(&mut ClearContext {
                    device: &mut *inputs.device,
                    pool: &mut *inputs.pool,
                    persistent: &mut *inputs.persistent,
                });
                last.cleared = true;
            }
        }
    }

    fn clear_nodes(&mut self) {
        self.nodes.clear();
        self.valid = false;
    }
}
