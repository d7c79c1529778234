//! Concrete compositor node types.
//!
//! Every render pass in the pipeline is a node: a leaf unit of GPU work that
//! consumes the outputs of the nodes it depends on and stores its own output
//! handles as instance state for downstream nodes to read.
//!
//! Dispatch is an enum and a `match`, not a trait-object hierarchy: the node
//! set is closed, downstream access to a dependency's concrete outputs is a
//! pattern match instead of a cast, and the whole graph stays plain data.
//!
//! Per-node lifecycle (enforced by the compositor, not the node):
//! `Unbuilt → Rendered → Cleared`, with exactly one `render` and one `clear`
//! per execution.

mod deferred_lighting;
mod dof;
mod final_resolve;
mod forward;
mod fxaa;
mod gbuffer;
mod hi_z;
mod ibl;
mod indirect_lighting;
mod light_accumulation;
mod msaa_coverage;
mod post_process;
mod resolved_depth;
mod scene_color;
mod scene_depth;
mod shadow_maps;
mod skybox;
mod ssao;
mod ssr;
mod tonemapping;

pub use deferred_lighting::{StandardDeferredLightingNode, TiledDeferredLightingNode};
pub use dof::GaussianDofNode;
pub use final_resolve::FinalResolveNode;
pub use forward::ClusteredForwardNode;
pub use fxaa::FxaaNode;
pub use gbuffer::GBufferNode;
pub use hi_z::HiZNode;
pub use ibl::TiledDeferredIblNode;
pub use indirect_lighting::IndirectLightingNode;
pub use light_accumulation::{LightAccumulationNode, UnflattenLightAccumNode};
pub use msaa_coverage::MsaaCoverageNode;
pub use post_process::PostProcessNode;
pub use resolved_depth::ResolvedSceneDepthNode;
pub use scene_color::{SceneColorNode, UnflattenSceneColorNode};
pub use scene_depth::SceneDepthNode;
pub use shadow_maps::ShadowMapsNode;
pub use skybox::SkyboxNode;
pub use ssao::SsaoNode;
pub use ssr::SsrNode;
pub use tonemapping::TonemappingNode;

use smallvec::SmallVec;

use super::context::{ClearContext, NodeContext};
use super::registry::NodeType;
use crate::gfx::TextureId;

/// Stable ids of the built-in node types.
pub mod ids {
    use crate::graph::NodeId;

    pub const SCENE_DEPTH: NodeId = NodeId("SceneDepth");
    pub const GBUFFER: NodeId = NodeId("GBuffer");
    pub const SCENE_COLOR: NodeId = NodeId("SceneColor");
    pub const MSAA_COVERAGE: NodeId = NodeId("MSAACoverage");
    pub const LIGHT_ACCUMULATION: NodeId = NodeId("LightAccumulation");
    pub const TILED_DEFERRED_LIGHTING: NodeId = NodeId("TiledDeferredLighting");
    pub const STANDARD_DEFERRED_LIGHTING: NodeId = NodeId("StandardDeferredLighting");
    pub const UNFLATTEN_LIGHT_ACCUM: NodeId = NodeId("UnflattenLightAccum");
    pub const INDIRECT_LIGHTING: NodeId = NodeId("IndirectLighting");
    pub const TILED_DEFERRED_IBL: NodeId = NodeId("TiledDeferredIBL");
    pub const CLUSTERED_FORWARD: NodeId = NodeId("ClusteredForward");
    pub const UNFLATTEN_SCENE_COLOR: NodeId = NodeId("UnflattenSceneColor");
    pub const SKYBOX: NodeId = NodeId("Skybox");
    pub const POST_PROCESS: NodeId = NodeId("PostProcess");
    pub const TONEMAPPING: NodeId = NodeId("Tonemapping");
    pub const GAUSSIAN_DOF: NodeId = NodeId("GaussianDOF");
    pub const FXAA: NodeId = NodeId("FXAA");
    pub const RESOLVED_SCENE_DEPTH: NodeId = NodeId("ResolvedSceneDepth");
    pub const HI_Z: NodeId = NodeId("HiZ");
    pub const SSAO: NodeId = NodeId("SSAO");
    pub const SSR: NodeId = NodeId("SSR");
    pub const FINAL_RESOLVE: NodeId = NodeId("FinalResolve");
    pub const SHADOW_MAPS: NodeId = NodeId("ShadowMaps");
}

/// One render pass instance in a built graph.
pub enum RenderNode {
    SceneDepth(SceneDepthNode),
    GBuffer(GBufferNode),
    SceneColor(SceneColorNode),
    MsaaCoverage(MsaaCoverageNode),
    LightAccumulation(LightAccumulationNode),
    TiledDeferredLighting(TiledDeferredLightingNode),
    StandardDeferredLighting(StandardDeferredLightingNode),
    UnflattenLightAccum(UnflattenLightAccumNode),
    IndirectLighting(IndirectLightingNode),
    TiledDeferredIbl(TiledDeferredIblNode),
    ClusteredForward(ClusteredForwardNode),
    UnflattenSceneColor(UnflattenSceneColorNode),
    Skybox(SkyboxNode),
    PostProcess(PostProcessNode),
    Tonemapping(TonemappingNode),
    GaussianDof(GaussianDofNode),
    Fxaa(FxaaNode),
    ResolvedSceneDepth(ResolvedSceneDepthNode),
    HiZ(HiZNode),
    Ssao(SsaoNode),
    Ssr(SsrNode),
    FinalResolve(FinalResolveNode),
    ShadowMaps(ShadowMapsNode),
}

macro_rules! dispatch {
    ($self:expr, $node:ident => $body:expr) => {
        match $self {
            RenderNode::SceneDepth($node) => $body,
            RenderNode::GBuffer($node) => $body,
            RenderNode::SceneColor($node) => $body,
            RenderNode::MsaaCoverage($node) => $body,
            RenderNode::LightAccumulation($node) => $body,
            RenderNode::TiledDeferredLighting($node) => $body,
            RenderNode::StandardDeferredLighting($node) => $body,
            RenderNode::UnflattenLightAccum($node) => $body,
            RenderNode::IndirectLighting($node) => $body,
            RenderNode::TiledDeferredIbl($node) => $body,
            RenderNode::ClusteredForward($node) => $body,
            RenderNode::UnflattenSceneColor($node) => $body,
            RenderNode::Skybox($node) => $body,
            RenderNode::PostProcess($node) => $body,
            RenderNode::Tonemapping($node) => $body,
            RenderNode::GaussianDof($node) => $body,
            RenderNode::Fxaa($node) => $body,
            RenderNode::ResolvedSceneDepth($node) => $body,
            RenderNode::HiZ($node) => $body,
            RenderNode::Ssao($node) => $body,
            RenderNode::Ssr($node) => $body,
            RenderNode::FinalResolve($node) => $body,
            RenderNode::ShadowMaps($node) => $body,
        }
    };
}

impl RenderNode {
    /// Performs the node's GPU work. Invoked exactly once per execution, in
    /// topological order.
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        dispatch!(self, node => node.render(ctx));
    }

    /// Releases resources acquired in `render`. Invoked exactly once per
    /// execution, no earlier than the node's last reader.
    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        dispatch!(self, node => node.clear(ctx));
    }
}

// Positional downcast helpers. A node's documented input order plus these is
// the whole inter-node data-flow contract.
macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        impl RenderNode {
            #[must_use]
            pub fn $name(&self) -> Option<&$ty> {
                match self {
                    RenderNode::$variant(node) => Some(node),
                    _ => None,
                }
            }
        }
    };
}

accessor!(as_scene_depth, SceneDepth, SceneDepthNode);
accessor!(as_gbuffer, GBuffer, GBufferNode);
accessor!(as_scene_color, SceneColor, SceneColorNode);
accessor!(as_msaa_coverage, MsaaCoverage, MsaaCoverageNode);
accessor!(as_light_accumulation, LightAccumulation, LightAccumulationNode);
accessor!(as_post_process, PostProcess, PostProcessNode);
accessor!(as_resolved_scene_depth, ResolvedSceneDepth, ResolvedSceneDepthNode);
accessor!(as_hi_z, HiZ, HiZNode);
accessor!(as_ssao, Ssao, SsaoNode);
accessor!(as_ssr, Ssr, SsrNode);
accessor!(as_shadow_maps, ShadowMaps, ShadowMapsNode);

/// Cached render-target composition.
///
/// Mirrors the engines' render-texture objects: a node keeps the attachment
/// set it composed last frame and only rebuilds when an attached texture's
/// *identity* changes (cheap compare, not a full descriptor compare).
#[derive(Default)]
pub(crate) struct CachedTarget {
    colors: SmallVec<[TextureId; 4]>,
    depth: Option<TextureId>,
}

impl CachedTarget {
    /// Updates the cached attachments. Returns `true` when the composition
    /// changed and had to be rebuilt.
    pub fn ensure(&mut self, colors: &[TextureId], depth: Option<TextureId>) -> bool {
        if self.colors.as_slice() == colors && self.depth == depth {
            return false;
        }
        self.colors = SmallVec::from_slice(colors);
        self.depth = depth;
        true
    }

    pub fn colors(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.colors.iter().copied()
    }

    #[must_use]
    pub fn depth(&self) -> Option<TextureId> {
        self.depth
    }
}

/// The full built-in node-type table, in registration order.
#[must_use]
pub fn builtin_node_types() -> Vec<NodeType> {
    vec![
        scene_depth::node_type(),
        gbuffer::node_type(),
        scene_color::scene_color_node_type(),
        scene_color::unflatten_node_type(),
        msaa_coverage::node_type(),
        light_accumulation::light_accumulation_node_type(),
        light_accumulation::unflatten_node_type(),
        deferred_lighting::tiled_node_type(),
        deferred_lighting::standard_node_type(),
        shadow_maps::node_type(),
        indirect_lighting::node_type(),
        ibl::node_type(),
        forward::node_type(),
        skybox::node_type(),
        post_process::node_type(),
        tonemapping::node_type(),
        dof::node_type(),
        fxaa::node_type(),
        resolved_depth::node_type(),
        hi_z::node_type(),
        ssao::node_type(),
        ssr::node_type(),
        final_resolve::node_type(),
    ]
}

/// Normalized full-target viewport.
pub(crate) const FULL_VIEWPORT: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
