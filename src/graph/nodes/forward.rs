//! Clustered forward pass for transparent geometry.

use smallvec::{smallvec, SmallVec};

use super::{ids, FULL_VIEWPORT};
use crate::extensions::ExtensionStage;
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::view::RendererView;

/// Draws transparent renderables back-to-front into the scene color target,
/// then triggers the post-lighting extension callbacks.
///
/// Transparent objects cannot go through the deferred path (a G-buffer holds
/// one surface per pixel), so they evaluate lighting forward-style with the
/// clustered light lists.
///
/// Inputs: `[0]` SceneColor, `[1]` Skybox (ordering only).
#[derive(Default)]
pub struct ClusteredForwardNode;

impl ClusteredForwardNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let scene_color = ctx.inputs[0]
            .as_scene_color()
            .expect("ClusteredForward input 0 must be SceneColor");

        let target = scene_color.target();
        ctx.encoder
            .set_render_target(target.colors(), target.depth(), true);
        ctx.encoder.set_viewport(FULL_VIEWPORT);

        for element in ctx.view.transparent_queue() {
            let renderable = &ctx.scene.renderables[element.renderable];
            ctx.encoder.draw(renderable.mesh, renderable.material);
        }

        ctx.invoke_extensions(ExtensionStage::PostLighting);
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::SCENE_COLOR, ids::SKYBOX]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::CLUSTERED_FORWARD,
        create: || super::RenderNode::ClusteredForward(ClusteredForwardNode),
        dependencies,
    }
}
