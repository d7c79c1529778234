//! Resolved (single-sample) scene depth.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::gfx::{ClearFlags, PixelFormat, TextureDesc, TextureUsage};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::TextureKey;
use crate::view::RendererView;

/// Provides a single-sample view of the scene depth buffer for screen-space
/// passes. Under MSAA this resolves into a fresh texture; otherwise it
/// passes the original depth texture through without taking ownership.
///
/// Inputs: `[0]` SceneDepth, `[1]` GBuffer (ordering: the base pass is what
/// populates the depth buffer).
#[derive(Default)]
pub struct ResolvedSceneDepthNode {
    /// Output: single-sample depth. May alias SceneDepth's texture in the
    /// pass-through case.
    pub output: Option<TextureKey>,
    pass_through: bool,
}

impl ResolvedSceneDepthNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let depth_node = ctx.inputs[0]
            .as_scene_depth()
            .expect("ResolvedSceneDepth input 0 must be SceneDepth");

        if ctx.view.num_samples() > 1 {
            let rect = ctx.view.view_rect();
            let output = ctx.pool.get_texture(
                ctx.device,
                &TextureDesc::d2(
                    PixelFormat::Depth24Stencil8,
                    rect.width,
                    rect.height,
                    TextureUsage::DEPTH_STENCIL | TextureUsage::SAMPLED,
                ),
            );
            let output_tex = ctx.pool.texture(output).texture;

            ctx.encoder.set_render_target([], Some(output_tex), false);
            ctx.encoder.clear(ClearFlags::STENCIL, [0.0; 4], 1.0, 0);
            if let Some(depth) = depth_node.depth {
                ctx.encoder.blit_depth(ctx.pool.texture(depth).texture);
            }

            self.output = Some(output);
            self.pass_through = false;
        } else {
            // Already single-sample; reference the original without an extra
            // borrow. SceneDepth stays alive through its own last_use, which
            // covers every consumer of this node.
            self.output = depth_node.depth;
            self.pass_through = true;
        }
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        match self.output.take() {
            Some(output) if !self.pass_through => ctx.pool.release_texture(output),
            _ => {}
        }
        self.pass_through = false;
    }
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::SCENE_DEPTH, ids::GBUFFER]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::RESOLVED_SCENE_DEPTH,
        create: || super::RenderNode::ResolvedSceneDepth(ResolvedSceneDepthNode::default()),
        dependencies,
    }
}
