//! Scene depth node.

use smallvec::SmallVec;

use super::ids;
use crate::gfx::{PixelFormat, TextureDesc, TextureUsage};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::TextureKey;
use crate::view::RendererView;

/// Allocates the scene depth-stencil texture. Does not perform any
/// rendering; the base pass populates it.
///
/// Inputs: none.
#[derive(Default)]
pub struct SceneDepthNode {
    /// Output: the depth-stencil texture, sized to the viewport and sample
    /// count.
    pub depth: Option<TextureKey>,
}

impl SceneDepthNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let rect = ctx.view.view_rect();
        let desc = TextureDesc::d2(
            PixelFormat::Depth24Stencil8,
            rect.width,
            rect.height,
            TextureUsage::DEPTH_STENCIL | TextureUsage::SAMPLED,
        )
        .with_samples(ctx.view.num_samples());

        self.depth = Some(ctx.pool.get_texture(ctx.device, &desc));
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        if let Some(depth) = self.depth.take() {
            ctx.pool.release_texture(depth);
        }
    }
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    SmallVec::new()
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::SCENE_DEPTH,
        create: || super::RenderNode::SceneDepth(SceneDepthNode::default()),
        dependencies,
    }
}
