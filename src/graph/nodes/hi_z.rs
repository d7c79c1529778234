//! Hierarchical Z pyramid.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::gfx::{BuiltinMaterial, PixelFormat, ShaderVariant, TextureDesc, TextureUsage};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::TextureKey;
use crate::view::RendererView;

/// Builds the hierarchical Z pyramid used by screen-space ray marching: a
/// power-of-two square texture whose mip chain stores conservative depth.
///
/// 32-bit float is deliberate; 16-bit banding collapses most of a scene into
/// a handful of depth values.
///
/// Inputs: `[0]` ResolvedSceneDepth, `[1]` GBuffer (ordering: depth must be
/// fully populated).
#[derive(Default)]
pub struct HiZNode {
    /// Output: the HiZ pyramid.
    pub output: Option<TextureKey>,
}

impl HiZNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let resolved = ctx.inputs[0]
            .as_resolved_scene_depth()
            .expect("HiZ input 0 must be ResolvedSceneDepth");

        let rect = ctx.view.view_rect();
        let size = rect.width.max(rect.height).next_power_of_two();
        let num_mips = TextureDesc::max_mip_count(size);

        let output = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::R32F,
                size,
                size,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            )
            .with_mips(num_mips),
        );
        let output_tex = ctx.pool.texture(output).texture;
        self.output = Some(output);

        // Mip 0 is a copy of the depth buffer into the pyramid's corner.
        ctx.encoder.set_render_target_mip(output_tex, 0);
        ctx.encoder.set_viewport([
            0.0,
            0.0,
            rect.width as f32 / size as f32,
            rect.height as f32 / size as f32,
        ]);
        if let Some(depth) = resolved.output {
            ctx.encoder.blit(ctx.pool.texture(depth).texture, false);
        }

        // Each further level reduces the previous one.
        for mip in 1..num_mips {
            ctx.encoder.set_render_target_mip(output_tex, mip);
            ctx.encoder.draw_fullscreen(
                BuiltinMaterial::BuildHiZ,
                ShaderVariant::default().with_quality(mip - 1),
                &[output_tex],
            );
        }
        ctx.encoder.unbind_render_target();
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        if let Some(output) = self.output.take() {
            ctx.pool.release_texture(output);
        }
    }
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::RESOLVED_SCENE_DEPTH, ids::GBUFFER]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::HI_Z,
        create: || super::RenderNode::HiZ(HiZNode::default()),
        dependencies,
    }
}
