//! MSAA shading-coverage node.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::gfx::{BuiltinMaterial, PixelFormat, ShaderVariant, TextureDesc, TextureUsage};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::TextureKey;
use crate::view::RendererView;

/// Determines which pixels need per-sample shading and publishes the result
/// twice: as a coverage texture for compute passes and as stencil marks in
/// the primary depth buffer for raster passes. Only present in MSAA graphs.
///
/// Inputs: `[0]` GBuffer, `[1]` SceneDepth.
#[derive(Default)]
pub struct MsaaCoverageNode {
    /// Output: single-sample coverage mask.
    pub output: Option<TextureKey>,
}

impl MsaaCoverageNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let rect = ctx.view.view_rect();
        let samples = ctx.view.num_samples();

        let output = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::R8,
                rect.width,
                rect.height,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ),
        );
        self.output = Some(output);

        let gbuffer = ctx.inputs[0]
            .as_gbuffer()
            .expect("MSAACoverage input 0 must be GBuffer");
        let depth_node = ctx.inputs[1]
            .as_scene_depth()
            .expect("MSAACoverage input 1 must be SceneDepth");

        let albedo = gbuffer.albedo.map(|k| ctx.pool.texture(k).texture);
        let normals = gbuffer.normals.map(|k| ctx.pool.texture(k).texture);
        let rough_metal = gbuffer.rough_metal.map(|k| ctx.pool.texture(k).texture);
        let depth = depth_node.depth.map(|k| ctx.pool.texture(k).texture);
        let output_tex = ctx.pool.texture(output).texture;

        let reads: Vec<_> = [albedo, normals, rough_metal, depth]
            .into_iter()
            .flatten()
            .collect();

        ctx.encoder.set_render_target([output_tex], None, false);
        ctx.encoder.draw_fullscreen(
            BuiltinMaterial::MsaaCoverage,
            ShaderVariant::msaa(samples),
            &reads,
        );

        // Second half: burn the coverage into the scene stencil buffer so
        // raster lighting passes can select per-sample shading with a
        // stencil test.
        ctx.encoder.set_render_target([], depth, false);
        ctx.encoder.draw_fullscreen(
            BuiltinMaterial::MsaaCoverageStencil,
            ShaderVariant::default(),
            &[output_tex],
        );
        ctx.encoder.unbind_render_target();
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        if let Some(output) = self.output.take() {
            ctx.pool.release_texture(output);
        }
    }
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::GBUFFER, ids::SCENE_DEPTH]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::MSAA_COVERAGE,
        create: || super::RenderNode::MsaaCoverage(MsaaCoverageNode::default()),
        dependencies,
    }
}
