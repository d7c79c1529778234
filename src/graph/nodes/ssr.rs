//! Screen-space reflections.

use smallvec::SmallVec;

use super::ids;
use crate::gfx::{
    BuiltinMaterial, ClearFlags, PixelFormat, ShaderVariant, TextureDesc, TextureUsage,
};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::TextureKey;
use crate::view::RendererView;

/// Ray-marches reflections against the HiZ pyramid. Runs before scene color
/// is resolved, so the reflection source is the light accumulation texture.
///
/// When the feature is disabled this node declares no dependencies and is
/// absent from the graph; consumers substitute a static black texture.
///
/// Inputs (enabled): `[0]` SceneDepth, `[1]` LightAccumulation,
/// `[2]` GBuffer, `[3]` HiZ, `[4]` ResolvedSceneDepth,
/// `[5]` UnflattenLightAccum (only when MSAA is active, ordering only).
#[derive(Default)]
pub struct SsrNode {
    /// Output: reflection color, full resolution.
    pub output: Option<TextureKey>,
}

impl SsrNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let settings = ctx.view.settings().screen_space_reflections.clone();
        if !settings.enabled {
            return;
        }

        let depth_node = ctx.inputs[0]
            .as_scene_depth()
            .expect("SSR input 0 must be SceneDepth");
        let light_accum = ctx.inputs[1]
            .as_light_accumulation()
            .expect("SSR input 1 must be LightAccumulation");
        let gbuffer = ctx.inputs[2]
            .as_gbuffer()
            .expect("SSR input 2 must be GBuffer");
        let hi_z = ctx.inputs[3].as_hi_z().expect("SSR input 3 must be HiZ");
        let resolved_depth = ctx.inputs[4]
            .as_resolved_scene_depth()
            .expect("SSR input 4 must be ResolvedSceneDepth");

        let rect = ctx.view.view_rect();
        let samples = ctx.view.num_samples();
        let variant = ShaderVariant::msaa(samples).with_quality(settings.quality);

        let Some(accum_key) = light_accum.light_accum else {
            return;
        };
        let mut scene_color = ctx.pool.texture(accum_key).texture;

        // Reflection source must be single-sample for the ray march.
        let mut resolved_color = None;
        if samples > 1 {
            let resolved = ctx.pool.get_texture(
                ctx.device,
                &TextureDesc::d2(
                    PixelFormat::Rgba16F,
                    rect.width,
                    rect.height,
                    TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                ),
            );
            let resolved_tex = ctx.pool.texture(resolved).texture;
            ctx.encoder.set_render_target([resolved_tex], None, false);
            ctx.encoder.blit(scene_color, false);
            scene_color = resolved_tex;
            resolved_color = Some(resolved);
        }

        let gbuffer_reads: Vec<_> = [gbuffer.albedo, gbuffer.normals, gbuffer.rough_metal]
            .into_iter()
            .flatten()
            .map(|key| ctx.pool.texture(key).texture)
            .collect();

        // Mark SSR-eligible pixels in the resolved depth buffer's stencil;
        // the trace pass then skips everything else.
        let resolved_depth_tex = resolved_depth
            .output
            .map(|key| ctx.pool.texture(key).texture);
        if let Some(depth_tex) = resolved_depth_tex {
            ctx.encoder.set_render_target([], Some(depth_tex), false);
            ctx.encoder
                .draw_fullscreen(BuiltinMaterial::SsrStencil, variant, &gbuffer_reads);
        }

        let output = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::Rgba16F,
                rect.width,
                rect.height,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ),
        );
        let output_tex = ctx.pool.texture(output).texture;
        self.output = Some(output);

        let mut reads = vec![scene_color];
        reads.extend(hi_z.output.map(|key| ctx.pool.texture(key).texture));
        reads.extend(gbuffer_reads);
        reads.extend(depth_node.depth.map(|key| ctx.pool.texture(key).texture));

        ctx.encoder
            .set_render_target([output_tex], resolved_depth_tex, true);
        ctx.encoder.clear(ClearFlags::COLOR, [0.0; 4], 1.0, 0);
        ctx.encoder
            .draw_fullscreen(BuiltinMaterial::SsrTrace, variant, &reads);
        ctx.encoder.unbind_render_target();

        if let Some(resolved) = resolved_color {
            ctx.pool.release_texture(resolved);
        }
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        if let Some(output) = self.output.take() {
            ctx.pool.release_texture(output);
        }
    }
}

fn dependencies(view: &RendererView) -> SmallVec<[NodeId; 4]> {
    let mut deps = SmallVec::new();
    if view.settings().screen_space_reflections.enabled {
        deps.extend_from_slice(&[
            ids::SCENE_DEPTH,
            ids::LIGHT_ACCUMULATION,
            ids::GBUFFER,
            ids::HI_Z,
            ids::RESOLVED_SCENE_DEPTH,
        ]);
        if view.num_samples() > 1 {
            deps.push(ids::UNFLATTEN_LIGHT_ACCUM);
        }
    }
    deps
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::SSR,
        create: || super::RenderNode::Ssr(SsrNode::default()),
        dependencies,
    }
}
