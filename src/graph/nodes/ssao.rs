//! Screen-space ambient occlusion.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::gfx::{
    BuiltinMaterial, PixelFormat, ShaderVariant, TextureDesc, TextureId, TextureUsage,
    VariantFlags,
};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::TextureKey;
use crate::view::RendererView;

/// Evaluates screen-space ambient occlusion. Higher quality tiers add
/// downsampled evaluation levels (larger effective radius at less cache
/// pressure) whose results upsample-blend into the full-resolution pass,
/// plus a depth-aware separable blur.
///
/// Only present in graphs where ambient occlusion is enabled; consumers
/// substitute a static white texture otherwise.
///
/// Inputs: `[0]` ResolvedSceneDepth, `[1]` GBuffer.
#[derive(Default)]
pub struct SsaoNode {
    /// Output: single-channel occlusion, full resolution.
    pub output: Option<TextureKey>,
}

impl SsaoNode {
    fn ao_desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc::d2(
            PixelFormat::R8,
            width.max(1),
            height.max(1),
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        )
    }

    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let settings = ctx.view.settings().ambient_occlusion.clone();
        if !settings.enabled {
            return;
        }

        let resolved = ctx.inputs[0]
            .as_resolved_scene_depth()
            .expect("SSAO input 0 must be ResolvedSceneDepth");
        let gbuffer = ctx.inputs[1]
            .as_gbuffer()
            .expect("SSAO input 1 must be GBuffer");

        let Some(depth) = resolved.output.map(|key| ctx.pool.texture(key).texture) else {
            return;
        };
        let Some(normals_key) = gbuffer.normals else {
            return;
        };

        let rect = ctx.view.view_rect();
        let quality = settings.quality;

        // Multisampled normals have to be resolved before sampling.
        let mut resolved_normals = None;
        let normals: TextureId = if ctx.view.num_samples() > 1 {
            let target = ctx.pool.get_texture(
                ctx.device,
                &TextureDesc::d2(
                    PixelFormat::Rgb10A2,
                    rect.width,
                    rect.height,
                    TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                ),
            );
            let target_tex = ctx.pool.texture(target).texture;
            ctx.encoder.set_render_target([target_tex], None, false);
            ctx.encoder
                .blit(ctx.pool.texture(normals_key).texture, false);
            resolved_normals = Some(target);
            target_tex
        } else {
            ctx.pool.texture(normals_key).texture
        };

        // Downsampled AO levels minimize cache thrashing for the larger
        // sampling radii; their results blend upward level by level.
        let downsample_levels = match quality {
            0 | 1 => 0,
            2 => 1,
            _ => 2,
        };

        let variant = ShaderVariant::default().with_quality(quality);
        let noise = ctx.textures.ssao_randomization;

        let mut setup_quarter = None;
        let mut ao_quarter = None;
        if downsample_levels > 1 {
            let setup = ctx.pool.get_texture(
                ctx.device,
                &TextureDesc::d2(
                    PixelFormat::Rgba16F,
                    (rect.width / 4).max(1),
                    (rect.height / 4).max(1),
                    TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                ),
            );
            let setup_tex = ctx.pool.texture(setup).texture;
            ctx.encoder.set_render_target([setup_tex], None, false);
            ctx.encoder.draw_fullscreen(
                BuiltinMaterial::SsaoDownsample,
                variant,
                &[depth, normals],
            );

            let ao = ctx
                .pool
                .get_texture(ctx.device, &Self::ao_desc(rect.width / 4, rect.height / 4));
            let ao_tex = ctx.pool.texture(ao).texture;
            ctx.encoder.set_render_target([ao_tex], None, false);
            ctx.encoder.draw_fullscreen(
                BuiltinMaterial::Ssao,
                variant,
                &[depth, normals, noise, setup_tex],
            );

            setup_quarter = Some(setup);
            ao_quarter = Some(ao);
        }

        let mut setup_half = None;
        let mut ao_half = None;
        if downsample_levels > 0 {
            let setup = ctx.pool.get_texture(
                ctx.device,
                &TextureDesc::d2(
                    PixelFormat::Rgba16F,
                    (rect.width / 2).max(1),
                    (rect.height / 2).max(1),
                    TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                ),
            );
            let setup_tex = ctx.pool.texture(setup).texture;
            ctx.encoder.set_render_target([setup_tex], None, false);
            ctx.encoder.draw_fullscreen(
                BuiltinMaterial::SsaoDownsample,
                variant,
                &[depth, normals],
            );

            let ao = ctx
                .pool
                .get_texture(ctx.device, &Self::ao_desc(rect.width / 2, rect.height / 2));
            let ao_tex = ctx.pool.texture(ao).texture;

            let mut reads = vec![depth, normals, noise, setup_tex];
            let mut level_variant = variant;
            if let Some(lower) = ao_quarter {
                reads.push(ctx.pool.texture(lower).texture);
                level_variant = level_variant.with_flags(VariantFlags::UPSAMPLE);
            }

            ctx.encoder.set_render_target([ao_tex], None, false);
            ctx.encoder
                .draw_fullscreen(BuiltinMaterial::Ssao, level_variant, &reads);

            // The quarter-res level has been consumed.
            if let Some(lower) = ao_quarter.take() {
                ctx.pool.release_texture(lower);
            }

            setup_half = Some(setup);
            ao_half = Some(ao);
        }

        // Full-resolution final pass.
        let output = ctx
            .pool
            .get_texture(ctx.device, &Self::ao_desc(rect.width, rect.height));
        let output_tex = ctx.pool.texture(output).texture;
        self.output = Some(output);

        let mut reads = vec![depth, normals, noise];
        reads.extend(setup_half.map(|key| ctx.pool.texture(key).texture));
        let mut final_variant = variant.with_flags(VariantFlags::FINAL_PASS);
        if let Some(lower) = ao_half {
            reads.push(ctx.pool.texture(lower).texture);
            final_variant = final_variant.with_flags(VariantFlags::UPSAMPLE);
        }

        ctx.encoder.set_render_target([output_tex], None, false);
        ctx.encoder
            .draw_fullscreen(BuiltinMaterial::Ssao, final_variant, &reads);

        // Tier 0/1 rely on the in-shader blur; higher tiers run the
        // depth-aware separable blur over the result.
        if quality > 1 {
            let scratch = ctx
                .pool
                .get_texture(ctx.device, &Self::ao_desc(rect.width, rect.height));
            let scratch_tex = ctx.pool.texture(scratch).texture;

            ctx.encoder.set_render_target([scratch_tex], None, false);
            ctx.encoder.draw_fullscreen(
                BuiltinMaterial::SsaoBlur,
                variant.with_flags(VariantFlags::HORIZONTAL),
                &[output_tex, depth],
            );
            ctx.encoder.set_render_target([output_tex], None, false);
            ctx.encoder.draw_fullscreen(
                BuiltinMaterial::SsaoBlur,
                variant.with_flags(VariantFlags::VERTICAL),
                &[scratch_tex, depth],
            );

            ctx.pool.release_texture(scratch);
        }
        ctx.encoder.unbind_render_target();

        for key in [resolved_normals, setup_quarter, setup_half, ao_half]
            .into_iter()
            .flatten()
        {
            ctx.pool.release_texture(key);
        }
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
        id: ids::SSAO,
        create: || super::RenderNode::Ssao(SsaoNode::default()),
        dependencies,
    }
}
