//! Tonemapping and auto-exposure.

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

/// Edge length of the tonemapping 3D lookup table.
const LUT_SIZE: u32 = 32;

/// Maps HDR scene color to the LDR post-process chain, resolving MSAA in the
/// same pass. Runs eye adaptation first when auto-exposure is enabled.
///
/// This is the single node with cross-frame state: the eye-adaptation result
/// is swapped into the view's persistent context at `clear` instead of being
/// released, so next frame's adaptation can converge from it.
///
/// Inputs: `[0]` SceneColor, `[1]` ClusteredForward (ordering only),
/// `[2]` PostProcess.
#[derive(Default)]
pub struct TonemappingNode {
    /// This frame's eye-adaptation value; handed to the persistent state in
    /// `clear`.
    eye_adaptation: Option<TextureKey>,
    lut: Option<TextureKey>,
    /// Settings hash at the last LUT bake.
    lut_settings_hash: Option<u64>,
    /// Identity of the texture holding the baked LUT. Pooled reuse normally
    /// hands back the same texture; when it does not, the bake must rerun
    /// even with unchanged settings.
    lut_texture: Option<TextureId>,
}

impl TonemappingNode {
    fn run_auto_exposure(&mut self, ctx: &mut NodeContext<'_, '_>, scene_color: TextureId) {
        let rect = ctx.view.view_rect();
        let msaa = ctx.view.num_samples() > 1;

        // Downsample the scene to quarter size for histogram building.
        let downsampled = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::Rgba16F,
                (rect.width / 2).max(1),
                (rect.height / 2).max(1),
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ),
        );
        let downsampled_tex = ctx.pool.texture(downsampled).texture;
        ctx.encoder.set_render_target([downsampled_tex], None, false);
        ctx.encoder.draw_fullscreen(
            BuiltinMaterial::Downsample,
            ShaderVariant::msaa(if msaa { ctx.view.num_samples() } else { 1 }),
            &[scene_color],
        );

        // Luminance histogram, then reduction against last frame's value.
        let histogram = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::R32F,
                64,
                64,
                TextureUsage::LOAD_STORE | TextureUsage::SAMPLED,
            ),
        );
        let histogram_tex = ctx.pool.texture(histogram).texture;
        ctx.encoder.dispatch(
            BuiltinMaterial::EyeAdaptHistogram,
            ShaderVariant::default(),
            &[downsampled_tex],
            &[histogram_tex],
            &[],
            [rect.width.div_ceil(16).max(1), rect.height.div_ceil(16).max(1), 1],
        );

        let reduced = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::R32F,
                64,
                1,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ),
        );
        let reduced_tex = ctx.pool.texture(reduced).texture;

        let prev = ctx
            .persistent
            .prev_eye_adaptation
            .map(|key| ctx.pool.texture(key).texture)
            .unwrap_or(ctx.textures.white);

        ctx.encoder.set_render_target([reduced_tex], None, false);
        ctx.encoder.draw_fullscreen(
            BuiltinMaterial::EyeAdaptHistogramReduce,
            ShaderVariant::default(),
            &[downsampled_tex, histogram_tex, prev],
        );

        ctx.pool.release_texture(downsampled);
        ctx.pool.release_texture(histogram);

        // Final 1×1 adaptation value, blended towards the scene average at
        // the configured speeds.
        let eye_adaptation = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::R32F,
                1,
                1,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ),
        );
        let eye_tex = ctx.pool.texture(eye_adaptation).texture;
        ctx.encoder.set_render_target([eye_tex], None, false);
        ctx.encoder.draw_fullscreen(
            BuiltinMaterial::EyeAdaptation,
            ShaderVariant::default().with_flags(VariantFlags::AUTO_EXPOSURE),
            &[reduced_tex],
        );

        ctx.pool.release_texture(reduced);
        self.eye_adaptation = Some(eye_adaptation);
    }

    fn ensure_tonemap_lut(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let desc = TextureDesc::d3(
            PixelFormat::Rgba8,
            LUT_SIZE,
            LUT_SIZE,
            LUT_SIZE,
            TextureUsage::LOAD_STORE | TextureUsage::SAMPLED,
        );
        // Matching slot is a no-op; pooled reuse normally returns the texture
        // that already holds last bake's content.
        ctx.pool.get_texture_in(ctx.device, &mut self.lut, &desc);
        let lut = self.lut.expect("LUT slot filled by get_texture_in");
        let lut_tex = ctx.pool.texture(lut).texture;

        let settings_hash = ctx.view.settings_hash();
        let dirty = self.lut_settings_hash != Some(settings_hash)
            || self.lut_texture != Some(lut_tex);
        if dirty {
            ctx.encoder.dispatch(
                BuiltinMaterial::CreateTonemapLut,
                ShaderVariant::default(),
                &[],
                &[lut_tex],
                &[],
                [LUT_SIZE / 8, LUT_SIZE / 8, LUT_SIZE],
            );
            self.lut_settings_hash = Some(settings_hash);
            self.lut_texture = Some(lut_tex);
        }
    }

    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let settings = ctx.view.settings().clone();

        let scene_color_node = ctx.inputs[0]
            .as_scene_color()
            .expect("Tonemapping input 0 must be SceneColor");
        let post_process = ctx.inputs[2]
            .as_post_process()
            .expect("Tonemapping input 2 must be PostProcess");

        let Some(scene_color_key) = scene_color_node.scene_color else {
            return;
        };
        let scene_color = ctx.pool.texture(scene_color_key).texture;

        if settings.enable_hdr && settings.enable_auto_exposure {
            self.run_auto_exposure(ctx, scene_color);
        } else {
            // No adaptation this frame; drop any history so a re-enable
            // starts fresh.
            if let Some(prev) = ctx.persistent.prev_eye_adaptation.take() {
                ctx.pool.release_texture(prev);
            }
            self.eye_adaptation = None;
        }

        let gamma_only = !(settings.enable_hdr && settings.enable_tonemapping);
        if gamma_only {
            if let Some(lut) = self.lut.take() {
                ctx.pool.release_texture(lut);
                self.lut_texture = None;
                self.lut_settings_hash = None;
            }
        } else {
            self.ensure_tonemap_lut(ctx);
        }

        let (output, _last) = post_process.get_and_switch(ctx.device, ctx.pool, ctx.view);
        let output_tex = ctx.pool.texture(output).texture;

        let mut flags = VariantFlags::empty();
        if gamma_only {
            flags |= VariantFlags::GAMMA_ONLY;
        }
        if self.eye_adaptation.is_some() {
            flags |= VariantFlags::AUTO_EXPOSURE;
        }

        let mut reads = vec![scene_color];
        reads.extend(
            self.eye_adaptation
                .map(|key| ctx.pool.texture(key).texture),
        );
        reads.extend(self.lut.map(|key| ctx.pool.texture(key).texture));

        ctx.encoder.set_render_target([output_tex], None, false);
        ctx.encoder.draw_fullscreen(
            BuiltinMaterial::Tonemapping,
            ShaderVariant::msaa(ctx.view.num_samples()).with_flags(flags),
            &reads,
        );
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        // The LUT is frame-local pool state; its *content* survives through
        // pooled reuse, which the identity check in render accounts for.
        if let Some(lut) = self.lut.take() {
            ctx.pool.release_texture(lut);
        }

        // Keep this frame's adaptation for next frame by swapping it into
        // the persistent context instead of releasing it.
        if let Some(prev) = ctx.persistent.prev_eye_adaptation.take() {
            ctx.pool.release_texture(prev);
        }
        ctx.persistent.prev_eye_adaptation = self.eye_adaptation.take();
    }
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::SCENE_COLOR, ids::CLUSTERED_FORWARD, ids::POST_PROCESS]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::TONEMAPPING,
        create: || super::RenderNode::Tonemapping(TonemappingNode::default()),
        dependencies,
    }
}
