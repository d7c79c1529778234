//! Gaussian depth of field.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::gfx::{
    BuiltinMaterial, PixelFormat, ShaderVariant, TextureDesc, TextureUsage, VariantFlags,
};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::view::RendererView;

/// Blurs out-of-focus regions with separate near/far field passes and
/// recombines them with the focused image.
///
/// Skips all allocation when disabled or when both blur amounts are zero —
/// the disabled fast-path, not an error.
///
/// Inputs: `[0]` Tonemapping (ordering only), `[1]` SceneDepth,
/// `[2]` PostProcess.
#[derive(Default)]
pub struct GaussianDofNode;

impl GaussianDofNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let settings = ctx.view.settings().depth_of_field.clone();
        let near = settings.near_blur_amount > 0.0;
        let far = settings.far_blur_amount > 0.0;
        if !settings.enabled || (!near && !far) {
            return;
        }

        let depth_node = ctx.inputs[1]
            .as_scene_depth()
            .expect("GaussianDOF input 1 must be SceneDepth");
        let post_process = ctx.inputs[2]
            .as_post_process()
            .expect("GaussianDOF input 2 must be PostProcess");

        let Some(depth) = depth_node.depth.map(|key| ctx.pool.texture(key).texture) else {
            return;
        };

        let (output, last) = post_process.get_and_switch(ctx.device, ctx.pool, ctx.view);
        let Some(last) = last.map(|key| ctx.pool.texture(key).texture) else {
            // Nothing rendered into the chain yet; DOF has no input.
            return;
        };
        let output_tex = ctx.pool.texture(output).texture;

        let rect = ctx.view.view_rect();
        let field_desc = TextureDesc::d2(
            PixelFormat::Rgba8,
            (rect.width / 2).max(1),
            (rect.height / 2).max(1),
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        );

        let mut field_flags = VariantFlags::empty();
        if near {
            field_flags |= VariantFlags::NEAR;
        }
        if far {
            field_flags |= VariantFlags::FAR;
        }

        // Separate the out-of-focus fields at half resolution.
        let near_field = near.then(|| ctx.pool.get_texture(ctx.device, &field_desc));
        let far_field = far.then(|| ctx.pool.get_texture(ctx.device, &field_desc));

        let separate_writes: Vec<_> = [near_field, far_field]
            .into_iter()
            .flatten()
            .map(|key| ctx.pool.texture(key).texture)
            .collect();
        ctx.encoder
            .set_render_target(separate_writes.iter().copied(), None, false);
        ctx.encoder.draw_fullscreen(
            BuiltinMaterial::GaussianDofSeparate,
            ShaderVariant::default().with_flags(field_flags),
            &[last, depth],
        );

        // One scratch target serves both blurs; when both fields are active
        // the near field's source texture is recycled as the far blur's
        // destination.
        let scratch = ctx.pool.get_texture(ctx.device, &field_desc);
        let scratch_tex = ctx.pool.texture(scratch).texture;

        let mut blurred_near = None;
        if let Some(near_field) = near_field {
            ctx.encoder.set_render_target([scratch_tex], None, false);
            ctx.encoder.draw_fullscreen(
                BuiltinMaterial::GaussianBlur,
                ShaderVariant::default().with_flags(VariantFlags::NEAR),
                &[ctx.pool.texture(near_field).texture],
            );
            blurred_near = Some(scratch_tex);
        }

        let mut blurred_far = None;
        if let Some(far_field) = far_field {
            let destination = if blurred_near.is_some() {
                ctx.pool
                    .texture(near_field.expect("near field exists when scratch is taken"))
                    .texture
            } else {
                scratch_tex
            };
            ctx.encoder.set_render_target([destination], None, false);
            ctx.encoder.draw_fullscreen(
                BuiltinMaterial::GaussianBlur,
                ShaderVariant::default().with_flags(VariantFlags::FAR),
                &[ctx.pool.texture(far_field).texture],
            );
            blurred_far = Some(destination);
        }

        // Recombine into the post-process output.
        let mut reads = vec![last];
        reads.extend(blurred_near);
        reads.extend(blurred_far);
        reads.push(depth);

        ctx.encoder.set_render_target([output_tex], None, false);
        ctx.encoder.draw_fullscreen(
            BuiltinMaterial::GaussianDofCombine,
            ShaderVariant::default().with_flags(field_flags),
            &reads,
        );

        for key in [near_field, far_field, Some(scratch)].into_iter().flatten() {
            ctx.pool.release_texture(key);
        }
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::TONEMAPPING, ids::SCENE_DEPTH, ids::POST_PROCESS]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::GAUSSIAN_DOF,
        create: || super::RenderNode::GaussianDof(GaussianDofNode),
        dependencies,
    }
}
