//! G-buffer base pass.

use smallvec::{smallvec, SmallVec};

use super::{ids, CachedTarget, FULL_VIEWPORT};
use crate::extensions::ExtensionStage;
use crate::gfx::{ClearFlags, PixelFormat, TextureDesc, TextureUsage, COLOR_MASK_RGB};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::TextureKey;
use crate::view::RendererView;

/// Allocates the G-buffer targets and renders the base pass: every opaque
/// renderable visible to the view, in queue order.
///
/// Inputs: `[0]` SceneDepth.
#[derive(Default)]
pub struct GBufferNode {
    /// Output: surface albedo (sRGB). The alpha channel carries the
    /// per-pixel write mask and is preserved across the clear.
    pub albedo: Option<TextureKey>,
    /// Output: world-space normals.
    pub normals: Option<TextureKey>,
    /// Output: roughness + metalness.
    pub rough_metal: Option<TextureKey>,
    target: CachedTarget,
}

impl GBufferNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let rect = ctx.view.view_rect();
        let samples = ctx.view.num_samples();
        let usage = TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED;

        let albedo = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(PixelFormat::Rgba8, rect.width, rect.height, usage)
                .with_samples(samples)
                .with_srgb(true),
        );
        let normals = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(PixelFormat::Rgb10A2, rect.width, rect.height, usage)
                .with_samples(samples),
        );
        let rough_metal = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(PixelFormat::Rg16F, rect.width, rect.height, usage)
                .with_samples(samples),
        );

        self.albedo = Some(albedo);
        self.normals = Some(normals);
        self.rough_metal = Some(rough_metal);

        let depth_node = ctx.inputs[0]
            .as_scene_depth()
            .expect("GBuffer input 0 must be SceneDepth");
        let depth = depth_node.depth.map(|key| ctx.pool.texture(key).texture);

        let albedo_tex = ctx.pool.texture(albedo).texture;
        let normals_tex = ctx.pool.texture(normals).texture;
        let rough_metal_tex = ctx.pool.texture(rough_metal).texture;

        // Rebuild the composed target only when an attachment identity
        // changed; pooled reuse makes the cached composition the common case.
        let rebuilt = self
            .target
            .ensure(&[albedo_tex, normals_tex, rough_metal_tex], depth);
        if rebuilt {
            log::trace!("gbuffer render target recomposed");
        }

        ctx.invoke_extensions(ExtensionStage::PreBasePass);

        // Clear the secondary targets fully, then the albedo target with the
        // write-mask channel (alpha) preserved.
        ctx.encoder
            .set_render_target([normals_tex, rough_metal_tex], depth, false);
        ctx.encoder.set_viewport(FULL_VIEWPORT);
        ctx.encoder.clear(
            ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL,
            [0.0; 4],
            1.0,
            0,
        );

        ctx.encoder.set_render_target([albedo_tex], None, false);
        ctx.encoder
            .clear_masked(ClearFlags::COLOR, [0.0; 4], COLOR_MASK_RGB, 1.0, 0);

        ctx.encoder
            .set_render_target(self.target.colors(), self.target.depth(), false);
        ctx.encoder.set_viewport(FULL_VIEWPORT);

        for element in ctx.view.opaque_queue() {
            let renderable = &ctx.scene.renderables[element.renderable];
            ctx.encoder.draw(renderable.mesh, renderable.material);
        }

        ctx.invoke_extensions(ExtensionStage::PostBasePass);
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        for key in [
            self.albedo.take(),
            self.normals.take(),
            self.rough_metal.take(),
        ]
        .into_iter()
        .flatten()
        {
            ctx.pool.release_texture(key);
        }
    }
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::SCENE_DEPTH]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::GBUFFER,
        create: || super::RenderNode::GBuffer(GBufferNode::default()),
        dependencies,
    }
}
