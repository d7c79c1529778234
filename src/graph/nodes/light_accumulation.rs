//! Light accumulation target and MSAA unflatten.

use smallvec::{smallvec, SmallVec};

use super::{ids, CachedTarget};
use crate::gfx::{
    BufferDesc, BufferFormat, BufferUsage, BuiltinMaterial, PixelFormat, ShaderVariant,
    TextureDesc, TextureUsage,
};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::{BufferKey, TextureKey};
use crate::view::RendererView;

/// Allocates the floating-point light accumulation target the lighting
/// passes add into. Does not perform any rendering.
///
/// Inputs: `[0]` SceneDepth.
#[derive(Default)]
pub struct LightAccumulationNode {
    /// Output: accumulated direct lighting. Under MSAA its content is
    /// undefined until the flattened buffer is resolved into it.
    pub light_accum: Option<TextureKey>,
    /// Output: flattened per-sample accumulation buffer (MSAA only),
    /// zero-filled at allocation so additive lighting starts from black.
    pub flattened: Option<BufferKey>,
    target: CachedTarget,
}

impl LightAccumulationNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let rect = ctx.view.view_rect();
        let samples = ctx.view.num_samples();

        if samples > 1 {
            let elements = rect.width * rect.height * samples;
            let flattened = ctx.pool.get_buffer(
                ctx.device,
                &BufferDesc::standard(
                    BufferFormat::F16x4,
                    elements,
                    BufferUsage::LOAD_STORE | BufferUsage::COPY_DST,
                ),
            );
            // Multisample load/store through a texture view is unavailable
            // on some back-ends; lighting accumulates into this buffer
            // instead, so it must start zeroed.
            ctx.device.zero_buffer(ctx.pool.buffer(flattened).buffer);
            self.flattened = Some(flattened);
        } else {
            self.flattened = None;
        }

        let light_accum = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::Rgba16F,
                rect.width,
                rect.height,
                TextureUsage::LOAD_STORE | TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            )
            .with_samples(samples),
        );
        self.light_accum = Some(light_accum);

        let depth_node = ctx.inputs[0]
            .as_scene_depth()
            .expect("LightAccumulation input 0 must be SceneDepth");
        let depth = depth_node.depth.map(|key| ctx.pool.texture(key).texture);
        let color = ctx.pool.texture(light_accum).texture;

        self.target.ensure(&[color], depth);
    }

    /// The composed accumulation render target for the lighting passes.
    pub(super) fn target(&self) -> &CachedTarget {
        &self.target
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        if let Some(key) = self.light_accum.take() {
            ctx.pool.release_texture(key);
        }
        if let Some(key) = self.flattened.take() {
            ctx.pool.release_buffer(key);
        }
    }
}

fn light_accumulation_dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::SCENE_DEPTH]
}

pub(super) fn light_accumulation_node_type() -> NodeType {
    NodeType {
        id: ids::LIGHT_ACCUMULATION,
        create: || super::RenderNode::LightAccumulation(LightAccumulationNode::default()),
        dependencies: light_accumulation_dependencies,
    }
}

/// Resolves the flattened per-sample accumulation buffer into the light
/// accumulation texture. Only present in MSAA graphs.
///
/// Inputs: `[0]` LightAccumulation.
#[derive(Default)]
pub struct UnflattenLightAccumNode;

impl UnflattenLightAccumNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let light_accum_node = ctx.inputs[0]
            .as_light_accumulation()
            .expect("UnflattenLightAccum input 0 must be LightAccumulation");
        let Some(flattened) = light_accum_node.flattened else {
            return;
        };

        let target = light_accum_node.target();
        ctx.encoder
            .set_render_target(target.colors(), target.depth(), true);
        ctx.encoder.draw_fullscreen_with_buffers(
            BuiltinMaterial::FlatFramebufferToTexture,
            ShaderVariant::msaa(ctx.view.num_samples()),
            &[],
            &[ctx.pool.buffer(flattened).buffer],
        );
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn unflatten_dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::LIGHT_ACCUMULATION]
}

pub(super) fn unflatten_node_type() -> NodeType {
    NodeType {
        id: ids::UNFLATTEN_LIGHT_ACCUM,
        create: || super::RenderNode::UnflattenLightAccum(UnflattenLightAccumNode),
        dependencies: unflatten_dependencies,
    }
}
