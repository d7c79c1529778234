//! Scene color allocation and MSAA unflatten.

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

/// Allocates the HDR scene color texture (and, under MSAA, the flattened
/// per-sample buffer). Does not perform any rendering.
///
/// Inputs: `[0]` SceneDepth.
#[derive(Default)]
pub struct SceneColorNode {
    /// Output: HDR scene color. Under MSAA its content is undefined until
    /// the flattened buffer has been resolved into it.
    pub scene_color: Option<TextureKey>,
    /// Output: flattened per-sample copy of the scene color. Only allocated
    /// when MSAA is active, because random writes to multisampled textures
    /// are unavailable on some back-ends.
    pub flattened: Option<BufferKey>,
    target: CachedTarget,
}

impl SceneColorNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let rect = ctx.view.view_rect();
        let samples = ctx.view.num_samples();

        let scene_color = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::Rgba16F,
                rect.width,
                rect.height,
                TextureUsage::RENDER_TARGET | TextureUsage::LOAD_STORE | TextureUsage::SAMPLED,
            )
            .with_samples(samples),
        );
        self.scene_color = Some(scene_color);

        self.flattened = (samples > 1).then(|| {
            let elements = rect.width * rect.height * samples;
            ctx.pool.get_buffer(
                ctx.device,
                &BufferDesc::standard(
                    BufferFormat::F16x4,
                    elements,
                    BufferUsage::LOAD_STORE | BufferUsage::COPY_DST,
                ),
            )
        });

        let depth_node = ctx.inputs[0]
            .as_scene_depth()
            .expect("SceneColor input 0 must be SceneDepth");
        let depth = depth_node.depth.map(|key| ctx.pool.texture(key).texture);
        let color = ctx.pool.texture(scene_color).texture;

        self.target.ensure(&[color], depth);
    }

    /// The composed scene-color render target for passes that draw into it.
    pub(super) fn target(&self) -> &CachedTarget {
        &self.target
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        if let Some(key) = self.scene_color.take() {
            ctx.pool.release_texture(key);
        }
        if let Some(key) = self.flattened.take() {
            ctx.pool.release_buffer(key);
        }
    }
}

fn scene_color_dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::SCENE_DEPTH]
}

pub(super) fn scene_color_node_type() -> NodeType {
    NodeType {
        id: ids::SCENE_COLOR,
        create: || super::RenderNode::SceneColor(SceneColorNode::default()),
        dependencies: scene_color_dependencies,
    }
}

/// Resolves the flattened per-sample scene color buffer back into the scene
/// color texture. Only present in MSAA graphs.
///
/// Inputs: `[0]` SceneColor.
#[derive(Default)]
pub struct UnflattenSceneColorNode;

impl UnflattenSceneColorNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let scene_color_node = ctx.inputs[0]
            .as_scene_color()
            .expect("UnflattenSceneColor input 0 must be SceneColor");
        let Some(flattened) = scene_color_node.flattened else {
            return;
        };

        let target = scene_color_node.target();
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
    smallvec![ids::SCENE_COLOR]
}

pub(super) fn unflatten_node_type() -> NodeType {
    NodeType {
        id: ids::UNFLATTEN_SCENE_COLOR,
        create: || super::RenderNode::UnflattenSceneColor(UnflattenSceneColorNode),
        dependencies: unflatten_dependencies,
    }
}
