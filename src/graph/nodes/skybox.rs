//! Skybox pass.

use smallvec::{smallvec, SmallVec};

use super::{ids, FULL_VIEWPORT};
use crate::gfx::{BuiltinMaterial, ShaderVariant, VariantFlags};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::view::RendererView;

/// Renders the skybox into the scene color target. Falls back to a solid
/// background color when the feature is disabled or the scene has no
/// radiance texture.
///
/// Inputs: `[0]` TiledDeferredIBL (ordering only), `[1]` SceneColor,
/// `[2]` UnflattenSceneColor (only when MSAA is active, ordering only).
#[derive(Default)]
pub struct SkyboxNode;

impl SkyboxNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let scene_color = ctx.inputs[1]
            .as_scene_color()
            .expect("Skybox input 1 must be SceneColor");

        let radiance = if ctx.view.settings().enable_skybox {
            ctx.scene.skybox.as_ref().and_then(|skybox| skybox.radiance)
        } else {
            None
        };

        let target = scene_color.target();
        ctx.encoder
            .set_render_target(target.colors(), target.depth(), true);
        ctx.encoder.set_viewport(FULL_VIEWPORT);

        match radiance {
            Some(radiance) => {
                ctx.encoder.draw_fullscreen(
                    BuiltinMaterial::Skybox,
                    ShaderVariant::default(),
                    &[radiance],
                );
            }
            None => {
                // Solid-color variant; the color itself rides in the
                // per-view parameter buffer.
                ctx.encoder.draw_fullscreen(
                    BuiltinMaterial::Skybox,
                    ShaderVariant::default().with_flags(VariantFlags::SOLID_COLOR),
                    &[],
                );
            }
        }
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn dependencies(view: &RendererView) -> SmallVec<[NodeId; 4]> {
    let mut deps = smallvec![ids::TILED_DEFERRED_IBL, ids::SCENE_COLOR];
    if view.num_samples() > 1 {
        deps.push(ids::UNFLATTEN_SCENE_COLOR);
    }
    deps
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::SKYBOX,
        create: || super::RenderNode::Skybox(SkyboxNode),
        dependencies,
    }
}
