//! Shadow map rendering.

use smallvec::SmallVec;

use super::{ids, FULL_VIEWPORT};
use crate::gfx::{ClearFlags, PixelFormat, TextureDesc, TextureUsage};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::TextureKey;
use crate::scene::LightType;
use crate::view::RendererView;

/// Renders a depth map for every visible shadowed light in the view group.
/// Only reachable in graphs built with shadows enabled; its consumers drop
/// the dependency otherwise.
///
/// Inputs: none.
#[derive(Default)]
pub struct ShadowMapsNode {
    /// Output: (light index, shadow map) pairs for this frame.
    maps: Vec<(usize, TextureKey)>,
}

impl ShadowMapsNode {
    /// The shadow map rendered for a light this frame, if any.
    #[must_use]
    pub fn shadow_map_for(&self, light_index: usize) -> Option<TextureKey> {
        self.maps
            .iter()
            .find(|(index, _)| *index == light_index)
            .map(|(_, key)| *key)
    }

    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        if !ctx.view.settings().enable_shadows {
            return;
        }

        let size = ctx.view.settings().shadow_map_size.max(1);
        let lights = ctx.view_group.visible_light_data();

        for light_type in [LightType::Directional, LightType::Radial, LightType::Spot] {
            for &light_index in lights.shadowed_lights(light_type) {
                let map = ctx.pool.get_texture(
                    ctx.device,
                    &TextureDesc::d2(
                        PixelFormat::Depth24Stencil8,
                        size,
                        size,
                        TextureUsage::DEPTH_STENCIL | TextureUsage::SAMPLED,
                    ),
                );
                let map_tex = ctx.pool.texture(map).texture;

                ctx.encoder.set_render_target([], Some(map_tex), false);
                ctx.encoder.set_viewport(FULL_VIEWPORT);
                ctx.encoder
                    .clear(ClearFlags::DEPTH | ClearFlags::STENCIL, [0.0; 4], 1.0, 0);

                for (index, renderable) in ctx.scene.renderables.iter().enumerate() {
                    if !renderable.casts_shadows || renderable.transparent {
                        continue;
                    }
                    // Shadow casters are not restricted to the main frustum;
                    // anything visible in the group can throw a shadow into
                    // this view.
                    let visible_anywhere = ctx.view_group.views().iter().any(|view| {
                        view.visibility()
                            .renderables
                            .get(index)
                            .copied()
                            .unwrap_or(false)
                    });
                    if visible_anywhere {
                        ctx.encoder.draw(renderable.mesh, renderable.material);
                    }
                }

                self.maps.push((light_index, map));
            }
        }

        ctx.encoder.unbind_render_target();
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        for (_, map) in self.maps.drain(..) {
            ctx.pool.release_texture(map);
        }
    }
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    SmallVec::new()
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::SHADOW_MAPS,
        create: || super::RenderNode::ShadowMaps(ShadowMapsNode::default()),
        dependencies,
    }
}
