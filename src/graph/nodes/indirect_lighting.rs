//! Indirect (probe / sky irradiance) lighting.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::gfx::{BuiltinMaterial, ShaderVariant, TextureId, VariantFlags};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::view::RendererView;

/// Adds indirect diffuse lighting into the light accumulation target,
/// evaluated from the light-probe volume when the scene has probes and from
/// sky (or default) irradiance otherwise.
///
/// Inputs: `[0]` GBuffer, `[1]` SceneDepth, `[2]` LightAccumulation,
/// `[3]` the direct-lighting terminus (StandardDeferredLighting with shadows
/// on, TiledDeferredLighting otherwise; ordering only), then SSAO (ambient
/// occlusion on) and UnflattenLightAccum (MSAA on). Of the tail only SSAO's
/// output is read.
#[derive(Default)]
pub struct IndirectLightingNode;

impl IndirectLightingNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let settings = ctx.view.settings();
        if !settings.enable_indirect_lighting {
            return;
        }

        let gbuffer = ctx.inputs[0]
            .as_gbuffer()
            .expect("IndirectLighting input 0 must be GBuffer");
        let depth_node = ctx.inputs[1]
            .as_scene_depth()
            .expect("IndirectLighting input 1 must be SceneDepth");
        let light_accum = ctx.inputs[2]
            .as_light_accumulation()
            .expect("IndirectLighting input 2 must be LightAccumulation");

        // Input 3 is the direct-lighting terminus (ordering only); the
        // conditional tail starts after it.
        let next_input = 4;
        let ssao = if settings.ambient_occlusion.enabled {
            let node = ctx.inputs[next_input]
                .as_ssao()
                .expect("IndirectLighting conditional input must be SSAO");
            node.output.map(|key| ctx.pool.texture(key).texture)
        } else {
            // Disabled AO degrades to "fully unoccluded".
            Some(ctx.textures.white)
        };

        let irradiance = ctx
            .scene
            .skybox
            .as_ref()
            .and_then(|skybox| skybox.radiance)
            .unwrap_or(ctx.textures.default_irradiance);

        let mut reads: Vec<TextureId> = [
            gbuffer.albedo,
            gbuffer.normals,
            gbuffer.rough_metal,
            depth_node.depth,
        ]
        .into_iter()
        .flatten()
        .map(|key| ctx.pool.texture(key).texture)
        .collect();
        reads.push(irradiance);
        reads.extend(ssao);

        let has_probes = ctx
            .view_group
            .visible_probes()
            .iter()
            .any(|&visible| visible);
        let mut variant = ShaderVariant::msaa(ctx.view.num_samples());
        if !has_probes {
            variant = variant.with_flags(VariantFlags::SKY_ONLY);
        }

        let target = light_accum.target();
        ctx.encoder
            .set_render_target(target.colors(), target.depth(), true);
        ctx.encoder
            .draw_fullscreen(BuiltinMaterial::IrradianceEvaluate, variant, &reads);
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn dependencies(view: &RendererView) -> SmallVec<[NodeId; 4]> {
    let settings = view.settings();
    let mut deps = smallvec![ids::GBUFFER, ids::SCENE_DEPTH, ids::LIGHT_ACCUMULATION];

    // Indirect lighting adds on top of the accumulated direct lighting, so
    // it orders after whichever lighting path runs last. With shadows off
    // the shadow-related nodes drop out of the graph entirely.
    if settings.enable_shadows {
        deps.push(ids::STANDARD_DEFERRED_LIGHTING);
    } else {
        deps.push(ids::TILED_DEFERRED_LIGHTING);
    }
    if settings.ambient_occlusion.enabled {
        deps.push(ids::SSAO);
    }
    if view.num_samples() > 1 {
        deps.push(ids::UNFLATTEN_LIGHT_ACCUM);
    }

    deps
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::INDIRECT_LIGHTING,
        create: || super::RenderNode::IndirectLighting(IndirectLightingNode),
        dependencies,
    }
}
