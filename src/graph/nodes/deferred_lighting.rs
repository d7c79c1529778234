//! Direct lighting: tiled deferred (unshadowed) and standard deferred
//! (shadowed) paths.

use smallvec::{smallvec, SmallVec};

use super::{ids, CachedTarget, FULL_VIEWPORT};
use crate::gfx::{
    BuiltinMaterial, ClearFlags, PixelFormat, ShaderVariant, TextureDesc, TextureId, TextureUsage,
};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::scene::LightType;
use crate::view::RendererView;

/// Tile size of the tiled-deferred compute kernel.
const TILE_SIZE: u32 = 16;

fn gbuffer_reads(ctx: &NodeContext<'_, '_>, gbuffer_input: usize, depth_input: usize) -> Vec<TextureId> {
    let gbuffer = ctx.inputs[gbuffer_input]
        .as_gbuffer()
        .expect("lighting input must be GBuffer");
    let depth = ctx.inputs[depth_input]
        .as_scene_depth()
        .expect("lighting input must be SceneDepth");

    [
        gbuffer.albedo,
        gbuffer.normals,
        gbuffer.rough_metal,
        depth.depth,
    ]
    .into_iter()
    .flatten()
    .map(|key| ctx.pool.texture(key).texture)
    .collect()
}

/// Evaluates all unshadowed lights in one compute dispatch, accumulating
/// into the light accumulation target. Shadowed lights are left to the
/// standard deferred path.
///
/// Inputs: `[0]` LightAccumulation, `[1]` GBuffer, `[2]` SceneDepth,
/// `[3]` MSAACoverage (only when MSAA is active).
#[derive(Default)]
pub struct TiledDeferredLightingNode;

impl TiledDeferredLightingNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let rect = ctx.view.view_rect();
        let samples = ctx.view.num_samples();

        let light_accum = ctx.inputs[0]
            .as_light_accumulation()
            .expect("TiledDeferredLighting input 0 must be LightAccumulation");

        let mut reads = gbuffer_reads(ctx, 1, 2);
        if samples > 1 {
            let coverage = ctx.inputs[3]
                .as_msaa_coverage()
                .expect("TiledDeferredLighting input 3 must be MSAACoverage");
            if let Some(key) = coverage.output {
                reads.push(ctx.pool.texture(key).texture);
            }
        }

        let accum_tex = light_accum
            .light_accum
            .map(|key| ctx.pool.texture(key).texture);
        let buffer_writes: Vec<_> = light_accum
            .flattened
            .map(|key| ctx.pool.buffer(key).buffer)
            .into_iter()
            .collect();

        let groups = [
            rect.width.div_ceil(TILE_SIZE),
            rect.height.div_ceil(TILE_SIZE),
            1,
        ];

        ctx.encoder.dispatch(
            BuiltinMaterial::TiledDeferredLighting,
            ShaderVariant::msaa(samples),
            &reads,
            accum_tex.as_slice(),
            &buffer_writes,
            groups,
        );
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn tiled_dependencies(view: &RendererView) -> SmallVec<[NodeId; 4]> {
    let mut deps = smallvec![ids::LIGHT_ACCUMULATION, ids::GBUFFER, ids::SCENE_DEPTH];
    if view.num_samples() > 1 {
        deps.push(ids::MSAA_COVERAGE);
    }
    deps
}

pub(super) fn tiled_node_type() -> NodeType {
    NodeType {
        id: ids::TILED_DEFERRED_LIGHTING,
        create: || super::RenderNode::TiledDeferredLighting(TiledDeferredLightingNode),
        dependencies: tiled_dependencies,
    }
}

/// Evaluates shadowed lights one at a time: each light's shadow map is
/// projected into a screen-space occlusion mask, then a full-screen lighting
/// pass modulated by that mask accumulates into the light accumulation
/// target.
///
/// Inputs: `[0]` TiledDeferredLighting, `[1]` LightAccumulation,
/// `[2]` GBuffer, `[3]` SceneDepth, `[4]` ShadowMaps,
/// `[5]` UnflattenLightAccum (only when MSAA is active).
#[derive(Default)]
pub struct StandardDeferredLightingNode {
    occlusion_target: CachedTarget,
}

impl StandardDeferredLightingNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        // With shadows disabled every light went through tiled deferred.
        if !ctx.view.settings().enable_shadows {
            return;
        }

        let rect = ctx.view.view_rect();
        let samples = ctx.view.num_samples();

        let gbuffer_textures = gbuffer_reads(ctx, 2, 3);

        let light_accum = ctx.inputs[1]
            .as_light_accumulation()
            .expect("StandardDeferredLighting input 1 must be LightAccumulation");
        let depth_node = ctx.inputs[3]
            .as_scene_depth()
            .expect("StandardDeferredLighting input 3 must be SceneDepth");
        let shadow_maps = ctx.inputs[4]
            .as_shadow_maps()
            .expect("StandardDeferredLighting input 4 must be ShadowMaps");

        let depth = depth_node.depth.map(|key| ctx.pool.texture(key).texture);

        // Occlusion mask is scratch within this node; allocated here,
        // released before render returns.
        let occlusion = ctx.pool.get_texture(
            ctx.device,
            &TextureDesc::d2(
                PixelFormat::R8,
                rect.width,
                rect.height,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            )
            .with_samples(samples),
        );
        let occlusion_tex = ctx.pool.texture(occlusion).texture;
        self.occlusion_target.ensure(&[occlusion_tex], depth);

        let accum_target = light_accum.target();
        let lights = ctx.view_group.visible_light_data();

        for light_type in [LightType::Directional, LightType::Radial, LightType::Spot] {
            for &light_index in lights.shadowed_lights(light_type) {
                if !ctx
                    .view
                    .visibility()
                    .lights
                    .get(light_index)
                    .copied()
                    .unwrap_or(false)
                {
                    continue;
                }

                let mut occlusion_reads = gbuffer_textures.clone();
                if let Some(map) = shadow_maps.shadow_map_for(light_index) {
                    occlusion_reads.push(ctx.pool.texture(map).texture);
                }

                ctx.encoder.set_render_target(
                    self.occlusion_target.colors(),
                    self.occlusion_target.depth(),
                    true,
                );
                ctx.encoder.set_viewport(FULL_VIEWPORT);
                ctx.encoder.clear(ClearFlags::COLOR, [0.0; 4], 1.0, 0);
                ctx.encoder.draw_fullscreen(
                    BuiltinMaterial::ShadowOcclusion,
                    ShaderVariant::msaa(samples),
                    &occlusion_reads,
                );

                let mut lighting_reads = gbuffer_textures.clone();
                lighting_reads.push(occlusion_tex);

                ctx.encoder
                    .set_render_target(accum_target.colors(), accum_target.depth(), true);
                ctx.encoder.draw_fullscreen(
                    BuiltinMaterial::StandardDeferredLight,
                    ShaderVariant::msaa(samples),
                    &lighting_reads,
                );
            }
        }

        // Unbind so the accumulation texture is readable by later passes.
        ctx.encoder.unbind_render_target();

        ctx.pool.release_texture(occlusion);
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn standard_dependencies(view: &RendererView) -> SmallVec<[NodeId; 4]> {
    let mut deps = smallvec![
        ids::TILED_DEFERRED_LIGHTING,
        ids::LIGHT_ACCUMULATION,
        ids::GBUFFER,
        ids::SCENE_DEPTH,
        ids::SHADOW_MAPS,
    ];
    if view.num_samples() > 1 {
        deps.push(ids::UNFLATTEN_LIGHT_ACCUM);
    }
    deps
}

pub(super) fn standard_node_type() -> NodeType {
    NodeType {
        id: ids::STANDARD_DEFERRED_LIGHTING,
        create: || {
            super::RenderNode::StandardDeferredLighting(StandardDeferredLightingNode::default())
        },
        dependencies: standard_dependencies,
    }
}
