//! Tiled deferred image-based lighting.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::errors::EmberError;
use crate::gfx::{BuiltinMaterial, ShaderVariant, TextureDesc, TextureId};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::scene::SkyboxInfo;
use crate::view::RendererView;

/// Tile size of the IBL compute kernel.
const TILE_SIZE: u32 = 16;

/// Combines direct lighting with specular and diffuse image-based lighting
/// and writes the result into the scene color target.
///
/// Inputs: `[0]` SceneColor, `[1]` GBuffer, `[2]` SceneDepth,
/// `[3]` LightAccumulation, `[4]` IndirectLighting, then in order: SSR (when
/// enabled), SSAO (when enabled), MSAACoverage (when MSAA is active).
#[derive(Default)]
pub struct TiledDeferredIblNode {
    /// Radiance cubemap already reported as malformed; prevents one log line
    /// per frame for the same offending resource.
    flagged_radiance: Option<TextureId>,
}

impl TiledDeferredIblNode {
    /// A usable radiance cubemap must be power-of-two sized with a complete
    /// mip chain, since the filtered-roughness lookup indexes mips directly.
    fn validate_radiance(&mut self, skybox: &SkyboxInfo) -> Option<TextureId> {
        let radiance = skybox.radiance?;

        let pow2 = skybox.radiance_size.is_power_of_two();
        let full_chain = skybox.radiance_mips >= TextureDesc::max_mip_count(skybox.radiance_size);
        if pow2 && full_chain {
            return Some(radiance);
        }

        if self.flagged_radiance != Some(radiance) {
            self.flagged_radiance = Some(radiance);
            let error = EmberError::InvalidResource {
                context: "IBL radiance cubemap",
                detail: format!(
                    "size {} / {} mips (need power-of-two size and a full mip chain); \
                     sky contribution skipped",
                    skybox.radiance_size, skybox.radiance_mips
                ),
            };
            log::error!("{error}");
        }
        None
    }

    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let settings = ctx.view.settings();
        let rect = ctx.view.view_rect();
        let samples = ctx.view.num_samples();

        let scene_color = ctx.inputs[0]
            .as_scene_color()
            .expect("TiledDeferredIBL input 0 must be SceneColor");
        let gbuffer = ctx.inputs[1]
            .as_gbuffer()
            .expect("TiledDeferredIBL input 1 must be GBuffer");
        let depth_node = ctx.inputs[2]
            .as_scene_depth()
            .expect("TiledDeferredIBL input 2 must be SceneDepth");
        let light_accum = ctx.inputs[3]
            .as_light_accumulation()
            .expect("TiledDeferredIBL input 3 must be LightAccumulation");

        let mut next_input = 5;
        let ssr = if settings.screen_space_reflections.enabled {
            let node = ctx.inputs[next_input]
                .as_ssr()
                .expect("TiledDeferredIBL conditional input must be SSR");
            next_input += 1;
            node.output.map(|key| ctx.pool.texture(key).texture)
        } else {
            // Disabled reflections degrade to "no contribution".
            Some(ctx.textures.black)
        };
        let ssao = if settings.ambient_occlusion.enabled {
            let node = ctx.inputs[next_input]
                .as_ssao()
                .expect("TiledDeferredIBL conditional input must be SSAO");
            next_input += 1;
            node.output.map(|key| ctx.pool.texture(key).texture)
        } else {
            Some(ctx.textures.white)
        };
        let coverage = if samples > 1 {
            ctx.inputs[next_input]
                .as_msaa_coverage()
                .expect("TiledDeferredIBL conditional input must be MSAACoverage")
                .output
                .map(|key| ctx.pool.texture(key).texture)
        } else {
            None
        };

        let sky_radiance = ctx
            .scene
            .skybox
            .clone()
            .and_then(|skybox| self.validate_radiance(&skybox));

        let mut reads: Vec<TextureId> = [
            gbuffer.albedo,
            gbuffer.normals,
            gbuffer.rough_metal,
            depth_node.depth,
            light_accum.light_accum,
        ]
        .into_iter()
        .flatten()
        .map(|key| ctx.pool.texture(key).texture)
        .collect();
        reads.push(ctx.textures.preintegrated_env_brdf);
        reads.extend(ssr);
        reads.extend(ssao);
        reads.extend(coverage);
        reads.extend(sky_radiance);
        reads.extend(
            ctx.scene
                .reflection_probes
                .iter()
                .zip(ctx.view_group.visible_probes())
                .filter(|&(_, &visible)| visible)
                .filter_map(|(probe, _)| probe.cubemap),
        );

        let writes: Vec<TextureId> = scene_color
            .scene_color
            .map(|key| ctx.pool.texture(key).texture)
            .into_iter()
            .collect();
        let buffer_writes: Vec<_> = scene_color
            .flattened
            .map(|key| ctx.pool.buffer(key).buffer)
            .into_iter()
            .collect();

        ctx.encoder.dispatch(
            BuiltinMaterial::TiledDeferredImageBasedLighting,
            ShaderVariant::msaa(samples),
            &reads,
            &writes,
            &buffer_writes,
            [
                rect.width.div_ceil(TILE_SIZE),
                rect.height.div_ceil(TILE_SIZE),
                1,
            ],
        );
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn dependencies(view: &RendererView) -> SmallVec<[NodeId; 4]> {
    let settings = view.settings();
    let mut deps = smallvec![
        ids::SCENE_COLOR,
        ids::GBUFFER,
        ids::SCENE_DEPTH,
        ids::LIGHT_ACCUMULATION,
        ids::INDIRECT_LIGHTING,
    ];

    if settings.screen_space_reflections.enabled {
        deps.push(ids::SSR);
    }
    if settings.ambient_occlusion.enabled {
        deps.push(ids::SSAO);
    }
    if view.num_samples() > 1 {
        deps.push(ids::MSAA_COVERAGE);
    }

    deps
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::TILED_DEFERRED_IBL,
        create: || super::RenderNode::TiledDeferredIbl(TiledDeferredIblNode::default()),
        dependencies,
    }
}
