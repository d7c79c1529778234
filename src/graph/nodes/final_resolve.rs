//! Final resolve to the view's output target.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::extensions::ExtensionStage;
use crate::gfx::{BuiltinMaterial, ShaderVariant, TextureId};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::view::RendererView;

/// Terminal node: blits the finished image into the view's output target,
/// optionally encodes depth into the target's alpha, and triggers the
/// overlay extension callbacks.
///
/// Inputs: with post-processing `[0]` PostProcess, `[1]` FXAA (ordering
/// only); without it `[0]` SceneColor, `[1]` ClusteredForward (ordering
/// only). When depth encoding is on, ResolvedSceneDepth is appended.
#[derive(Default)]
pub struct FinalResolveNode;

impl FinalResolveNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        let input: Option<TextureId> = if ctx.view.run_post_processing() {
            let post_process = ctx.inputs[0]
                .as_post_process()
                .expect("FinalResolve input 0 must be PostProcess");
            post_process
                .last_output()
                .map(|key| ctx.pool.texture(key).texture)
        } else {
            let scene_color = ctx.inputs[0]
                .as_scene_color()
                .expect("FinalResolve input 0 must be SceneColor");
            scene_color
                .scene_color
                .map(|key| ctx.pool.texture(key).texture)
        };

        let target = ctx.view.target();
        ctx.encoder.set_render_target(
            target.target.into_iter().collect::<Vec<_>>(),
            None,
            false,
        );
        ctx.encoder.set_viewport(target.nrm_view_rect);

        if let Some(input) = input {
            ctx.encoder.blit(input, target.flip);
        }

        if target.encode_depth {
            let resolved_depth = ctx.inputs[ctx.inputs.len() - 1]
                .as_resolved_scene_depth()
                .expect("FinalResolve trailing input must be ResolvedSceneDepth");
            if let Some(depth) = resolved_depth.output {
                ctx.encoder.draw_fullscreen(
                    BuiltinMaterial::EncodeDepth,
                    ShaderVariant::default(),
                    &[ctx.pool.texture(depth).texture],
                );
            }
        }

        ctx.invoke_extensions(ExtensionStage::Overlay);
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn dependencies(view: &RendererView) -> SmallVec<[NodeId; 4]> {
    let mut deps: SmallVec<[NodeId; 4]> = if view.run_post_processing() {
        smallvec![ids::POST_PROCESS, ids::FXAA]
    } else {
        smallvec![ids::SCENE_COLOR, ids::CLUSTERED_FORWARD]
    };

    if view.target().encode_depth {
        deps.push(ids::RESOLVED_SCENE_DEPTH);
    }

    deps
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::FINAL_RESOLVE,
        create: || super::RenderNode::FinalResolve(FinalResolveNode),
        dependencies,
    }
}
