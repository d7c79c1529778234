//! FXAA post-process node.

use smallvec::{smallvec, SmallVec};

use super::ids;
use crate::gfx::{BuiltinMaterial, ShaderVariant};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::view::RendererView;

/// Fast approximate anti-aliasing over the LDR post-process chain.
///
/// Inputs: `[0]` GaussianDOF (ordering only), `[1]` PostProcess.
#[derive(Default)]
pub struct FxaaNode;

impl FxaaNode {
    pub fn render(&mut self, ctx: &mut NodeContext<'_, '_>) {
        if !ctx.view.settings().enable_fxaa {
            return;
        }

        let post_process = ctx.inputs[1]
            .as_post_process()
            .expect("FXAA input 1 must be PostProcess");

        let (output, last) = post_process.get_and_switch(ctx.device, ctx.pool, ctx.view);
        let Some(last) = last.map(|key| ctx.pool.texture(key).texture) else {
            return;
        };
        let output_tex = ctx.pool.texture(output).texture;

        ctx.encoder.set_render_target([output_tex], None, false);
        ctx.encoder
            .draw_fullscreen(BuiltinMaterial::Fxaa, ShaderVariant::default(), &[last]);
    }

    pub fn clear(&mut self, _ctx: &mut ClearContext<'_>) {}
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    smallvec![ids::GAUSSIAN_DOF, ids::POST_PROCESS]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::FXAA,
        create: || super::RenderNode::Fxaa(FxaaNode),
        dependencies,
    }
}
