//! Post-process ping-pong helper node.

use std::cell::Cell;

use smallvec::SmallVec;

use super::ids;
use crate::gfx::{PixelFormat, RenderDevice, TextureDesc, TextureUsage};
use crate::graph::context::{ClearContext, NodeContext};
use crate::graph::registry::NodeType;
use crate::graph::NodeId;
use crate::pool::{GpuResourcePool, TextureKey};
use crate::view::RendererView;

/// Owns the pair of LDR targets the post-process chain ping-pongs between.
/// Performs no rendering itself; effect nodes call
/// [`get_and_switch`](Self::get_and_switch) to obtain their output target
/// and the previous effect's result.
///
/// State lives in `Cell`s because callers reach this node through a shared
/// input reference; the compositor still guarantees single-threaded access.
///
/// Inputs: none.
#[derive(Default)]
pub struct PostProcessNode {
    outputs: [Cell<Option<TextureKey>>; 2],
    current: Cell<usize>,
}

impl PostProcessNode {
    /// Returns the texture the calling effect should render into and the
    /// previous effect's output, then flips, so consecutive callers
    /// alternate between the two targets. Targets are allocated lazily on
    /// first use.
    pub fn get_and_switch(
        &self,
        device: &mut dyn RenderDevice,
        pool: &mut GpuResourcePool,
        view: &RendererView,
    ) -> (TextureKey, Option<TextureKey>) {
        let rect = view.view_rect();
        let current = self.current.get();

        let output = match self.outputs[current].get() {
            Some(key) => key,
            None => {
                let key = pool.get_texture(
                    device,
                    &TextureDesc::d2(
                        PixelFormat::Rgba8,
                        rect.width,
                        rect.height,
                        TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                    ),
                );
                self.outputs[current].set(Some(key));
                key
            }
        };

        let other = (current + 1) % 2;
        let last_frame = self.outputs[other].get();
        self.current.set(other);

        (output, last_frame)
    }

    /// The most recently written post-process output.
    #[must_use]
    pub fn last_output(&self) -> Option<TextureKey> {
        let other = (self.current.get() + 1) % 2;
        self.outputs[other].get()
    }

    pub fn render(&mut self, _ctx: &mut NodeContext<'_, '_>) {
        // Helper node; allocation happens on demand in get_and_switch.
    }

    pub fn clear(&mut self, ctx: &mut ClearContext<'_>) {
        for slot in &self.outputs {
            if let Some(key) = slot.take() {
                ctx.pool.release_texture(key);
            }
        }
        self.current.set(0);
    }
}

fn dependencies(_view: &RendererView) -> SmallVec<[NodeId; 4]> {
    SmallVec::new()
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        id: ids::POST_PROCESS,
        create: || super::RenderNode::PostProcess(PostProcessNode::default()),
        dependencies,
    }
}
