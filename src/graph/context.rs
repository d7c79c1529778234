//! Execution contexts handed to compositor nodes.
//!
//! [`NodeContext`] is what a node sees while rendering: the device, the
//! resource pool, the command encoder, the frame-global data, and the
//! already-rendered input nodes it declared as dependencies.
//! [`ClearContext`] is the narrower view a node gets when its resources are
//! released.
//!
//! Cross-frame state is deliberately *not* hidden inside node instances. The
//! single exception to "nodes are frame-local" — tonemapping's eye-adaptation
//! history — lives in [`ViewPersistentState`], owned by the renderer and
//! threaded through every execution, so the exception is visible in the type
//! signature instead of implicit in a field.

use crate::extensions::{ExtensionRegistry, ExtensionStage};
use crate::gfx::{CommandEncoder, RenderDevice};
use crate::graph::nodes::RenderNode;
use crate::pool::{GpuResourcePool, TextureKey};
use crate::scene::SceneInfo;
use crate::textures::RendererTextures;
use crate::view::{RendererView, RendererViewGroup};

/// Global frame timing, provided by the engine loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameTiming {
    /// Seconds since engine start.
    pub time: f32,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Per-view state that survives across frames.
///
/// Owned by the renderer, passed in and out of every `execute` call.
#[derive(Default)]
pub struct ViewPersistentState {
    /// Last frame's eye-adaptation result, consumed and replaced by the
    /// tonemapping node each frame.
    pub prev_eye_adaptation: Option<TextureKey>,
}

impl ViewPersistentState {
    /// Releases any held pooled resources. Called when the owning view goes
    /// away.
    pub fn release(&mut self, pool: &mut GpuResourcePool) {
        if let Some(key) = self.prev_eye_adaptation.take() {
            pool.release_texture(key);
        }
    }
}

/// Everything the compositor needs to run one view's graph.
pub struct ExecuteInputs<'a> {
    pub device: &'a mut dyn RenderDevice,
    pub pool: &'a mut GpuResourcePool,
    pub encoder: &'a mut CommandEncoder,
    pub view: &'a RendererView,
    pub view_group: &'a RendererViewGroup,
    pub scene: &'a SceneInfo,
    pub textures: &'a RendererTextures,
    pub frame: &'a FrameTiming,
    pub extensions: &'a mut ExtensionRegistry,
    pub persistent: &'a mut ViewPersistentState,
}

/// Context passed to a node's `render`.
///
/// `inputs` holds the node's declared dependencies in declaration order,
/// already rendered. Each node documents the exact order it expects and
/// downcasts positionally via the `RenderNode::as_*` accessors.
pub struct NodeContext<'a, 'n> {
    pub device: &'a mut dyn RenderDevice,
    pub pool: &'a mut GpuResourcePool,
    pub encoder: &'a mut CommandEncoder,
    pub view: &'a RendererView,
    pub view_group: &'a RendererViewGroup,
    pub scene: &'a SceneInfo,
    pub textures: &'a RendererTextures,
    pub frame: &'a FrameTiming,
    pub extensions: &'a mut ExtensionRegistry,
    pub persistent: &'a mut ViewPersistentState,
    pub inputs: &'a [&'n RenderNode],
}

impl NodeContext<'_, '_> {
    /// Invokes every registered extension for a stage, recording into this
    /// context's encoder.
    pub fn invoke_extensions(&mut self, stage: ExtensionStage) {
        self.extensions.invoke(stage, self.view, self.encoder);
    }
}

/// Context passed to a node's `clear`.
pub struct ClearContext<'a> {
    pub device: &'a mut dyn RenderDevice,
    pub pool: &'a mut GpuResourcePool,
    pub persistent: &'a mut ViewPersistentState,
}
