//! Top-level renderer driver.
//!
//! Owns the device, the resource pool, the static textures and the per-view
//! compositor cache, and drives the per-frame sequence:
//!
//! 1. (external) simulation → render hand-off completes; the scene snapshot
//!    and views are now render-thread-owned and immutable for the frame
//! 2. visibility for every view in the group
//! 3. per view: rebuild the cached compositor if its settings hash changed,
//!    then execute it and submit the recorded commands
//! 4. advance the resource pool — exactly once per frame
//!
//! Everything here runs on the render thread; nothing locks.

use rustc_hash::FxHashMap;

use crate::extensions::{ExtensionRegistry, ExtensionStage, RendererExtension};
use crate::gfx::{CommandEncoder, RenderDevice};
use crate::graph::nodes::ids;
use crate::graph::{
    ExecuteInputs, FrameTiming, NodeRegistry, RenderCompositor, ViewPersistentState,
};
use crate::pool::GpuResourcePool;
use crate::scene::SceneInfo;
use crate::textures::RendererTextures;
use crate::view::{RendererViewGroup, ViewId};

/// Cached per-view compositor state.
struct ViewState {
    compositor: RenderCompositor,
    persistent: ViewPersistentState,
    /// Settings hash the compositor was last built against.
    built_hash: Option<u64>,
    /// Frame index this view was last rendered; stale entries are retired.
    last_seen: u64,
}

impl ViewState {
    fn new() -> Self {
        Self {
            compositor: RenderCompositor::new(),
            persistent: ViewPersistentState::default(),
            built_hash: None,
            last_seen: 0,
        }
    }
}

/// The renderer core: frame-graph scheduling plus pooled GPU resources,
/// generic over the graphics backend.
pub struct Renderer<D: RenderDevice> {
    device: D,
    pool: GpuResourcePool,
    textures: RendererTextures,
    registry: NodeRegistry,
    extensions: ExtensionRegistry,
    view_states: FxHashMap<ViewId, ViewState>,
}

impl<D: RenderDevice> Renderer<D> {
    /// Creates the renderer, generating the static lookup textures.
    #[must_use]
    pub fn new(mut device: D) -> Self {
        let textures = RendererTextures::generate(&mut device);
        Self {
            device,
            pool: GpuResourcePool::new(),
            textures,
            registry: NodeRegistry::with_builtin_nodes(),
            extensions: ExtensionRegistry::new(),
            view_states: FxHashMap::default(),
        }
    }

    /// Registers a renderer extension.
    pub fn add_extension(&mut self, extension: Box<dyn RendererExtension>) {
        self.extensions.add(extension);
    }

    /// The graphics backend.
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The pooled resource allocator.
    #[must_use]
    pub fn pool(&self) -> &GpuResourcePool {
        &self.pool
    }

    /// The node type registry. Custom node types register here before the
    /// first frame that uses them.
    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    /// The cached compositor for a view, if one exists.
    #[must_use]
    pub fn compositor(&self, view: ViewId) -> Option<&RenderCompositor> {
        self.view_states.get(&view).map(|state| &state.compositor)
    }

    /// Renders one frame: visibility, then every view in the group in
    /// order, then the pool frame advance.
    pub fn render_frame(
        &mut self,
        scene: &SceneInfo,
        views: &mut RendererViewGroup,
        frame: FrameTiming,
    ) {
        views.determine_visibility(scene);

        for view in views.views_mut() {
            view.update_per_view_buffer(&mut self.device);
        }

        for index in 0..views.views().len() {
            let view = &views.views()[index];
            let view_id = view.id();
            let settings_hash = view.settings_hash();

            let state = self
                .view_states
                .entry(view_id)
                .or_insert_with(ViewState::new);
            state.last_seen = frame.frame_index;

            if state.built_hash != Some(settings_hash) {
                // Build failures are logged by the compositor; the view
                // then renders nothing until a later rebuild succeeds.
                let _ = state
                    .compositor
                    .build(&self.registry, view, ids::FINAL_RESOLVE);
                state.built_hash = Some(settings_hash);
            }

            let mut encoder = CommandEncoder::new();
            self.extensions
                .invoke(ExtensionStage::Prepare, view, &mut encoder);

            state.compositor.execute(&mut ExecuteInputs {
                device: &mut self.device,
                pool: &mut self.pool,
                encoder: &mut encoder,
                view,
                view_group: views,
                scene,
                textures: &self.textures,
                frame: &frame,
                extensions: &mut self.extensions,
                persistent: &mut state.persistent,
            });

            self.device.submit(encoder.finish());
        }

        self.retire_stale_views(views, frame.frame_index);

        // Exactly once per rendered frame.
        self.pool.update(&mut self.device);
    }

    /// Drops cached state for views that no longer exist (camera destroyed)
    /// and for transient views (cubemap captures), releasing anything their
    /// persistent context still borrows from the pool.
    fn retire_stale_views(&mut self, views: &RendererViewGroup, frame_index: u64) {
        let transient: Vec<ViewId> = views
            .views()
            .iter()
            .filter(|view| view.is_transient())
            .map(|view| view.id())
            .collect();

        let stale: Vec<ViewId> = self
            .view_states
            .iter()
            .filter(|(id, state)| state.last_seen != frame_index || transient.contains(id))
            .map(|(id, _)| *id)
            .collect();

        for id in stale {
            if let Some(mut state) = self.view_states.remove(&id) {
                state.persistent.release(&mut self.pool);
            }
        }
    }
}
