//! Render views.
//!
//! A [`RendererView`] is the per-camera snapshot for one frame: transforms,
//! viewport, render settings, visibility results and a per-view GPU uniform
//! buffer. Every rendering task is expressed as a view — the main camera, a
//! cubemap capture face, an editor preview — and a [`RendererViewGroup`]
//! collects the views that share one frame so light visibility can be
//! computed once for all of them.
//!
//! Views are created or refreshed once per frame per camera and are
//! render-thread-owned, immutable for the duration of a compositor
//! execution.

mod settings;

pub use settings::{
    AmbientOcclusionSettings, AutoExposureSettings, DepthOfFieldSettings, RenderSettings,
    ScreenSpaceReflectionsSettings, StateReductionMode,
};

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

use crate::gfx::{
    BufferDesc, BufferId, BufferUsage, RenderDevice, TextureId,
};
use crate::scene::{LightType, SceneInfo, Sphere};

// ─── Frustum ──────────────────────────────────────────────────────────────────

/// View frustum as six inward-facing planes, extracted from a
/// view-projection matrix.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts the frustum planes from a view-projection matrix
    /// (Gribb-Hartmann).
    #[must_use]
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let r0 = vp.row(0);
        let r1 = vp.row(1);
        let r2 = vp.row(2);
        let r3 = vp.row(3);

        let mut planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r2,      // near (0..1 depth range)
            r3 - r2, // far
        ];

        for plane in &mut planes {
            let len = plane.xyz().length();
            if len > f32::EPSILON {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Whether a bounding sphere intersects the frustum.
    #[must_use]
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes.iter().all(|plane| {
            plane.xyz().dot(sphere.center) + plane.w >= -sphere.radius
        })
    }
}

// ─── View identity & target ──────────────────────────────────────────────────

/// Stable identity of a view across frames (usually the owning camera).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ViewId(pub u64);

/// Pixel-space viewport rectangle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ViewRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ViewRect {
    #[must_use]
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Where a view's final output goes.
#[derive(Clone, Copy, Debug)]
pub struct ViewTarget {
    /// Output texture; `None` means the swap chain (bound externally).
    pub target: Option<TextureId>,
    /// Normalized sub-rect of the target this view writes to.
    pub nrm_view_rect: [f32; 4],
    /// Flip the image vertically during the final blit (API convention
    /// differences between backends).
    pub flip: bool,
    /// Encode linear depth into the output alpha channel after the blit.
    pub encode_depth: bool,
    pub depth_encode_near: f32,
    pub depth_encode_far: f32,
}

impl Default for ViewTarget {
    fn default() -> Self {
        Self {
            target: None,
            nrm_view_rect: [0.0, 0.0, 1.0, 1.0],
            flip: false,
            encode_depth: false,
            depth_encode_near: 0.0,
            depth_encode_far: 0.0,
        }
    }
}

/// Construction parameters for a view.
#[derive(Clone, Debug)]
pub struct ViewDesc {
    pub id: ViewId,
    pub view: Mat4,
    pub projection: Mat4,
    pub origin: Vec3,
    pub view_rect: ViewRect,
    pub target: ViewTarget,
    pub settings: RenderSettings,
    /// Background clear color used by the skybox fallback.
    pub clear_color: [f32; 4],
    /// Temporary views (cubemap captures) drop their cached compositor state
    /// after the frame instead of keeping it for reuse.
    pub transient: bool,
}

impl Default for ViewDesc {
    fn default() -> Self {
        Self {
            id: ViewId(0),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            origin: Vec3::ZERO,
            view_rect: ViewRect::new(0, 0, 1280, 720),
            target: ViewTarget::default(),
            settings: RenderSettings::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            transient: false,
        }
    }
}

// ─── Visibility & queues ──────────────────────────────────────────────────────

/// Per-view visibility bitsets, indexed by scene array position.
#[derive(Clone, Debug, Default)]
pub struct VisibilityInfo {
    pub renderables: Vec<bool>,
    pub lights: Vec<bool>,
    pub particle_systems: Vec<bool>,
}

/// One entry in a sorted render queue.
#[derive(Clone, Copy, Debug)]
pub struct RenderQueueElement {
    /// Index into `SceneInfo::renderables`.
    pub renderable: usize,
    /// View-space distance used for distance sorts.
    pub distance: f32,
}

/// GPU-layout per-view uniform block.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewUniformData {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    /// World-space view origin; w is padding.
    pub origin: [f32; 4],
    /// x, y, width, height in pixels.
    pub viewport: [f32; 4],
}

// ─── RendererView ─────────────────────────────────────────────────────────────

/// Per-camera snapshot for one frame.
pub struct RendererView {
    desc: ViewDesc,
    view_projection: Mat4,
    frustum: Frustum,
    settings_hash: u64,
    visibility: VisibilityInfo,
    opaque_queue: Vec<RenderQueueElement>,
    transparent_queue: Vec<RenderQueueElement>,
    per_view_buffer: Option<BufferId>,
}

impl RendererView {
    /// Creates a view from a descriptor.
    #[must_use]
    pub fn new(desc: ViewDesc) -> Self {
        let view_projection = desc.projection * desc.view;
        let frustum = Frustum::from_view_projection(&view_projection);
        let settings_hash = desc.settings.content_hash();
        Self {
            desc,
            view_projection,
            frustum,
            settings_hash,
            visibility: VisibilityInfo::default(),
            opaque_queue: Vec::new(),
            transparent_queue: Vec::new(),
            per_view_buffer: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ViewId {
        self.desc.id
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.desc.settings
    }

    /// Hash of the current settings; compared by the driver to decide when
    /// the cached compositor must be rebuilt.
    #[inline]
    #[must_use]
    pub fn settings_hash(&self) -> u64 {
        self.settings_hash
    }

    #[inline]
    #[must_use]
    pub fn view_rect(&self) -> ViewRect {
        self.desc.view_rect
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> &ViewTarget {
        &self.desc.target
    }

    #[inline]
    #[must_use]
    pub fn clear_color(&self) -> [f32; 4] {
        self.desc.clear_color
    }

    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.desc.transient
    }

    /// Effective MSAA sample count for this view.
    #[inline]
    #[must_use]
    pub fn num_samples(&self) -> u32 {
        self.desc.settings.num_samples.max(1)
    }

    /// Whether the post-process chain runs for this view.
    #[inline]
    #[must_use]
    pub fn run_post_processing(&self) -> bool {
        self.desc.settings.run_post_processing()
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    #[inline]
    #[must_use]
    pub fn visibility(&self) -> &VisibilityInfo {
        &self.visibility
    }

    /// Sorted queue of visible opaque renderables.
    #[inline]
    #[must_use]
    pub fn opaque_queue(&self) -> &[RenderQueueElement] {
        &self.opaque_queue
    }

    /// Back-to-front queue of visible transparent renderables.
    #[inline]
    #[must_use]
    pub fn transparent_queue(&self) -> &[RenderQueueElement] {
        &self.transparent_queue
    }

    /// The per-view GPU parameter buffer, if it has been uploaded.
    #[inline]
    #[must_use]
    pub fn per_view_buffer(&self) -> Option<BufferId> {
        self.per_view_buffer
    }

    /// Replaces the settings and recomputes the structural hash.
    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings_hash = settings.content_hash();
        self.desc.settings = settings;
    }

    /// Refreshes transforms for a new frame.
    pub fn set_transforms(&mut self, view: Mat4, projection: Mat4, origin: Vec3) {
        self.desc.view = view;
        self.desc.projection = projection;
        self.desc.origin = origin;
        self.view_projection = projection * view;
        self.frustum = Frustum::from_view_projection(&self.view_projection);
    }

    /// Culls the scene against this view's frustum and rebuilds the render
    /// queues.
    pub fn determine_visibility(&mut self, scene: &SceneInfo) {
        self.visibility.renderables.clear();
        self.visibility.lights.clear();
        self.visibility.particle_systems.clear();
        self.opaque_queue.clear();
        self.transparent_queue.clear();

        for (index, renderable) in scene.renderables.iter().enumerate() {
            let visible = self.frustum.intersects_sphere(&renderable.bounds);
            self.visibility.renderables.push(visible);
            if !visible {
                continue;
            }

            let distance = (renderable.bounds.center - self.desc.origin).length();
            let element = RenderQueueElement {
                renderable: index,
                distance,
            };
            if renderable.transparent {
                self.transparent_queue.push(element);
            } else {
                self.opaque_queue.push(element);
            }
        }

        for light in &scene.lights {
            // Directional lights always affect the whole view.
            let visible = light.light_type == LightType::Directional
                || self.frustum.intersects_sphere(&light.bounds);
            self.visibility.lights.push(visible);
        }

        for particles in &scene.particle_systems {
            self.visibility
                .particle_systems
                .push(self.frustum.intersects_sphere(&particles.bounds));
        }

        self.sort_queues(scene);
    }

    fn sort_queues(&mut self, scene: &SceneInfo) {
        match self.desc.settings.state_reduction_mode {
            StateReductionMode::None => {}
            StateReductionMode::Material => {
                self.opaque_queue.sort_by_key(|element| {
                    scene.renderables[element.renderable].material.0
                });
            }
            StateReductionMode::Distance => {
                self.opaque_queue
                    .sort_by(|a, b| a.distance.total_cmp(&b.distance));
            }
        }

        // Transparents always draw back-to-front regardless of the state
        // reduction mode.
        self.transparent_queue
            .sort_by(|a, b| b.distance.total_cmp(&a.distance));
    }

    /// Uploads the per-view uniform block, creating the buffer on first use.
    pub fn update_per_view_buffer(&mut self, device: &mut dyn RenderDevice) {
        let data = ViewUniformData {
            view: self.desc.view.to_cols_array_2d(),
            projection: self.desc.projection.to_cols_array_2d(),
            view_projection: self.view_projection.to_cols_array_2d(),
            origin: [
                self.desc.origin.x,
                self.desc.origin.y,
                self.desc.origin.z,
                0.0,
            ],
            viewport: [
                self.desc.view_rect.x as f32,
                self.desc.view_rect.y as f32,
                self.desc.view_rect.width as f32,
                self.desc.view_rect.height as f32,
            ],
        };

        let buffer = *self.per_view_buffer.get_or_insert_with(|| {
            device.create_buffer(
                &BufferDesc::structured(
                    std::mem::size_of::<ViewUniformData>() as u32,
                    1,
                    BufferUsage::SAMPLED | BufferUsage::COPY_DST,
                ),
                "Per-View Params",
            )
        });
        device.write_buffer(buffer, bytemuck::bytes_of(&data));
    }

    /// Destroys the per-view GPU buffer. Called when the owning camera goes
    /// away or a transient view is retired.
    pub fn destroy_gpu_state(&mut self, device: &mut dyn RenderDevice) {
        if let Some(buffer) = self.per_view_buffer.take() {
            device.destroy_buffer(buffer);
        }
    }
}

// ─── View group ───────────────────────────────────────────────────────────────

/// Lights visible to at least one view in a group, bucketed by type with
/// unshadowed entries ordered before shadowed ones.
#[derive(Clone, Debug, Default)]
pub struct VisibleLightData {
    by_type: [Vec<usize>; LightType::COUNT],
    shadowed_counts: [usize; LightType::COUNT],
}

impl VisibleLightData {
    /// Rebuilds the buckets from per-view visibility.
    pub fn gather(&mut self, scene: &SceneInfo, views: &[RendererView]) {
        for bucket in &mut self.by_type {
            bucket.clear();
        }
        self.shadowed_counts = [0; LightType::COUNT];

        for (index, light) in scene.lights.iter().enumerate() {
            let visible = views
                .iter()
                .any(|view| view.visibility().lights.get(index).copied().unwrap_or(false));
            if !visible {
                continue;
            }
            self.by_type[light.light_type.index()].push(index);
        }

        // Unshadowed lights first: tiled deferred consumes a prefix, standard
        // deferred the suffix.
        for (type_index, bucket) in self.by_type.iter_mut().enumerate() {
            bucket.sort_by_key(|&light| scene.lights[light].casts_shadows);
            self.shadowed_counts[type_index] = bucket
                .iter()
                .filter(|&&light| scene.lights[light].casts_shadows)
                .count();
        }
    }

    /// Visible light indices of one type (unshadowed first).
    #[must_use]
    pub fn lights(&self, light_type: LightType) -> &[usize] {
        &self.by_type[light_type.index()]
    }

    #[must_use]
    pub fn num_shadowed(&self, light_type: LightType) -> usize {
        self.shadowed_counts[light_type.index()]
    }

    #[must_use]
    pub fn num_unshadowed(&self, light_type: LightType) -> usize {
        self.lights(light_type).len() - self.num_shadowed(light_type)
    }

    /// Visible shadowed light indices of one type.
    #[must_use]
    pub fn shadowed_lights(&self, light_type: LightType) -> &[usize] {
        let bucket = self.lights(light_type);
        &bucket[bucket.len() - self.num_shadowed(light_type)..]
    }
}

/// The set of views rendered together in one frame.
///
/// Grouping exists so shadow maps and light-probe work can be batched across
/// views instead of redone per view.
#[derive(Default)]
pub struct RendererViewGroup {
    views: Vec<RendererView>,
    visible_lights: VisibleLightData,
    visible_probes: Vec<bool>,
}

impl RendererViewGroup {
    #[must_use]
    pub fn new(views: Vec<RendererView>) -> Self {
        Self {
            views,
            visible_lights: VisibleLightData::default(),
            visible_probes: Vec::new(),
        }
    }

    #[must_use]
    pub fn views(&self) -> &[RendererView] {
        &self.views
    }

    pub fn views_mut(&mut self) -> &mut Vec<RendererView> {
        &mut self.views
    }

    #[must_use]
    pub fn visible_light_data(&self) -> &VisibleLightData {
        &self.visible_lights
    }

    /// Reflection probes visible to at least one view.
    #[must_use]
    pub fn visible_probes(&self) -> &[bool] {
        &self.visible_probes
    }

    /// Computes visibility for every view, then aggregates group-level light
    /// and probe visibility. Called once per frame before any compositor
    /// executes.
    pub fn determine_visibility(&mut self, scene: &SceneInfo) {
        for view in &mut self.views {
            view.determine_visibility(scene);
        }

        self.visible_lights.gather(scene, &self.views);

        self.visible_probes.clear();
        for probe in &scene.reflection_probes {
            let visible = self
                .views
                .iter()
                .any(|view| view.frustum().intersects_sphere(&probe.bounds));
            self.visible_probes.push(visible);
        }
    }
}
