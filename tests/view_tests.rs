//! Render View Tests
//!
//! Tests for:
//! - Frustum extraction and sphere culling
//! - Visibility bitsets and render queue construction/sorting
//! - Per-view GPU parameter buffer lifecycle
//! - View group light/probe aggregation (unshadowed-before-shadowed order)

use glam::{Mat4, Vec3};

use ember::gfx::HeadlessDevice;
use ember::scene::{
    LightType, MaterialId, MeshId, ReflectionProbe, RendererLight, RendererRenderable, SceneInfo,
    Sphere,
};
use ember::view::{
    RenderSettings, RendererView, RendererViewGroup, StateReductionMode, ViewDesc, ViewId,
    ViewRect,
};

// ============================================================================
// Helpers
// ============================================================================

fn perspective_view(settings: RenderSettings) -> RendererView {
    RendererView::new(ViewDesc {
        id: ViewId(7),
        view: Mat4::IDENTITY,
        projection: Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0),
        origin: Vec3::ZERO,
        view_rect: ViewRect::new(0, 0, 256, 256),
        settings,
        ..ViewDesc::default()
    })
}

fn renderable(center: Vec3, material: u64, transparent: bool) -> RendererRenderable {
    RendererRenderable {
        mesh: MeshId(1),
        material: MaterialId(material),
        transparent,
        casts_shadows: true,
        world: Mat4::from_translation(center),
        bounds: Sphere::new(center, 1.0),
    }
}

fn light(light_type: LightType, center: Vec3, shadowed: bool) -> RendererLight {
    RendererLight {
        light_type,
        casts_shadows: shadowed,
        bounds: Sphere::new(center, 5.0),
        intensity: 1.0,
    }
}

// ============================================================================
// Frustum culling
// ============================================================================

#[test]
fn objects_in_front_are_visible_and_objects_behind_are_culled() {
    let mut view = perspective_view(RenderSettings::default());
    let scene = SceneInfo {
        renderables: vec![
            renderable(Vec3::new(0.0, 0.0, -5.0), 1, false),
            renderable(Vec3::new(0.0, 0.0, 5.0), 1, false),
            renderable(Vec3::new(0.0, 0.0, -500.0), 1, false),
        ],
        ..SceneInfo::default()
    };

    view.determine_visibility(&scene);

    let visibility = view.visibility();
    assert!(visibility.renderables[0], "in front of the camera");
    assert!(!visibility.renderables[1], "behind the camera");
    assert!(!visibility.renderables[2], "past the far plane");
    assert_eq!(view.opaque_queue().len(), 1);
}

#[test]
fn a_sphere_straddling_a_plane_counts_as_visible() {
    let mut view = perspective_view(RenderSettings::default());
    // Center slightly behind the near plane; radius reaches inside.
    let scene = SceneInfo {
        renderables: vec![renderable(Vec3::new(0.0, 0.0, 0.5), 1, false)],
        ..SceneInfo::default()
    };

    view.determine_visibility(&scene);
    assert!(view.visibility().renderables[0]);
}

#[test]
fn directional_lights_are_always_visible() {
    let mut view = perspective_view(RenderSettings::default());
    let scene = SceneInfo {
        lights: vec![
            light(LightType::Directional, Vec3::new(0.0, 0.0, 1000.0), false),
            light(LightType::Radial, Vec3::new(0.0, 0.0, 1000.0), false),
        ],
        ..SceneInfo::default()
    };

    view.determine_visibility(&scene);
    assert!(view.visibility().lights[0], "directional affects everything");
    assert!(!view.visibility().lights[1], "point light out of range");
}

// ============================================================================
// Render queues
// ============================================================================

#[test]
fn transparent_renderables_sort_back_to_front() {
    let mut view = perspective_view(RenderSettings::default());
    let scene = SceneInfo {
        renderables: vec![
            renderable(Vec3::new(0.0, 0.0, -5.0), 1, true),
            renderable(Vec3::new(0.0, 0.0, -20.0), 1, true),
            renderable(Vec3::new(0.0, 0.0, -10.0), 1, true),
        ],
        ..SceneInfo::default()
    };

    view.determine_visibility(&scene);

    let distances: Vec<f32> = view
        .transparent_queue()
        .iter()
        .map(|element| element.distance)
        .collect();
    assert_eq!(distances.len(), 3);
    assert!(
        distances.windows(2).all(|pair| pair[0] >= pair[1]),
        "farthest first: {distances:?}"
    );
}

#[test]
fn material_state_reduction_groups_draws_by_material() {
    let mut settings = RenderSettings::default();
    settings.state_reduction_mode = StateReductionMode::Material;
    let mut view = perspective_view(settings);

    let scene = SceneInfo {
        renderables: vec![
            renderable(Vec3::new(0.0, 0.0, -5.0), 3, false),
            renderable(Vec3::new(1.0, 0.0, -5.0), 1, false),
            renderable(Vec3::new(2.0, 0.0, -5.0), 3, false),
            renderable(Vec3::new(3.0, 0.0, -5.0), 2, false),
        ],
        ..SceneInfo::default()
    };

    view.determine_visibility(&scene);

    let materials: Vec<u64> = view
        .opaque_queue()
        .iter()
        .map(|element| scene.renderables[element.renderable].material.0)
        .collect();
    assert_eq!(materials, vec![1, 2, 3, 3]);
}

#[test]
fn distance_state_reduction_sorts_front_to_back() {
    let mut settings = RenderSettings::default();
    settings.state_reduction_mode = StateReductionMode::Distance;
    let mut view = perspective_view(settings);

    let scene = SceneInfo {
        renderables: vec![
            renderable(Vec3::new(0.0, 0.0, -20.0), 1, false),
            renderable(Vec3::new(0.0, 0.0, -5.0), 1, false),
            renderable(Vec3::new(0.0, 0.0, -10.0), 1, false),
        ],
        ..SceneInfo::default()
    };

    view.determine_visibility(&scene);

    let distances: Vec<f32> = view
        .opaque_queue()
        .iter()
        .map(|element| element.distance)
        .collect();
    assert!(
        distances.windows(2).all(|pair| pair[0] <= pair[1]),
        "nearest first: {distances:?}"
    );
}

// ============================================================================
// Per-view GPU buffer
// ============================================================================

#[test]
fn per_view_buffer_is_created_once_and_rewritten_per_frame() {
    let mut device = HeadlessDevice::new();
    let mut view = perspective_view(RenderSettings::default());

    assert!(view.per_view_buffer().is_none());

    view.update_per_view_buffer(&mut device);
    let buffer = view.per_view_buffer().expect("created on first update");
    assert_eq!(device.alive_buffers(), 1);

    view.update_per_view_buffer(&mut device);
    assert_eq!(view.per_view_buffer(), Some(buffer), "no reallocation");
    assert_eq!(device.alive_buffers(), 1);

    view.destroy_gpu_state(&mut device);
    assert!(view.per_view_buffer().is_none());
    assert_eq!(device.alive_buffers(), 0);
}

#[test]
fn settings_replacement_updates_the_structural_hash() {
    let mut view = perspective_view(RenderSettings::default());
    let original = view.settings_hash();

    let mut settings = RenderSettings::default();
    settings.ambient_occlusion.enabled = false;
    view.set_settings(settings);

    assert_ne!(view.settings_hash(), original);
}

// ============================================================================
// View group aggregation
// ============================================================================

#[test]
fn visible_lights_order_unshadowed_before_shadowed() {
    let scene = SceneInfo {
        lights: vec![
            light(LightType::Radial, Vec3::new(0.0, 0.0, -5.0), true),
            light(LightType::Radial, Vec3::new(0.0, 0.0, -6.0), false),
            light(LightType::Radial, Vec3::new(0.0, 0.0, -7.0), true),
            light(LightType::Radial, Vec3::new(0.0, 0.0, -500.0), true),
        ],
        ..SceneInfo::default()
    };

    let mut group = RendererViewGroup::new(vec![perspective_view(RenderSettings::default())]);
    group.determine_visibility(&scene);

    let lights = group.visible_light_data();
    assert_eq!(lights.lights(LightType::Radial).len(), 3, "one culled");
    assert_eq!(lights.num_unshadowed(LightType::Radial), 1);
    assert_eq!(lights.num_shadowed(LightType::Radial), 2);
    assert_eq!(
        lights.lights(LightType::Radial)[0],
        1,
        "the unshadowed light leads the bucket"
    );
    assert_eq!(lights.shadowed_lights(LightType::Radial), &[0, 2]);
}

#[test]
fn probe_visibility_is_the_union_across_views() {
    let scene = SceneInfo {
        reflection_probes: vec![
            ReflectionProbe {
                bounds: Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0),
                cubemap: None,
            },
            ReflectionProbe {
                bounds: Sphere::new(Vec3::new(0.0, 0.0, 500.0), 1.0),
                cubemap: None,
            },
        ],
        ..SceneInfo::default()
    };

    let mut group = RendererViewGroup::new(vec![perspective_view(RenderSettings::default())]);
    group.determine_visibility(&scene);

    assert_eq!(group.visible_probes(), &[true, false]);
}
