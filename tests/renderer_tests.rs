//! Renderer Driver Tests
//!
//! Tests for the per-frame sequence: visibility → per-view compositor
//! execute → pool frame advance, plus compositor caching, settings-driven
//! rebuilds, and view retirement.

use glam::{Mat4, Vec3};

use ember::gfx::HeadlessDevice;
use ember::graph::nodes::ids;
use ember::graph::FrameTiming;
use ember::scene::{MaterialId, MeshId, RendererRenderable, SceneInfo, Sphere};
use ember::view::{RenderSettings, RendererView, RendererViewGroup, ViewDesc, ViewId, ViewRect};
use ember::Renderer;

// ============================================================================
// Helpers
// ============================================================================

fn test_scene() -> SceneInfo {
    let _ = env_logger::builder().is_test(true).try_init();
    let renderable = |z: f32, transparent| RendererRenderable {
        mesh: MeshId(1),
        material: MaterialId(1),
        transparent,
        casts_shadows: true,
        world: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
        bounds: Sphere::new(Vec3::new(0.0, 0.0, z), 1.0),
    };

    SceneInfo {
        renderables: vec![
            renderable(-5.0, false),
            renderable(-8.0, false),
            renderable(-6.0, true),
        ],
        ..SceneInfo::default()
    }
}

fn main_view(id: u64, settings: RenderSettings, transient: bool) -> RendererView {
    RendererView::new(ViewDesc {
        id: ViewId(id),
        view: Mat4::IDENTITY,
        projection: Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0),
        origin: Vec3::ZERO,
        view_rect: ViewRect::new(0, 0, 128, 128),
        settings,
        transient,
        ..ViewDesc::default()
    })
}

fn frame(index: u64) -> FrameTiming {
    FrameTiming {
        time: index as f32 / 60.0,
        delta_time: 1.0 / 60.0,
        frame_index: index,
    }
}

// ============================================================================
// Frame sequence
// ============================================================================

#[test]
fn a_frame_renders_visible_geometry_and_advances_the_pool() {
    let mut renderer = Renderer::new(HeadlessDevice::new());
    let scene = test_scene();
    let mut views = RendererViewGroup::new(vec![main_view(1, RenderSettings::default(), false)]);

    renderer.render_frame(&scene, &mut views, frame(1));

    assert_eq!(renderer.device().submissions().len(), 1, "one submit per view");
    assert!(
        renderer.device().draw_count() > 0,
        "visible renderables must produce draws"
    );
    assert_eq!(renderer.pool().current_frame(), 1, "pool advanced exactly once");

    renderer.render_frame(&scene, &mut views, frame(2));
    assert_eq!(renderer.pool().current_frame(), 2);
}

#[test]
fn steady_state_frames_reuse_pooled_textures() {
    let mut renderer = Renderer::new(HeadlessDevice::new());
    let scene = test_scene();
    let mut views = RendererViewGroup::new(vec![main_view(1, RenderSettings::default(), false)]);

    for index in 1..=3 {
        renderer.render_frame(&scene, &mut views, frame(index));
    }
    let alive_after_warmup = renderer.device().alive_textures();

    for index in 4..=8 {
        renderer.render_frame(&scene, &mut views, frame(index));
    }
    assert_eq!(
        renderer.device().alive_textures(),
        alive_after_warmup,
        "steady-state frames must neither allocate nor leak textures"
    );
}

// ============================================================================
// Compositor cache
// ============================================================================

#[test]
fn settings_change_forces_a_graph_rebuild() {
    let mut renderer = Renderer::new(HeadlessDevice::new());
    let scene = test_scene();
    let mut views = RendererViewGroup::new(vec![main_view(1, RenderSettings::default(), false)]);

    renderer.render_frame(&scene, &mut views, frame(1));
    let compositor = renderer.compositor(ViewId(1)).expect("cached after frame");
    assert!(compositor.index_of(ids::SSAO).is_some());

    let mut settings = RenderSettings::default();
    settings.ambient_occlusion.enabled = false;
    views.views_mut()[0].set_settings(settings);

    renderer.render_frame(&scene, &mut views, frame(2));
    let compositor = renderer.compositor(ViewId(1)).expect("still cached");
    assert!(
        compositor.index_of(ids::SSAO).is_none(),
        "disabling ambient occlusion must drop the SSAO node on rebuild"
    );
}

// ============================================================================
// View retirement
// ============================================================================

#[test]
fn transient_views_drop_their_cached_state_after_the_frame() {
    let mut renderer = Renderer::new(HeadlessDevice::new());
    let scene = test_scene();
    let mut views = RendererViewGroup::new(vec![main_view(9, RenderSettings::default(), true)]);

    renderer.render_frame(&scene, &mut views, frame(1));
    assert!(
        renderer.compositor(ViewId(9)).is_none(),
        "transient view state must not persist"
    );
    assert_eq!(
        renderer.pool().borrowed_texture_count(),
        0,
        "retirement releases the persisted eye adaptation"
    );
}

#[test]
fn removing_a_view_retires_its_state_on_the_next_frame() {
    let mut renderer = Renderer::new(HeadlessDevice::new());
    let scene = test_scene();

    let mut views = RendererViewGroup::new(vec![
        main_view(1, RenderSettings::default(), false),
        main_view(2, RenderSettings::default(), false),
    ]);
    renderer.render_frame(&scene, &mut views, frame(1));
    assert!(renderer.compositor(ViewId(2)).is_some());

    // Camera 2 was destroyed: only view 1 renders this frame.
    let mut views = RendererViewGroup::new(vec![main_view(1, RenderSettings::default(), false)]);
    renderer.render_frame(&scene, &mut views, frame(2));

    assert!(renderer.compositor(ViewId(1)).is_some());
    assert!(
        renderer.compositor(ViewId(2)).is_none(),
        "state for destroyed cameras must be retired"
    );
    assert_eq!(
        renderer.pool().borrowed_texture_count(),
        1,
        "only view 1's eye-adaptation history remains borrowed"
    );
}
