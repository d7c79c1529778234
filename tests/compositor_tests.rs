//! Render Compositor Tests
//!
//! Tests for:
//! - build(): topological ordering, shared sub-DAG collapse, data-dependent
//!   dependency lists, cycle and unknown-node rejection
//! - execute(): single render per node, resource release timing against the
//!   pool, no-op on an invalid compositor
//! - The concrete minimal-graph scenario (no MSAA / SSAO / SSR / shadows)

use smallvec::SmallVec;

use ember::extensions::ExtensionRegistry;
use ember::gfx::{CommandEncoder, HeadlessDevice, RenderCommand};
use ember::graph::nodes::{self, ids, RenderNode};
use ember::graph::{
    ExecuteInputs, FrameTiming, NodeId, NodeRegistry, NodeType, RenderCompositor,
    ViewPersistentState,
};
use ember::pool::GpuResourcePool;
use ember::scene::SceneInfo;
use ember::textures::RendererTextures;
use ember::view::{RenderSettings, RendererView, RendererViewGroup, ViewDesc, ViewRect};
use ember::EmberError;

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    device: HeadlessDevice,
    pool: GpuResourcePool,
    textures: RendererTextures,
    extensions: ExtensionRegistry,
    persistent: ViewPersistentState,
    group: RendererViewGroup,
    scene: SceneInfo,
}

impl Harness {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut device = HeadlessDevice::new();
        let textures = RendererTextures::generate(&mut device);
        Self {
            device,
            pool: GpuResourcePool::new(),
            textures,
            extensions: ExtensionRegistry::new(),
            persistent: ViewPersistentState::default(),
            group: RendererViewGroup::default(),
            scene: SceneInfo::default(),
        }
    }

    fn execute(&mut self, compositor: &mut RenderCompositor, view: &RendererView) -> CommandEncoder {
        let mut encoder = CommandEncoder::new();
        let frame = FrameTiming::default();
        compositor.execute(&mut ExecuteInputs {
            device: &mut self.device,
            pool: &mut self.pool,
            encoder: &mut encoder,
            view,
            view_group: &self.group,
            scene: &self.scene,
            textures: &self.textures,
            frame: &frame,
            extensions: &mut self.extensions,
            persistent: &mut self.persistent,
        });
        encoder
    }
}

fn view_with(settings: RenderSettings) -> RendererView {
    RendererView::new(ViewDesc {
        view_rect: ViewRect::new(0, 0, 64, 64),
        settings,
        ..ViewDesc::default()
    })
}

fn minimal_settings() -> RenderSettings {
    let mut settings = RenderSettings::default();
    settings.num_samples = 1;
    settings.enable_shadows = false;
    settings.ambient_occlusion.enabled = false;
    settings.screen_space_reflections.enabled = false;
    settings
}

fn debug_group_count(encoder: &CommandEncoder, name: &str) -> usize {
    encoder
        .commands()
        .iter()
        .filter(|command| matches!(command, RenderCommand::PushDebugGroup(n) if *n == name))
        .count()
}

// ============================================================================
// Build: ordering and collapse
// ============================================================================

#[test]
fn build_produces_a_valid_topological_order() {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = view_with(RenderSettings::default());

    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("default settings must build");

    let order: Vec<NodeId> = compositor.node_order().collect();
    for (index, id) in order.iter().enumerate() {
        let node_type = registry.get(*id).expect("built node is registered");
        for dependency in (node_type.dependencies)(&view) {
            let dep_index = compositor
                .index_of(dependency)
                .expect("dependency present in the built graph");
            assert!(
                dep_index < index,
                "{dependency} must execute before its consumer {id}"
            );
        }
    }
}

#[test]
fn shared_dependencies_register_exactly_once() {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = view_with(RenderSettings::default());

    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("build");

    // SceneDepth is a dependency of most of the graph; it must still appear
    // exactly once.
    let order: Vec<NodeId> = compositor.node_order().collect();
    let mut deduped = order.clone();
    deduped.sort_by_key(|id| id.0);
    deduped.dedup();
    assert_eq!(order.len(), deduped.len(), "no node id may repeat: {order:?}");
}

#[test]
fn minimal_settings_omit_conditional_nodes_and_keep_core_order() {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = view_with(minimal_settings());

    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("build");

    for absent in [
        ids::SSAO,
        ids::SSR,
        ids::SHADOW_MAPS,
        ids::STANDARD_DEFERRED_LIGHTING,
        ids::MSAA_COVERAGE,
        ids::UNFLATTEN_LIGHT_ACCUM,
        ids::UNFLATTEN_SCENE_COLOR,
        ids::HI_Z,
    ] {
        assert!(
            compositor.index_of(absent).is_none(),
            "{absent} must not be registered for the minimal configuration"
        );
    }

    let scene_depth = compositor.index_of(ids::SCENE_DEPTH).expect("SceneDepth");
    let gbuffer = compositor.index_of(ids::GBUFFER).expect("GBuffer");
    let scene_color = compositor.index_of(ids::SCENE_COLOR).expect("SceneColor");
    let lighting = compositor
        .index_of(ids::TILED_DEFERRED_LIGHTING)
        .expect("TiledDeferredLighting");
    let resolve = compositor
        .index_of(ids::FINAL_RESOLVE)
        .expect("FinalResolve");

    assert!(scene_depth < gbuffer);
    assert!(gbuffer < lighting);
    assert!(scene_depth < scene_color);
    assert!(scene_color < lighting);
    assert!(lighting < resolve);
    assert_eq!(resolve, compositor.node_count() - 1, "final node runs last");
}

#[test]
fn msaa_settings_pull_in_the_flatten_resolve_nodes() {
    let registry = NodeRegistry::with_builtin_nodes();
    let mut settings = RenderSettings::default();
    settings.num_samples = 4;
    let view = view_with(settings);

    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("build");

    for present in [
        ids::MSAA_COVERAGE,
        ids::UNFLATTEN_LIGHT_ACCUM,
        ids::UNFLATTEN_SCENE_COLOR,
    ] {
        assert!(
            compositor.index_of(present).is_some(),
            "{present} must be registered when MSAA is active"
        );
    }
}

#[test]
fn dependency_functions_are_pure_for_a_fixed_view() {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = view_with(RenderSettings::default());

    for id in [
        ids::SCENE_DEPTH,
        ids::GBUFFER,
        ids::SCENE_COLOR,
        ids::LIGHT_ACCUMULATION,
        ids::TILED_DEFERRED_LIGHTING,
        ids::STANDARD_DEFERRED_LIGHTING,
        ids::INDIRECT_LIGHTING,
        ids::TILED_DEFERRED_IBL,
        ids::SKYBOX,
        ids::CLUSTERED_FORWARD,
        ids::TONEMAPPING,
        ids::GAUSSIAN_DOF,
        ids::FXAA,
        ids::RESOLVED_SCENE_DEPTH,
        ids::HI_Z,
        ids::SSAO,
        ids::SSR,
        ids::FINAL_RESOLVE,
        ids::SHADOW_MAPS,
    ] {
        let node_type = registry.get(id).expect("builtin registered");
        let first = (node_type.dependencies)(&view);
        let second = (node_type.dependencies)(&view);
        assert_eq!(
            first.as_slice(),
            second.as_slice(),
            "dependency list of {id} must be stable for one view snapshot"
        );
    }
}

// ============================================================================
// Build: failure paths
// ============================================================================

#[test]
fn dependency_cycles_invalidate_the_compositor() {
    let mut registry = NodeRegistry::new();
    registry.register(NodeType {
        id: NodeId("CycleA"),
        create: || RenderNode::PostProcess(nodes::PostProcessNode::default()),
        dependencies: |_| [NodeId("CycleB")].into_iter().collect(),
    });
    registry.register(NodeType {
        id: NodeId("CycleB"),
        create: || RenderNode::PostProcess(nodes::PostProcessNode::default()),
        dependencies: |_| [NodeId("CycleA")].into_iter().collect(),
    });

    let view = view_with(RenderSettings::default());
    let mut compositor = RenderCompositor::new();
    let error = compositor
        .build(&registry, &view, NodeId("CycleA"))
        .expect_err("cycle must be rejected");
    assert!(matches!(error, EmberError::CircularDependency(_)));
    assert!(!compositor.is_valid());
    assert_eq!(compositor.node_count(), 0, "failed build leaves no nodes");

    // Execution against an invalid compositor is a silent no-op.
    let mut harness = Harness::new();
    let encoder = harness.execute(&mut compositor, &view);
    assert!(encoder.is_empty(), "invalid compositor must record nothing");
}

#[test]
fn unknown_dependency_invalidates_the_compositor() {
    let mut registry = NodeRegistry::new();
    registry.register(NodeType {
        id: NodeId("Lonely"),
        create: || RenderNode::PostProcess(nodes::PostProcessNode::default()),
        dependencies: |_| [NodeId("DoesNotExist")].into_iter().collect(),
    });

    let view = view_with(RenderSettings::default());
    let mut compositor = RenderCompositor::new();
    let error = compositor
        .build(&registry, &view, NodeId("Lonely"))
        .expect_err("unknown dependency must be rejected");
    assert!(matches!(error, EmberError::UnknownNodeType(_)));

    let error = compositor
        .build(&registry, &view, NodeId("AlsoMissing"))
        .expect_err("unknown final node must be rejected");
    assert!(matches!(error, EmberError::UnknownNodeType(_)));
}

#[test]
fn a_failed_build_recovers_on_the_next_successful_one() {
    let view = view_with(RenderSettings::default());
    let mut compositor = RenderCompositor::new();

    let mut broken = NodeRegistry::new();
    broken.register(NodeType {
        id: NodeId("Root"),
        create: || RenderNode::PostProcess(nodes::PostProcessNode::default()),
        dependencies: |_| [NodeId("Missing")].into_iter().collect(),
    });
    assert!(compositor.build(&broken, &view, NodeId("Root")).is_err());
    assert!(!compositor.is_valid());

    let registry = NodeRegistry::with_builtin_nodes();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("rebuild succeeds");
    assert!(compositor.is_valid());
    assert!(compositor.node_count() > 0);
}

// ============================================================================
// Execute: single render, release timing
// ============================================================================

#[test]
fn each_node_renders_exactly_once_per_execute() {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = view_with(RenderSettings::default());

    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("build");

    let mut harness = Harness::new();
    let encoder = harness.execute(&mut compositor, &view);

    for id in compositor.node_order() {
        assert_eq!(
            debug_group_count(&encoder, id.0),
            1,
            "{id} must render exactly once"
        );
    }
}

fn chain_registry() -> NodeRegistry {
    // A three-node chain built from real node types: A allocates a pooled
    // depth texture, B (single-sample) passes it through, C allocates the
    // same descriptor again.
    let mut registry = NodeRegistry::new();
    registry.register(NodeType {
        id: NodeId("ChainA"),
        create: || RenderNode::SceneDepth(nodes::SceneDepthNode::default()),
        dependencies: |_| SmallVec::new(),
    });
    registry.register(NodeType {
        id: NodeId("ChainB"),
        create: || RenderNode::ResolvedSceneDepth(nodes::ResolvedSceneDepthNode::default()),
        dependencies: |_| [NodeId("ChainA")].into_iter().collect(),
    });
    registry
}

#[test]
fn a_node_is_released_immediately_after_its_last_reader() {
    let mut registry = chain_registry();
    registry.register(NodeType {
        id: NodeId("ChainC"),
        create: || RenderNode::SceneDepth(nodes::SceneDepthNode::default()),
        dependencies: |_| [NodeId("ChainB")].into_iter().collect(),
    });

    let view = view_with(minimal_settings());
    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, NodeId("ChainC"))
        .expect("chain builds");

    let mut harness = Harness::new();
    harness.execute(&mut compositor, &view);

    // A's last reader is B, so A's depth texture went back to the pool
    // before C rendered; C's identical request must have reused it.
    assert_eq!(
        harness.pool.texture_count(),
        1,
        "C must reuse A's released depth texture"
    );
    assert_eq!(harness.pool.borrowed_texture_count(), 0, "all released");
}

#[test]
fn a_node_is_not_released_while_a_later_reader_remains() {
    let mut registry = chain_registry();
    // C reads both B and A: A must stay alive until after C renders.
    registry.register(NodeType {
        id: NodeId("ChainC"),
        create: || RenderNode::SceneDepth(nodes::SceneDepthNode::default()),
        dependencies: |_| [NodeId("ChainB"), NodeId("ChainA")].into_iter().collect(),
    });

    let view = view_with(minimal_settings());
    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, NodeId("ChainC"))
        .expect("chain builds");

    let mut harness = Harness::new();
    harness.execute(&mut compositor, &view);

    assert_eq!(
        harness.pool.texture_count(),
        2,
        "A was still borrowed when C allocated, forcing a second texture"
    );
    assert_eq!(harness.pool.borrowed_texture_count(), 0, "all released by the end");
}

// ============================================================================
// Execute: pooled state across frames
// ============================================================================

#[test]
fn all_pooled_resources_return_except_the_eye_adaptation_history() {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = view_with(RenderSettings::default());

    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("build");

    let mut harness = Harness::new();
    harness.execute(&mut compositor, &view);

    assert_eq!(
        harness.pool.borrowed_texture_count(),
        1,
        "only the persisted eye-adaptation value may stay borrowed"
    );
    assert_eq!(harness.pool.borrowed_buffer_count(), 0);
    assert!(harness.persistent.prev_eye_adaptation.is_some());

    // Second frame: the history is consumed and replaced, not leaked.
    harness.execute(&mut compositor, &view);
    assert_eq!(harness.pool.borrowed_texture_count(), 1);

    // Pool stabilizes: repeated frames reuse instead of growing.
    let textures_after_two = harness.pool.texture_count();
    harness.execute(&mut compositor, &view);
    harness.execute(&mut compositor, &view);
    assert_eq!(
        harness.pool.texture_count(),
        textures_after_two,
        "steady-state frames must not allocate new pooled textures"
    );
}

#[test]
fn disabling_auto_exposure_releases_the_history() {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = view_with(RenderSettings::default());

    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("build");

    let mut harness = Harness::new();
    harness.execute(&mut compositor, &view);
    assert!(harness.persistent.prev_eye_adaptation.is_some());

    let mut settings = RenderSettings::default();
    settings.enable_auto_exposure = false;
    let view = view_with(settings);
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("rebuild");

    harness.execute(&mut compositor, &view);
    assert!(harness.persistent.prev_eye_adaptation.is_none());
    assert_eq!(harness.pool.borrowed_texture_count(), 0);
}
