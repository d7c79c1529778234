//! Compositor build/execute benchmarks against the headless device.
//!
//! Build cost matters because feature toggles rebuild the graph at runtime;
//! execute cost is the per-frame floor of the whole renderer core.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use ember::extensions::ExtensionRegistry;
use ember::gfx::{CommandEncoder, HeadlessDevice};
use ember::graph::nodes::ids;
use ember::graph::{ExecuteInputs, FrameTiming, NodeRegistry, RenderCompositor, ViewPersistentState};
use ember::pool::GpuResourcePool;
use ember::scene::SceneInfo;
use ember::textures::RendererTextures;
use ember::view::{RenderSettings, RendererView, RendererViewGroup, ViewDesc, ViewRect};

fn bench_view() -> RendererView {
    RendererView::new(ViewDesc {
        view_rect: ViewRect::new(0, 0, 1920, 1080),
        settings: RenderSettings::default(),
        ..ViewDesc::default()
    })
}

fn compositor_build(c: &mut Criterion) {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = bench_view();

    c.bench_function("compositor_build", |b| {
        b.iter(|| {
            let mut compositor = RenderCompositor::new();
            compositor
                .build(&registry, black_box(&view), ids::FINAL_RESOLVE)
                .expect("build");
            black_box(compositor.node_count())
        });
    });
}

fn compositor_execute(c: &mut Criterion) {
    let registry = NodeRegistry::with_builtin_nodes();
    let view = bench_view();

    let mut device = HeadlessDevice::new();
    let textures = RendererTextures::generate(&mut device);
    let mut pool = GpuResourcePool::new();
    let mut extensions = ExtensionRegistry::new();
    let mut persistent = ViewPersistentState::default();
    let group = RendererViewGroup::default();
    let scene = SceneInfo::default();
    let frame = FrameTiming::default();

    let mut compositor = RenderCompositor::new();
    compositor
        .build(&registry, &view, ids::FINAL_RESOLVE)
        .expect("build");

    c.bench_function("compositor_execute", |b| {
        b.iter(|| {
            let mut encoder = CommandEncoder::new();
            compositor.execute(&mut ExecuteInputs {
                device: &mut device,
                pool: &mut pool,
                encoder: &mut encoder,
                view: &view,
                view_group: &group,
                scene: &scene,
                textures: &textures,
                frame: &frame,
                extensions: &mut extensions,
                persistent: &mut persistent,
            });
            // Keep recorded work out of the submission path; the encoder
            // itself is the measured product.
            black_box(encoder.len())
        });
    });

    // The pool still borrows the eye-adaptation history; drop it cleanly so
    // the device's debug assertions stay quiet.
    persistent.release(&mut pool);
}

criterion_group!(benches, compositor_build, compositor_execute);
criterion_main!(benches);
