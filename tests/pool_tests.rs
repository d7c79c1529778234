//! GPU Resource Pool Tests
//!
//! Tests for:
//! - GpuResourcePool: reuse identity, descriptor compatibility, borrow
//!   accounting, age-based pruning, the mutating get-in-place overload
//! - Interaction with the headless device (allocation/destruction counts)

use ember::gfx::{
    BufferDesc, BufferFormat, BufferUsage, HeadlessDevice, PixelFormat, TextureDesc, TextureUsage,
};
use ember::pool::GpuResourcePool;

fn color_target(width: u32, height: u32) -> TextureDesc {
    TextureDesc::d2(
        PixelFormat::Rgba16F,
        width,
        height,
        TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
    )
}

// ============================================================================
// Reuse identity
// ============================================================================

#[test]
fn released_entry_is_returned_for_an_identical_request() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let key = pool.get_texture(&mut device, &color_target(128, 128));
    let first = pool.texture(key).texture;
    pool.release_texture(key);

    let again = pool.get_texture(&mut device, &color_target(128, 128));
    assert_eq!(
        pool.texture(again).texture,
        first,
        "an identical request within the prune window must reuse, not reallocate"
    );
    assert_eq!(device.alive_textures(), 1);
}

#[test]
fn borrowed_entry_is_never_handed_out_again() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let first = pool.get_texture(&mut device, &color_target(128, 128));
    let second = pool.get_texture(&mut device, &color_target(128, 128));

    assert_ne!(
        pool.texture(first).texture,
        pool.texture(second).texture,
        "a still-borrowed entry must not satisfy a second request"
    );
    assert_eq!(device.alive_textures(), 2);
}

#[test]
fn usage_superset_entry_serves_a_narrower_request() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let key = pool.get_texture(&mut device, &color_target(64, 64));
    pool.release_texture(key);

    let narrow = TextureDesc::d2(PixelFormat::Rgba16F, 64, 64, TextureUsage::SAMPLED);
    let again = pool.get_texture(&mut device, &narrow);
    assert_eq!(pool.texture(again).texture, pool.texture(key).texture);
}

#[test]
fn sample_count_and_srgb_must_match_for_2d_entries() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let key = pool.get_texture(&mut device, &color_target(64, 64));
    pool.release_texture(key);

    let msaa = pool.get_texture(&mut device, &color_target(64, 64).with_samples(4));
    assert_ne!(pool.texture(msaa).texture, pool.texture(key).texture);

    let srgb = pool.get_texture(&mut device, &color_target(64, 64).with_srgb(true));
    assert_ne!(pool.texture(srgb).texture, pool.texture(key).texture);
    assert_eq!(device.alive_textures(), 3);
}

// ============================================================================
// Buffer compatibility
// ============================================================================

#[test]
fn standard_buffers_match_on_format_and_exact_usage() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let desc = BufferDesc::standard(BufferFormat::F16x4, 256, BufferUsage::LOAD_STORE);
    let key = pool.get_buffer(&mut device, &desc);
    pool.release_buffer(key);

    let same = pool.get_buffer(&mut device, &desc);
    assert_eq!(pool.buffer(same).buffer, pool.buffer(key).buffer);
    pool.release_buffer(same);

    // Different format: new allocation.
    let f32_desc = BufferDesc::standard(BufferFormat::F32, 256, BufferUsage::LOAD_STORE);
    let different = pool.get_buffer(&mut device, &f32_desc);
    assert_ne!(pool.buffer(different).buffer, pool.buffer(key).buffer);

    // Wider usage is not accepted for buffers; usage must match exactly.
    let wider = BufferDesc::standard(
        BufferFormat::F16x4,
        256,
        BufferUsage::LOAD_STORE | BufferUsage::COPY_DST,
    );
    let exact = pool.get_buffer(&mut device, &wider);
    assert_ne!(pool.buffer(exact).buffer, pool.buffer(key).buffer);
}

#[test]
fn structured_buffers_match_on_element_size() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let desc = BufferDesc::structured(64, 100, BufferUsage::LOAD_STORE);
    let key = pool.get_buffer(&mut device, &desc);
    pool.release_buffer(key);

    let same = pool.get_buffer(&mut device, &desc);
    assert_eq!(pool.buffer(same).buffer, pool.buffer(key).buffer);
    pool.release_buffer(same);

    let other_stride = BufferDesc::structured(32, 100, BufferUsage::LOAD_STORE);
    let different = pool.get_buffer(&mut device, &other_stride);
    assert_ne!(pool.buffer(different).buffer, pool.buffer(key).buffer);
}

// ============================================================================
// Pruning
// ============================================================================

#[test]
fn free_entry_is_pruned_once_it_ages_out() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let key = pool.get_texture(&mut device, &color_target(32, 32));
    pool.release_texture(key);
    assert_eq!(device.alive_textures(), 1);

    // update() advances the frame and prunes at age 3; the entry was last
    // used at frame 0, so the third update destroys it.
    pool.update(&mut device);
    pool.update(&mut device);
    assert_eq!(device.alive_textures(), 1, "not yet three frames idle");

    pool.update(&mut device);
    assert_eq!(device.alive_textures(), 0, "aged out after three frames");
    assert_eq!(pool.texture_count(), 0);
}

#[test]
fn borrowed_entry_survives_pruning_regardless_of_age() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let _held = pool.get_texture(&mut device, &color_target(32, 32));

    for _ in 0..10 {
        pool.update(&mut device);
    }
    assert_eq!(
        device.alive_textures(),
        1,
        "a borrowed entry must never be destroyed"
    );
}

#[test]
fn prune_with_age_zero_destroys_all_free_entries_immediately() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let a = pool.get_texture(&mut device, &color_target(32, 32));
    let held = pool.get_texture(&mut device, &color_target(64, 64));
    pool.release_texture(a);

    pool.prune(&mut device, 0);
    assert_eq!(device.alive_textures(), 1, "only the free entry is destroyed");
    assert_eq!(pool.texture(held).borrows(), 1);
}

#[test]
fn reuse_refreshes_the_age_clock() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let key = pool.get_texture(&mut device, &color_target(32, 32));
    pool.release_texture(key);

    pool.update(&mut device);
    pool.update(&mut device);

    // Touch the entry again: last-used moves to the current frame.
    let again = pool.get_texture(&mut device, &color_target(32, 32));
    pool.release_texture(again);

    pool.update(&mut device);
    pool.update(&mut device);
    assert_eq!(device.alive_textures(), 1, "age was reset by the reuse");

    pool.update(&mut device);
    assert_eq!(device.alive_textures(), 0);
}

// ============================================================================
// Mutating overload
// ============================================================================

#[test]
fn get_in_place_avoids_release_and_reacquire() {
    let mut device = HeadlessDevice::new();
    let mut pool = GpuResourcePool::new();

    let mut slot = None;
    pool.get_texture_in(&mut device, &mut slot, &color_target(32, 32));
    let key = slot.expect("slot filled");

    pool.get_texture_in(&mut device, &mut slot, &color_target(32, 32));
    assert_eq!(slot, Some(key));
    assert_eq!(pool.texture(key).borrows(), 1, "still exactly one borrow");

    // A mismatching descriptor swaps the held entry.
    pool.get_texture_in(&mut device, &mut slot, &color_target(64, 64));
    assert_ne!(slot, Some(key));
    assert_eq!(pool.texture(key).borrows(), 0, "old entry went back to the pool");
}
