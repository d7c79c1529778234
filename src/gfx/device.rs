//! The device trait implemented by graphics backends.

use super::buffer::BufferDesc;
use super::command::RenderCommand;
use super::texture::TextureDesc;

/// Opaque handle to a backend texture.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureId(pub u64);

/// Opaque handle to a backend buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferId(pub u64);

/// Abstract graphics device.
///
/// Everything the compositor, pool and nodes need from the GPU goes through
/// this trait, which keeps the scheduling core testable without a graphics
/// adapter. All methods are infallible by contract: an allocation failure in
/// the backing API is unrecoverable for a real-time renderer and backends
/// panic rather than limp along.
///
/// Implementations are *not* required to be thread-safe. The renderer core
/// only ever calls a device from the render thread; that single-threaded
/// discipline is a design precondition, not an accident.
pub trait RenderDevice {
    /// Creates a texture. The label is used for debug tooling only.
    fn create_texture(&mut self, desc: &TextureDesc, label: &'static str) -> TextureId;

    /// Uploads CPU data into mip 0 of a texture. For cube maps, `data` holds
    /// all six faces contiguously.
    fn upload_texture(&mut self, texture: TextureId, data: &[u8]);

    /// Destroys a texture. Safe to call with in-flight GPU work; backends
    /// defer the actual release.
    fn destroy_texture(&mut self, texture: TextureId);

    /// Creates a buffer.
    fn create_buffer(&mut self, desc: &BufferDesc, label: &'static str) -> BufferId;

    /// Writes CPU data into a buffer starting at offset 0.
    fn write_buffer(&mut self, buffer: BufferId, data: &[u8]);

    /// Fills an entire buffer with zeroes.
    fn zero_buffer(&mut self, buffer: BufferId);

    /// Destroys a buffer.
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Submits a recorded command list. Fire-and-forget: the call queues the
    /// work and returns without waiting for the GPU.
    fn submit(&mut self, commands: Vec<RenderCommand>);
}
