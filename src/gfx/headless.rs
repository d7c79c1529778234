//! Headless recording device.
//!
//! Backs the test suite: resource creation hands out ids and tracks liveness,
//! and every submitted command list is retained for inspection. This is how
//! the scheduling invariants (render order, release timing, pooled reuse) are
//! verified without a GPU.

use rustc_hash::FxHashMap;

use super::buffer::BufferDesc;
use super::command::RenderCommand;
use super::device::{BufferId, RenderDevice, TextureId};
use super::texture::TextureDesc;

/// A [`RenderDevice`] that records instead of rendering.
#[derive(Default)]
pub struct HeadlessDevice {
    next_id: u64,
    textures: FxHashMap<TextureId, TextureDesc>,
    buffers: FxHashMap<BufferId, BufferDesc>,
    submissions: Vec<Vec<RenderCommand>>,
    texture_uploads: u32,
    buffer_writes: u32,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently alive textures.
    #[must_use]
    pub fn alive_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of currently alive buffers.
    #[must_use]
    pub fn alive_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Descriptor of an alive texture, if it exists.
    #[must_use]
    pub fn texture_desc(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&id)
    }

    /// All submitted command lists, oldest first.
    #[must_use]
    pub fn submissions(&self) -> &[Vec<RenderCommand>] {
        &self.submissions
    }

    /// All submitted commands flattened into one stream.
    pub fn all_commands(&self) -> impl Iterator<Item = &RenderCommand> {
        self.submissions.iter().flatten()
    }

    /// Total draws (scene + full-screen) across all submissions.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.all_commands()
            .filter(|c| {
                matches!(
                    c,
                    RenderCommand::Draw { .. } | RenderCommand::DrawFullscreen { .. }
                )
            })
            .count()
    }

    /// Total compute dispatches across all submissions.
    #[must_use]
    pub fn dispatch_count(&self) -> usize {
        self.all_commands()
            .filter(|c| matches!(c, RenderCommand::Dispatch { .. }))
            .count()
    }

    /// Number of CPU texture uploads performed.
    #[must_use]
    pub fn texture_upload_count(&self) -> u32 {
        self.texture_uploads
    }

    /// Drops all recorded submissions (keeps resources alive).
    pub fn clear_submissions(&mut self) {
        self.submissions.clear();
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_texture(&mut self, desc: &TextureDesc, _label: &'static str) -> TextureId {
        let id = TextureId(self.next());
        self.textures.insert(id, *desc);
        id
    }

    fn upload_texture(&mut self, texture: TextureId, _data: &[u8]) {
        debug_assert!(self.textures.contains_key(&texture), "upload to dead texture");
        self.texture_uploads += 1;
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        let existed = self.textures.remove(&texture).is_some();
        debug_assert!(existed, "double destroy of texture {texture:?}");
    }

    fn create_buffer(&mut self, desc: &BufferDesc, _label: &'static str) -> BufferId {
        let id = BufferId(self.next());
        self.buffers.insert(id, *desc);
        id
    }

    fn write_buffer(&mut self, buffer: BufferId, _data: &[u8]) {
        debug_assert!(self.buffers.contains_key(&buffer), "write to dead buffer");
        self.buffer_writes += 1;
    }

    fn zero_buffer(&mut self, buffer: BufferId) {
        debug_assert!(self.buffers.contains_key(&buffer), "zero of dead buffer");
        self.buffer_writes += 1;
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        let existed = self.buffers.remove(&buffer).is_some();
        debug_assert!(existed, "double destroy of buffer {buffer:?}");
    }

    fn submit(&mut self, commands: Vec<RenderCommand>) {
        self.submissions.push(commands);
    }
}
