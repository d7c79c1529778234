//! Pooled GPU resource allocator.
//!
//! Provides transient textures and buffers for the compositor nodes. Passes
//! request a resource by descriptor, use it for (part of) a frame, and hand
//! it back; the pool prefers reusing an existing free entry over allocating.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  GpuResourcePool                     │
//! │                                                     │
//! │  textures: SlotMap<TextureKey, PooledTexture>       │
//! │  buffers:  SlotMap<BufferKey, PooledBuffer>         │
//! │                                                     │
//! │  get_texture(desc) → TextureKey   (borrows += 1)    │
//! │  release_texture(key)             (borrows -= 1)    │
//! │  update()        once per frame, prunes stale       │
//! │  prune(age)      destroys free entries idle ≥ age   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Ownership model
//!
//! Entries carry an explicit `borrows` count instead of relying on a shared
//! pointer: an entry is free exactly when `borrows == 0`, and the invariant
//! is auditable from the outside. Keys are generational (`slotmap`), so a
//! stale key can never alias a recycled slot.
//!
//! # Thread safety
//!
//! The pool is process-wide mutable state with **no** internal locking. It is
//! only ever touched from the render thread; that single-threaded discipline
//! is a design precondition of the whole core, not an optimization.

use slotmap::{SlotMap, new_key_type};

use crate::gfx::{
    BufferDesc, BufferId, BufferKind, RenderDevice, TextureDesc, TextureId, TextureKind,
};

new_key_type! {
    /// Generational handle to a pooled texture.
    pub struct TextureKey;
    /// Generational handle to a pooled buffer.
    pub struct BufferKey;
}

/// Number of idle frames after which `update()` destroys a free entry.
const DEFAULT_PRUNE_AGE: u64 = 3;

/// A pooled GPU texture plus its bookkeeping.
pub struct PooledTexture {
    /// Backend texture handle.
    pub texture: TextureId,
    /// Descriptor the texture was created with.
    pub desc: TextureDesc,
    borrows: u32,
    last_used_frame: u64,
}

impl PooledTexture {
    /// Number of outstanding borrows. Zero means only the pool owns it.
    #[inline]
    #[must_use]
    pub fn borrows(&self) -> u32 {
        self.borrows
    }

    /// Pool frame index at which this entry was last handed out.
    #[inline]
    #[must_use]
    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }
}

/// A pooled GPU buffer plus its bookkeeping.
pub struct PooledBuffer {
    /// Backend buffer handle.
    pub buffer: BufferId,
    /// Descriptor the buffer was created with.
    pub desc: BufferDesc,
    borrows: u32,
    last_used_frame: u64,
}

impl PooledBuffer {
    /// Number of outstanding borrows.
    #[inline]
    #[must_use]
    pub fn borrows(&self) -> u32 {
        self.borrows
    }
}

/// Process-wide cache of transient GPU textures and buffers.
pub struct GpuResourcePool {
    textures: SlotMap<TextureKey, PooledTexture>,
    buffers: SlotMap<BufferKey, PooledBuffer>,
    current_frame: u64,
}

impl Default for GpuResourcePool {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuResourcePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            textures: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            current_frame: 0,
        }
    }

    // ── Acquisition ────────────────────────────────────────────────────────

    /// Returns a texture matching `desc`, reusing a free pooled entry when
    /// one exists and allocating through `device` otherwise.
    ///
    /// Never fails: an allocation failure in the backend is fatal by
    /// contract, not a recoverable condition.
    pub fn get_texture(
        &mut self,
        device: &mut dyn RenderDevice,
        desc: &TextureDesc,
    ) -> TextureKey {
        let found = self
            .textures
            .iter_mut()
            .find(|(_, entry)| entry.borrows == 0 && texture_compatible(&entry.desc, desc));

        if let Some((key, entry)) = found {
            entry.borrows = 1;
            entry.last_used_frame = self.current_frame;
            return key;
        }

        let texture = device.create_texture(desc, "Pooled Texture");
        self.textures.insert(PooledTexture {
            texture,
            desc: *desc,
            borrows: 1,
            last_used_frame: self.current_frame,
        })
    }

    /// Mutating overload: when `slot` already holds a texture matching
    /// `desc`, this is a no-op (avoids a pointless release + acquire);
    /// otherwise the old texture (if any) is released and `slot` is
    /// overwritten with a fresh acquisition.
    pub fn get_texture_in(
        &mut self,
        device: &mut dyn RenderDevice,
        slot: &mut Option<TextureKey>,
        desc: &TextureDesc,
    ) {
        if let Some(key) = *slot {
            if let Some(entry) = self.textures.get_mut(key) {
                if texture_compatible(&entry.desc, desc) {
                    entry.last_used_frame = self.current_frame;
                    return;
                }
            }
            self.release_texture(key);
        }
        *slot = Some(self.get_texture(device, desc));
    }

    /// Returns a buffer matching `desc`. Same algorithm as
    /// [`get_texture`](Self::get_texture) over the buffer pool.
    pub fn get_buffer(&mut self, device: &mut dyn RenderDevice, desc: &BufferDesc) -> BufferKey {
        let found = self
            .buffers
            .iter_mut()
            .find(|(_, entry)| entry.borrows == 0 && buffer_compatible(&entry.desc, desc));

        if let Some((key, entry)) = found {
            entry.borrows = 1;
            entry.last_used_frame = self.current_frame;
            return key;
        }

        let buffer = device.create_buffer(desc, "Pooled Buffer");
        self.buffers.insert(PooledBuffer {
            buffer,
            desc: *desc,
            borrows: 1,
            last_used_frame: self.current_frame,
        })
    }

    /// Mutating overload of [`get_buffer`](Self::get_buffer); see
    /// [`get_texture_in`](Self::get_texture_in).
    pub fn get_buffer_in(
        &mut self,
        device: &mut dyn RenderDevice,
        slot: &mut Option<BufferKey>,
        desc: &BufferDesc,
    ) {
        if let Some(key) = *slot {
            if let Some(entry) = self.buffers.get_mut(key) {
                if buffer_compatible(&entry.desc, desc) {
                    entry.last_used_frame = self.current_frame;
                    return;
                }
            }
            self.release_buffer(key);
        }
        *slot = Some(self.get_buffer(device, desc));
    }

    // ── Release ────────────────────────────────────────────────────────────

    /// Hands a texture back to the pool. The entry becomes reusable once its
    /// borrow count reaches zero.
    pub fn release_texture(&mut self, key: TextureKey) {
        if let Some(entry) = self.textures.get_mut(key) {
            debug_assert!(entry.borrows > 0, "release of an unborrowed pooled texture");
            entry.borrows = entry.borrows.saturating_sub(1);
        } else {
            log::warn!("release of a stale pooled texture key");
        }
    }

    /// Hands a buffer back to the pool.
    pub fn release_buffer(&mut self, key: BufferKey) {
        if let Some(entry) = self.buffers.get_mut(key) {
            debug_assert!(entry.borrows > 0, "release of an unborrowed pooled buffer");
            entry.borrows = entry.borrows.saturating_sub(1);
        } else {
            log::warn!("release of a stale pooled buffer key");
        }
    }

    // ── Lookup ─────────────────────────────────────────────────────────────

    /// The pooled texture behind a key.
    ///
    /// # Panics
    ///
    /// Panics on a stale key; holding a key past release is a programmer
    /// error the generational arena is designed to surface.
    #[inline]
    #[must_use]
    pub fn texture(&self, key: TextureKey) -> &PooledTexture {
        &self.textures[key]
    }

    /// The pooled buffer behind a key.
    #[inline]
    #[must_use]
    pub fn buffer(&self, key: BufferKey) -> &PooledBuffer {
        &self.buffers[key]
    }

    // ── Frame boundary ─────────────────────────────────────────────────────

    /// Advances the frame counter and prunes stale entries.
    ///
    /// Called exactly once per rendered frame, by the top-level driver only.
    pub fn update(&mut self, device: &mut dyn RenderDevice) {
        self.current_frame += 1;
        self.prune(device, DEFAULT_PRUNE_AGE);
    }

    /// Destroys every free entry that has not been used for at least `age`
    /// frames. `prune(0)` releases all currently-free entries immediately.
    ///
    /// Removal does not preserve pool iteration order.
    pub fn prune(&mut self, device: &mut dyn RenderDevice, age: u64) {
        let current = self.current_frame;
        self.textures.retain(|_, entry| {
            let stale = entry.borrows == 0 && current - entry.last_used_frame >= age;
            if stale {
                device.destroy_texture(entry.texture);
            }
            !stale
        });
        self.buffers.retain(|_, entry| {
            let stale = entry.borrows == 0 && current - entry.last_used_frame >= age;
            if stale {
                device.destroy_buffer(entry.buffer);
            }
            !stale
        });
    }

    /// Current frame counter.
    #[inline]
    #[must_use]
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Total pooled textures (free and borrowed).
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Total pooled buffers (free and borrowed).
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of textures currently borrowed out of the pool. Zero between
    /// frames except for deliberately persisted resources.
    #[must_use]
    pub fn borrowed_texture_count(&self) -> usize {
        self.textures.values().filter(|t| t.borrows > 0).count()
    }

    /// Number of buffers currently borrowed out of the pool.
    #[must_use]
    pub fn borrowed_buffer_count(&self) -> usize {
        self.buffers.values().filter(|b| b.borrows > 0).count()
    }
}

// ─── Compatibility rules ──────────────────────────────────────────────────────

/// Whether an existing pooled texture can satisfy a request.
///
/// Shape and format must match exactly; usage is a superset check (an entry
/// created with more capabilities can serve a narrower request). 2D entries
/// additionally compare sample count and the gamma-correction flag, 3D
/// entries compare depth, and cube maps skip those checks.
fn texture_compatible(entry: &TextureDesc, request: &TextureDesc) -> bool {
    if entry.kind != request.kind
        || entry.width != request.width
        || entry.height != request.height
        || entry.format != request.format
        || entry.mip_count != request.mip_count
        || entry.array_size != request.array_size
        || !entry.usage.contains(request.usage)
    {
        return false;
    }

    match entry.kind {
        TextureKind::D2 => entry.samples == request.samples && entry.srgb == request.srgb,
        TextureKind::D3 => entry.depth == request.depth,
        TextureKind::Cube => true,
    }
}

/// Whether an existing pooled buffer can satisfy a request.
///
/// Standard buffers must match on format, structured buffers on element
/// size; usage must match exactly in both cases.
fn buffer_compatible(entry: &BufferDesc, request: &BufferDesc) -> bool {
    if entry.element_count != request.element_count || entry.usage != request.usage {
        return false;
    }

    match (entry.kind, request.kind) {
        (BufferKind::Standard { format: a }, BufferKind::Standard { format: b }) => a == b,
        (BufferKind::Structured { element_size: a }, BufferKind::Structured { element_size: b }) => {
            a == b
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{BufferFormat, BufferUsage, HeadlessDevice, PixelFormat, TextureUsage};

    fn rt_desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc::d2(
            PixelFormat::Rgba16F,
            width,
            height,
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        )
    }

    #[test]
    fn usage_superset_matches_for_textures() {
        let entry = rt_desc(64, 64);
        let narrower = TextureDesc::d2(PixelFormat::Rgba16F, 64, 64, TextureUsage::SAMPLED);
        assert!(texture_compatible(&entry, &narrower));
        assert!(!texture_compatible(&narrower, &entry));
    }

    #[test]
    fn d2_compares_samples_and_srgb() {
        let entry = rt_desc(64, 64);
        assert!(!texture_compatible(&entry, &rt_desc(64, 64).with_samples(4)));
        assert!(!texture_compatible(&entry, &rt_desc(64, 64).with_srgb(true)));
    }

    #[test]
    fn cube_skips_sample_and_srgb_checks() {
        let entry = TextureDesc::cube(PixelFormat::Rgba16F, 64, TextureUsage::SAMPLED);
        let request = TextureDesc::cube(PixelFormat::Rgba16F, 64, TextureUsage::SAMPLED)
            .with_srgb(true)
            .with_samples(4);
        assert!(texture_compatible(&entry, &request));
    }

    #[test]
    fn buffer_usage_must_match_exactly() {
        let entry = BufferDesc::standard(BufferFormat::F16x4, 16, BufferUsage::LOAD_STORE);
        let narrower = BufferDesc::standard(BufferFormat::F16x4, 16, BufferUsage::empty());
        assert!(!buffer_compatible(&entry, &narrower));
        assert!(buffer_compatible(&entry, &entry));
    }

    #[test]
    fn get_in_is_a_noop_for_a_matching_slot() {
        let mut device = HeadlessDevice::new();
        let mut pool = GpuResourcePool::new();

        let mut slot = None;
        pool.get_texture_in(&mut device, &mut slot, &rt_desc(32, 32));
        let first = slot.expect("slot filled");

        pool.get_texture_in(&mut device, &mut slot, &rt_desc(32, 32));
        assert_eq!(slot, Some(first), "matching request must keep the entry");
        assert_eq!(pool.texture_count(), 1);

        pool.get_texture_in(&mut device, &mut slot, &rt_desc(64, 64));
        assert_ne!(slot, Some(first), "mismatch must swap the entry");
        assert_eq!(pool.texture(first).borrows(), 0, "old entry released");
    }
}
