//! Texture descriptors.
//!
//! [`TextureDesc`] is the semantic key the resource pool matches on, so the
//! fields here define what "compatible" means for pooled reuse (see
//! `pool::GpuResourcePool`).

use bitflags::bitflags;

use super::format::PixelFormat;

bitflags! {
    /// How a texture may be bound.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct TextureUsage: u32 {
        /// Sampled from shaders.
        const SAMPLED = 1 << 0;
        /// Bound as a color render target.
        const RENDER_TARGET = 1 << 1;
        /// Bound as a depth-stencil target.
        const DEPTH_STENCIL = 1 << 2;
        /// Random-access read/write from compute (storage texture).
        const LOAD_STORE = 1 << 3;
        /// Source of a copy/blit.
        const COPY_SRC = 1 << 4;
        /// Destination of a copy/upload.
        const COPY_DST = 1 << 5;
    }
}

/// Dimensionality of a texture.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureKind {
    /// Two-dimensional texture (the common case).
    D2,
    /// Volume texture.
    D3,
    /// Cube map (six faces).
    Cube,
}

/// Full description of a texture's shape, format and usage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureDesc {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    /// Depth for [`TextureKind::D3`]; 1 otherwise.
    pub depth: u32,
    pub format: PixelFormat,
    pub usage: TextureUsage,
    /// MSAA sample count. 1 means not multisampled.
    pub samples: u32,
    pub mip_count: u32,
    pub array_size: u32,
    /// Whether sampling applies gamma correction.
    pub srgb: bool,
}

impl TextureDesc {
    /// Describes a 2D texture. Further properties are set with the builder
    /// methods below.
    #[must_use]
    pub fn d2(format: PixelFormat, width: u32, height: u32, usage: TextureUsage) -> Self {
        Self {
            kind: TextureKind::D2,
            width,
            height,
            depth: 1,
            format,
            usage,
            samples: 1,
            mip_count: 1,
            array_size: 1,
            srgb: false,
        }
    }

    /// Describes a volume texture.
    #[must_use]
    pub fn d3(
        format: PixelFormat,
        width: u32,
        height: u32,
        depth: u32,
        usage: TextureUsage,
    ) -> Self {
        Self {
            kind: TextureKind::D3,
            depth,
            ..Self::d2(format, width, height, usage)
        }
    }

    /// Describes a cube map with square faces of the given size.
    #[must_use]
    pub fn cube(format: PixelFormat, size: u32, usage: TextureUsage) -> Self {
        Self {
            kind: TextureKind::Cube,
            ..Self::d2(format, size, size, usage)
        }
    }

    /// Sets the MSAA sample count.
    #[must_use]
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Sets the number of mip levels.
    #[must_use]
    pub fn with_mips(mut self, mip_count: u32) -> Self {
        self.mip_count = mip_count;
        self
    }

    /// Sets the array layer count.
    #[must_use]
    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    /// Enables gamma-corrected sampling.
    #[must_use]
    pub fn with_srgb(mut self, srgb: bool) -> Self {
        self.srgb = srgb;
        self
    }

    /// Number of mip levels in a full chain for a square texture of `size`.
    #[must_use]
    pub fn max_mip_count(size: u32) -> u32 {
        32 - size.max(1).leading_zeros()
    }
}
