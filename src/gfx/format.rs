//! Pixel formats used by the renderer core.
//!
//! This is the small closed set the built-in passes allocate with, not a full
//! format zoo. Backends map these onto their native formats.

/// Pixel format of a texture.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PixelFormat {
    /// Single 8-bit unsigned-normalized channel (AO masks, coverage).
    R8,
    /// Single 32-bit float channel (hierarchical Z).
    R32F,
    /// Two 16-bit float channels (preintegrated BRDF, roughness/metalness).
    Rg16F,
    /// Four 8-bit unsigned-normalized channels (albedo, LDR post-process).
    Rgba8,
    /// 10-10-10-2 unsigned-normalized (world-space normals).
    Rgb10A2,
    /// Four 16-bit float channels (HDR scene color, light accumulation).
    Rgba16F,
    /// 24-bit depth + 8-bit stencil.
    Depth24Stencil8,
}

impl PixelFormat {
    /// Returns `true` for formats that can only back a depth-stencil
    /// attachment.
    #[inline]
    #[must_use]
    pub fn is_depth_stencil(self) -> bool {
        matches!(self, Self::Depth24Stencil8)
    }

    /// Bytes per pixel, as laid out for CPU uploads.
    ///
    /// Depth-stencil formats cannot be uploaded from the CPU; the value here
    /// is only used for size estimates.
    #[must_use]
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::R32F | Self::Rg16F | Self::Rgba8 | Self::Rgb10A2 | Self::Depth24Stencil8 => 4,
            Self::Rgba16F => 8,
        }
    }
}
