//! Buffer descriptors.

use bitflags::bitflags;

bitflags! {
    /// How a buffer may be bound.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct BufferUsage: u32 {
        /// Random-access read/write from compute.
        const LOAD_STORE = 1 << 0;
        /// Read-only shader binding.
        const SAMPLED = 1 << 1;
        /// Destination of CPU writes.
        const COPY_DST = 1 << 2;
    }
}

/// Element format for standard (typed) buffers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferFormat {
    /// Four 16-bit floats per element (flattened HDR color data).
    F16x4,
    /// One 32-bit float per element.
    F32,
    /// One 32-bit unsigned integer per element.
    U32,
}

impl BufferFormat {
    /// Size of one element in bytes.
    #[must_use]
    pub fn element_size(self) -> u32 {
        match self {
            BufferFormat::F16x4 => 8,
            BufferFormat::F32 | BufferFormat::U32 => 4,
        }
    }
}

/// Whether a buffer is typed by format or by explicit structure stride.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferKind {
    /// Typed buffer; compatibility requires the format to match.
    Standard { format: BufferFormat },
    /// Structured buffer; compatibility requires the element size to match.
    Structured { element_size: u32 },
}

/// Full description of a GPU buffer's shape and usage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferDesc {
    pub kind: BufferKind,
    pub element_count: u32,
    pub usage: BufferUsage,
}

impl BufferDesc {
    /// Describes a standard (format-typed) buffer.
    #[must_use]
    pub fn standard(format: BufferFormat, element_count: u32, usage: BufferUsage) -> Self {
        Self {
            kind: BufferKind::Standard { format },
            element_count,
            usage,
        }
    }

    /// Describes a structured buffer with an explicit element stride.
    #[must_use]
    pub fn structured(element_size: u32, element_count: u32, usage: BufferUsage) -> Self {
        Self {
            kind: BufferKind::Structured { element_size },
            element_count,
            usage,
        }
    }

    /// Total size of the buffer in bytes.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        let stride = match self.kind {
            BufferKind::Standard { format } => format.element_size(),
            BufferKind::Structured { element_size } => element_size,
        };
        u64::from(stride) * u64::from(self.element_count)
    }
}
