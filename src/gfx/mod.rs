//! Abstract render-API boundary.
//!
//! The compositor and resource pool never talk to a graphics library
//! directly. Everything below them goes through [`RenderDevice`]: resource
//! creation, uploads, and a recorded [`RenderCommand`] stream submitted once
//! per view. Two implementations ship with the crate:
//!
//! - [`HeadlessDevice`]: allocates ids and records every submitted command.
//!   Used by the test suite to verify scheduling and resource-lifetime
//!   invariants without a GPU.
//! - [`WgpuDevice`]: backs resources with real `wgpu` textures and buffers
//!   and translates the structural commands (targets, clears, blits) into
//!   `wgpu` passes. Draw execution is delegated, since shader and pipeline
//!   provisioning live outside this core.
//!
//! Command submission is fire-and-forget from the CPU's perspective; nothing
//! in this module blocks.

mod buffer;
mod command;
mod device;
mod format;
mod headless;
mod texture;
mod wgpu_device;

pub use buffer::{BufferDesc, BufferFormat, BufferKind, BufferUsage};
pub use command::{
    BuiltinMaterial, ClearFlags, CommandEncoder, RenderCommand, ShaderVariant, VariantFlags,
    COLOR_MASK_ALL, COLOR_MASK_RGB,
};
pub use device::{BufferId, RenderDevice, TextureId};
pub use format::PixelFormat;
pub use headless::HeadlessDevice;
pub use texture::{TextureDesc, TextureKind, TextureUsage};
pub use wgpu_device::{DrawDelegate, WgpuDevice};
