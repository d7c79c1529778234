//! Recorded GPU command stream.
//!
//! Compositor nodes do not issue graphics calls directly; they record
//! [`RenderCommand`]s into a [`CommandEncoder`] which is submitted to the
//! [`RenderDevice`](super::RenderDevice) once per view. Submission order on a
//! single queue is what guarantees that a pass reads what the previous pass
//! wrote, so the recorded order is load-bearing.
//!
//! Shader bodies are outside this core; full-screen and compute work is
//! identified by [`BuiltinMaterial`] plus a [`ShaderVariant`], which the
//! backend (or an installed draw delegate) resolves to concrete pipelines.

use bitflags::bitflags;
use smallvec::SmallVec;

use super::device::{BufferId, TextureId};
use crate::scene::{MaterialId, MeshId};

bitflags! {
    /// Which aspects of the bound target a `Clear` touches.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

bitflags! {
    /// Boolean toggles baked into a shader variant.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct VariantFlags: u32 {
        /// Skip tonemapping math, apply gamma only.
        const GAMMA_ONLY = 1 << 0;
        /// Use the auto-exposure (eye adaptation) input.
        const AUTO_EXPOSURE = 1 << 1;
        /// Upsample a lower-resolution input while evaluating.
        const UPSAMPLE = 1 << 2;
        /// Final (full-resolution) step of a multi-level effect.
        const FINAL_PASS = 1 << 3;
        /// Near-field portion of depth of field.
        const NEAR = 1 << 4;
        /// Far-field portion of depth of field.
        const FAR = 1 << 5;
        /// Evaluate sky irradiance only (no local probes).
        const SKY_ONLY = 1 << 6;
        /// Solid-color fallback (no radiance texture bound).
        const SOLID_COLOR = 1 << 7;
        /// Horizontal axis of a separable filter.
        const HORIZONTAL = 1 << 8;
        /// Vertical axis of a separable filter.
        const VERTICAL = 1 << 9;
    }
}

/// Selects a concrete compiled permutation of a [`BuiltinMaterial`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ShaderVariant {
    /// MSAA sample count the shader is specialized for.
    pub msaa_samples: u32,
    /// Quality tier (effect-specific meaning).
    pub quality: u32,
    pub flags: VariantFlags,
}

impl Default for ShaderVariant {
    fn default() -> Self {
        Self {
            msaa_samples: 1,
            quality: 0,
            flags: VariantFlags::empty(),
        }
    }
}

impl ShaderVariant {
    /// Variant specialized only on MSAA sample count.
    #[must_use]
    pub fn msaa(samples: u32) -> Self {
        Self {
            msaa_samples: samples,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: VariantFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// The fixed set of internal shader programs the built-in nodes draw with.
///
/// These correspond one-to-one to the renderer's internal materials; scene
/// geometry instead draws with its own [`MaterialId`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BuiltinMaterial {
    /// Per-sample shading coverage from the G-buffer (MSAA only).
    MsaaCoverage,
    /// Writes the coverage mask into the stencil buffer.
    MsaaCoverageStencil,
    /// Tiled deferred direct lighting (compute).
    TiledDeferredLighting,
    /// Per-light full-screen deferred lighting.
    StandardDeferredLight,
    /// Shadow-map depth rendering for a single caster queue.
    ShadowDepth,
    /// Projects a shadow map into a screen-space occlusion mask.
    ShadowOcclusion,
    /// Copies a flattened per-sample buffer back into an MSAA texture.
    FlatFramebufferToTexture,
    /// Evaluates indirect lighting from probes or sky irradiance.
    IrradianceEvaluate,
    /// Tiled deferred image-based lighting (compute).
    TiledDeferredImageBasedLighting,
    /// Skybox rendering (radiance texture or solid color variant).
    Skybox,
    /// Half-resolution downsample.
    Downsample,
    /// Luminance histogram generation (compute).
    EyeAdaptHistogram,
    /// Histogram reduction (compute).
    EyeAdaptHistogramReduce,
    /// Final eye-adaptation value evaluation.
    EyeAdaptation,
    /// Bakes the tonemapping 3D lookup table.
    CreateTonemapLut,
    /// Tonemapping / gamma resolve.
    Tonemapping,
    /// Separates near/far out-of-focus regions for depth of field.
    GaussianDofSeparate,
    /// Gaussian blur.
    GaussianBlur,
    /// Recombines blurred near/far layers with the focused scene.
    GaussianDofCombine,
    /// Fast approximate anti-aliasing.
    Fxaa,
    /// Builds one level of the hierarchical Z pyramid.
    BuildHiZ,
    /// Depth/normal downsample for multi-level SSAO.
    SsaoDownsample,
    /// Ambient occlusion evaluation.
    Ssao,
    /// Depth-aware AO blur (one axis per variant).
    SsaoBlur,
    /// Marks SSR-eligible pixels in the stencil buffer.
    SsrStencil,
    /// Screen-space reflection ray march.
    SsrTrace,
    /// Encodes linear depth into the output target's alpha.
    EncodeDepth,
}

/// Write-mask over RGBA channels; used when a clear must preserve a channel.
pub const COLOR_MASK_ALL: u8 = 0b1111;
/// RGB only; leaves the alpha channel untouched.
pub const COLOR_MASK_RGB: u8 = 0b0111;

/// One recorded GPU command.
///
/// The texture/buffer id lists exist so that a headless backend can audit the
/// data flow (reads-after-writes) without understanding the shaders.
#[derive(Clone, PartialEq, Debug)]
pub enum RenderCommand {
    /// Binds color and depth attachments. Empty color + `None` depth unbinds
    /// the target (used to make a written target readable by later passes).
    SetRenderTarget {
        color: SmallVec<[TextureId; 4]>,
        depth: Option<TextureId>,
        /// Bind the depth-stencil surface read-only so it can be sampled at
        /// the same time.
        read_only_depth: bool,
        /// Mip level the color attachments bind at.
        mip: u32,
    },
    /// Normalized viewport rect (x, y, width, height) within the target.
    SetViewport { rect: [f32; 4] },
    /// Clears the bound target.
    Clear {
        flags: ClearFlags,
        color: [f32; 4],
        /// Channel write-mask applied to the color clear.
        color_mask: u8,
        depth: f32,
        stencil: u32,
    },
    /// Draws one mesh with a scene material into the bound target.
    Draw { mesh: MeshId, material: MaterialId },
    /// Full-screen pass with a built-in material.
    DrawFullscreen {
        material: BuiltinMaterial,
        variant: ShaderVariant,
        /// Textures the pass samples, in binding order.
        reads: SmallVec<[TextureId; 6]>,
        /// Buffers the pass reads.
        buffer_reads: SmallVec<[BufferId; 2]>,
    },
    /// Compute dispatch with a built-in material.
    Dispatch {
        material: BuiltinMaterial,
        variant: ShaderVariant,
        reads: SmallVec<[TextureId; 6]>,
        /// Textures written through load-store bindings.
        writes: SmallVec<[TextureId; 2]>,
        /// Buffers written through load-store bindings.
        buffer_writes: SmallVec<[BufferId; 2]>,
        groups: [u32; 3],
    },
    /// Copies `source` into the bound target, optionally flipped vertically.
    Blit {
        source: TextureId,
        flip: bool,
        /// Copy the depth aspect instead of color (MSAA depth resolve).
        depth: bool,
    },
    /// Opens a named debug group (maps to GPU debug markers).
    PushDebugGroup(&'static str),
    /// Closes the innermost debug group.
    PopDebugGroup,
}

/// Records [`RenderCommand`]s for a single submission.
///
/// One encoder spans a whole compositor execution; the renderer submits it
/// after the final node, mirroring the one-encoder-per-graph policy the
/// engine uses everywhere.
#[derive(Default)]
pub struct CommandEncoder {
    commands: Vec<RenderCommand>,
}

impl CommandEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds color and depth attachments at mip 0.
    pub fn set_render_target(
        &mut self,
        color: impl IntoIterator<Item = TextureId>,
        depth: Option<TextureId>,
        read_only_depth: bool,
    ) {
        self.commands.push(RenderCommand::SetRenderTarget {
            color: color.into_iter().collect(),
            depth,
            read_only_depth,
            mip: 0,
        });
    }

    /// Binds a single color attachment at the given mip level.
    pub fn set_render_target_mip(&mut self, color: TextureId, mip: u32) {
        self.commands.push(RenderCommand::SetRenderTarget {
            color: SmallVec::from_slice(&[color]),
            depth: None,
            read_only_depth: false,
            mip,
        });
    }

    /// Unbinds the current render target.
    pub fn unbind_render_target(&mut self) {
        self.commands.push(RenderCommand::SetRenderTarget {
            color: SmallVec::new(),
            depth: None,
            read_only_depth: false,
            mip: 0,
        });
    }

    pub fn set_viewport(&mut self, rect: [f32; 4]) {
        self.commands.push(RenderCommand::SetViewport { rect });
    }

    /// Clears the bound target with a full color write-mask.
    pub fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32, stencil: u32) {
        self.clear_masked(flags, color, COLOR_MASK_ALL, depth, stencil);
    }

    /// Clears the bound target with an explicit color channel mask.
    pub fn clear_masked(
        &mut self,
        flags: ClearFlags,
        color: [f32; 4],
        color_mask: u8,
        depth: f32,
        stencil: u32,
    ) {
        self.commands.push(RenderCommand::Clear {
            flags,
            color,
            color_mask,
            depth,
            stencil,
        });
    }

    pub fn draw(&mut self, mesh: MeshId, material: MaterialId) {
        self.commands.push(RenderCommand::Draw { mesh, material });
    }

    /// Records a full-screen pass sampling the given textures.
    pub fn draw_fullscreen(
        &mut self,
        material: BuiltinMaterial,
        variant: ShaderVariant,
        reads: &[TextureId],
    ) {
        self.commands.push(RenderCommand::DrawFullscreen {
            material,
            variant,
            reads: SmallVec::from_slice(reads),
            buffer_reads: SmallVec::new(),
        });
    }

    /// Records a full-screen pass that also reads buffers.
    pub fn draw_fullscreen_with_buffers(
        &mut self,
        material: BuiltinMaterial,
        variant: ShaderVariant,
        reads: &[TextureId],
        buffer_reads: &[BufferId],
    ) {
        self.commands.push(RenderCommand::DrawFullscreen {
            material,
            variant,
            reads: SmallVec::from_slice(reads),
            buffer_reads: SmallVec::from_slice(buffer_reads),
        });
    }

    /// Records a compute dispatch.
    pub fn dispatch(
        &mut self,
        material: BuiltinMaterial,
        variant: ShaderVariant,
        reads: &[TextureId],
        writes: &[TextureId],
        buffer_writes: &[BufferId],
        groups: [u32; 3],
    ) {
        self.commands.push(RenderCommand::Dispatch {
            material,
            variant,
            reads: SmallVec::from_slice(reads),
            writes: SmallVec::from_slice(writes),
            buffer_writes: SmallVec::from_slice(buffer_writes),
            groups,
        });
    }

    /// Copies a texture into the bound target.
    pub fn blit(&mut self, source: TextureId, flip: bool) {
        self.commands.push(RenderCommand::Blit {
            source,
            flip,
            depth: false,
        });
    }

    /// Copies the depth aspect of a texture into the bound target.
    pub fn blit_depth(&mut self, source: TextureId) {
        self.commands.push(RenderCommand::Blit {
            source,
            flip: false,
            depth: true,
        });
    }

    pub fn push_debug_group(&mut self, name: &'static str) {
        self.commands.push(RenderCommand::PushDebugGroup(name));
    }

    pub fn pop_debug_group(&mut self) {
        self.commands.push(RenderCommand::PopDebugGroup);
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Consumes the encoder and returns the recorded command list.
    #[must_use]
    pub fn finish(self) -> Vec<RenderCommand> {
        self.commands
    }

    /// Read access to the recorded commands (used by tests and tooling).
    #[must_use]
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }
}
