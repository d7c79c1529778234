//! Per-frame scene snapshot.
//!
//! The renderer core does not own a scene graph. An external system (the
//! component/scene layer) hands it a flat, render-thread-owned snapshot once
//! per frame: renderables, lights, reflection probes, particle systems and
//! the skybox. Everything here is plain data — immutable for the duration of
//! one frame once the simulation→render hand-off has completed.

use glam::{Mat4, Vec3};

use crate::gfx::TextureId;

/// Handle to externally-owned mesh data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MeshId(pub u64);

/// Handle to an externally-owned material (shader + typed parameters).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MaterialId(pub u64);

/// Bounding sphere used for visibility culling.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    #[must_use]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Category of a light source.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LightType {
    Directional,
    /// Point light.
    Radial,
    Spot,
}

impl LightType {
    /// Number of light categories; used to size per-type tables.
    pub const COUNT: usize = 3;

    /// Stable index of this light type.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            LightType::Directional => 0,
            LightType::Radial => 1,
            LightType::Spot => 2,
        }
    }
}

/// One renderable object as seen by the renderer.
#[derive(Clone, Debug)]
pub struct RendererRenderable {
    pub mesh: MeshId,
    pub material: MaterialId,
    /// Transparent objects skip the deferred base pass and draw in the
    /// forward pass.
    pub transparent: bool,
    pub casts_shadows: bool,
    pub world: Mat4,
    pub bounds: Sphere,
}

/// One light source as seen by the renderer.
#[derive(Clone, Debug)]
pub struct RendererLight {
    pub light_type: LightType,
    /// Shadowed lights are lit by the standard deferred path; unshadowed
    /// ones go through tiled deferred.
    pub casts_shadows: bool,
    pub bounds: Sphere,
    pub intensity: f32,
}

/// A reflection probe contributing filtered radiance to IBL.
#[derive(Clone, Debug)]
pub struct ReflectionProbe {
    pub bounds: Sphere,
    pub cubemap: Option<TextureId>,
}

/// A particle system; the core only needs its bounds for visibility.
#[derive(Clone, Debug)]
pub struct ParticleSystemInfo {
    pub bounds: Sphere,
}

/// Skybox description, including the shape data needed to validate the
/// user-supplied radiance cubemap without a device query.
#[derive(Clone, Debug)]
pub struct SkyboxInfo {
    /// Filtered radiance cube map, if one was provided.
    pub radiance: Option<TextureId>,
    /// Face size of `radiance`.
    pub radiance_size: u32,
    /// Mip count of `radiance`.
    pub radiance_mips: u32,
    /// Solid color drawn when no radiance texture exists.
    pub solid_color: [f32; 4],
}

/// The complete per-frame scene snapshot.
#[derive(Clone, Debug, Default)]
pub struct SceneInfo {
    pub renderables: Vec<RendererRenderable>,
    pub lights: Vec<RendererLight>,
    pub reflection_probes: Vec<ReflectionProbe>,
    pub particle_systems: Vec<ParticleSystemInfo>,
    pub skybox: Option<SkyboxInfo>,
}
