//! Per-view render settings.
//!
//! Every option here changes which nodes the compositor's dependency
//! functions return, so any change can force a graph rebuild for the views
//! it applies to. The settings hash ([`RenderSettings::content_hash`]) is the
//! rebuild trigger: the driver compares it against the hash captured at the
//! last successful build.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// How the opaque render queue is sorted.
///
/// Sorting by material minimizes GPU state switches; sorting by distance
/// maximizes early-Z rejection. Neither wins universally, so the choice is a
/// per-view setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateReductionMode {
    /// Keep insertion order.
    None,
    /// Group draws by material.
    Material,
    /// Sort front-to-back by view-space distance.
    Distance,
}

/// Settings that control automatic exposure (eye adaptation).
#[derive(Debug, Clone, PartialEq)]
pub struct AutoExposureSettings {
    /// Minimum luminance included in the adaptation histogram, in log2 units.
    pub histogram_log2_min: f32,
    /// Maximum luminance included in the adaptation histogram, in log2 units.
    pub histogram_log2_max: f32,
    /// Speed at which exposure adapts towards brighter scenes.
    pub speed_up: f32,
    /// Speed at which exposure adapts towards darker scenes.
    pub speed_down: f32,
}

impl Default for AutoExposureSettings {
    fn default() -> Self {
        Self {
            histogram_log2_min: -8.0,
            histogram_log2_max: 4.0,
            speed_up: 3.0,
            speed_down: 3.0,
        }
    }
}

/// Screen-space ambient occlusion settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientOcclusionSettings {
    pub enabled: bool,
    /// Quality tier 0–3. Tiers above 1 add downsampled evaluation levels;
    /// tiers above 1 also enable the separable blur.
    pub quality: u32,
    /// Sampling radius in world units.
    pub radius: f32,
    /// Occlusion strength multiplier.
    pub intensity: f32,
}

impl Default for AmbientOcclusionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: 2,
            radius: 1.5,
            intensity: 1.0,
        }
    }
}

/// Screen-space reflection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSpaceReflectionsSettings {
    pub enabled: bool,
    /// Quality tier 0–3, controls ray-march step counts.
    pub quality: u32,
    /// Surfaces rougher than this receive no SSR contribution.
    pub max_roughness: f32,
}

impl Default for ScreenSpaceReflectionsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: 2,
            max_roughness: 0.8,
        }
    }
}

/// Gaussian depth-of-field settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthOfFieldSettings {
    pub enabled: bool,
    /// Blur strength for the near (foreground) field. Zero disables it.
    pub near_blur_amount: f32,
    /// Blur strength for the far (background) field. Zero disables it.
    pub far_blur_amount: f32,
    /// Distance to the focal plane in world units.
    pub focal_distance: f32,
}

impl Default for DepthOfFieldSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            near_blur_amount: 0.0,
            far_blur_amount: 1.0,
            focal_distance: 10.0,
        }
    }
}

/// Per-view renderer configuration.
///
/// The option set mirrors what the engine's camera component exposes. Each
/// field feeds at least one dependency function in the node registry; see the
/// module docs for the rebuild implications.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Render to HDR floating-point targets.
    pub enable_hdr: bool,
    /// Run eye adaptation before tonemapping (HDR only).
    pub enable_auto_exposure: bool,
    /// Apply filmic tonemapping during the resolve to LDR.
    pub enable_tonemapping: bool,
    /// Render shadow maps and shadowed lights.
    pub enable_shadows: bool,
    /// Evaluate indirect (probe / sky irradiance) lighting.
    pub enable_indirect_lighting: bool,
    /// Draw the skybox (falls back to a solid color when disabled or when no
    /// radiance texture exists).
    pub enable_skybox: bool,
    /// Apply FXAA at the end of the post-process chain.
    pub enable_fxaa: bool,
    pub auto_exposure: AutoExposureSettings,
    pub ambient_occlusion: AmbientOcclusionSettings,
    pub screen_space_reflections: ScreenSpaceReflectionsSettings,
    pub depth_of_field: DepthOfFieldSettings,
    /// MSAA sample count. 1 disables multisampling.
    pub num_samples: u32,
    /// Resolution of shadow maps rendered for this view.
    pub shadow_map_size: u32,
    /// Opaque queue sort strategy.
    pub state_reduction_mode: StateReductionMode,
    /// Exposure multiplier applied when auto-exposure is off.
    pub exposure_scale: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            enable_hdr: true,
            enable_auto_exposure: true,
            enable_tonemapping: true,
            enable_shadows: true,
            enable_indirect_lighting: true,
            enable_skybox: true,
            enable_fxaa: true,
            auto_exposure: AutoExposureSettings::default(),
            ambient_occlusion: AmbientOcclusionSettings::default(),
            screen_space_reflections: ScreenSpaceReflectionsSettings::default(),
            depth_of_field: DepthOfFieldSettings::default(),
            num_samples: 1,
            shadow_map_size: 2048,
            state_reduction_mode: StateReductionMode::Material,
            exposure_scale: 1.0,
        }
    }
}

impl RenderSettings {
    /// Whether the post-process chain (tonemapping, DOF, FXAA) runs for
    /// views using these settings.
    #[inline]
    #[must_use]
    pub fn run_post_processing(&self) -> bool {
        self.enable_hdr || self.enable_tonemapping
    }

    /// Stable content hash, used to detect structural changes that require a
    /// compositor rebuild.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into(&self, hasher: &mut impl Hasher) {
        (
            self.enable_hdr,
            self.enable_auto_exposure,
            self.enable_tonemapping,
            self.enable_shadows,
            self.enable_indirect_lighting,
            self.enable_skybox,
            self.enable_fxaa,
        )
            .hash(hasher);

        self.ambient_occlusion.enabled.hash(hasher);
        self.ambient_occlusion.quality.hash(hasher);
        self.ambient_occlusion.radius.to_bits().hash(hasher);
        self.ambient_occlusion.intensity.to_bits().hash(hasher);

        self.screen_space_reflections.enabled.hash(hasher);
        self.screen_space_reflections.quality.hash(hasher);
        self.screen_space_reflections
            .max_roughness
            .to_bits()
            .hash(hasher);

        self.depth_of_field.enabled.hash(hasher);
        self.depth_of_field.near_blur_amount.to_bits().hash(hasher);
        self.depth_of_field.far_blur_amount.to_bits().hash(hasher);
        self.depth_of_field.focal_distance.to_bits().hash(hasher);

        self.auto_exposure_hash(hasher);

        self.num_samples.hash(hasher);
        self.shadow_map_size.hash(hasher);
        self.state_reduction_mode.hash(hasher);
        self.exposure_scale.to_bits().hash(hasher);
    }

    fn auto_exposure_hash(&self, hasher: &mut impl Hasher) {
        // Auto-exposure tuning values feed the tonemap LUT rebuild check.
        let ae = &self.auto_exposure;
        ae.histogram_log2_min.to_bits().hash(hasher);
        ae.histogram_log2_max.to_bits().hash(hasher);
        ae.speed_up.to_bits().hash(hasher);
        ae.speed_down.to_bits().hash(hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable() {
        let a = RenderSettings::default();
        let b = RenderSettings::default();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn content_hash_tracks_structural_toggles() {
        let a = RenderSettings::default();
        let mut b = RenderSettings::default();
        b.ambient_occlusion.enabled = !b.ambient_occlusion.enabled;
        assert_ne!(a.content_hash(), b.content_hash());

        let mut c = RenderSettings::default();
        c.num_samples = 4;
        assert_ne!(a.content_hash(), c.content_hash());
    }
}
