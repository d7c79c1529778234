//! Static renderer lookup textures.
//!
//! A small set of textures computed once at startup and read-only afterwards:
//! the preintegrated environment BRDF used by image-based lighting, the 4×4
//! rotation noise that randomizes SSAO sample kernels, a default irradiance
//! cube for scenes without probes, and the 1×1 white/black fallbacks that
//! disabled screen-space effects substitute for their outputs.
//!
//! Being immutable after [`RendererTextures::generate`], these are safe to
//! read from any number of views without synchronization.

use glam::Vec3;

use crate::gfx::{PixelFormat, RenderDevice, TextureDesc, TextureId, TextureUsage};

/// Resolution of the preintegrated BRDF lookup table.
const BRDF_LUT_SIZE: u32 = 64;
/// Monte-Carlo sample count per LUT texel.
const BRDF_SAMPLE_COUNT: u32 = 64;

/// The set of startup-generated lookup textures.
pub struct RendererTextures {
    /// Split-sum preintegrated GGX environment BRDF (scale/bias in RG).
    pub preintegrated_env_brdf: TextureId,
    /// 4×4 tiled per-pixel rotation vectors for SSAO.
    pub ssao_randomization: TextureId,
    /// 1×1 cube of uniform mid-grey irradiance, the fallback when a scene
    /// has neither probes nor a skybox.
    pub default_irradiance: TextureId,
    /// 1×1 white texture (AO fallback: fully unoccluded).
    pub white: TextureId,
    /// 1×1 black texture (SSR fallback: no reflection contribution).
    pub black: TextureId,
}

impl RendererTextures {
    /// Computes and uploads all static textures. Called once at renderer
    /// startup.
    #[must_use]
    pub fn generate(device: &mut dyn RenderDevice) -> Self {
        let preintegrated_env_brdf = Self::generate_brdf_lut(device);
        let ssao_randomization = Self::generate_ssao_noise(device);
        let default_irradiance = Self::generate_default_irradiance(device);
        let white = Self::solid_texture(device, [255, 255, 255, 255], "White Texture");
        let black = Self::solid_texture(device, [0, 0, 0, 255], "Black Texture");

        Self {
            preintegrated_env_brdf,
            ssao_randomization,
            default_irradiance,
            white,
            black,
        }
    }

    // ── BRDF integration ───────────────────────────────────────────────────

    /// Integrates the split-sum environment BRDF on the CPU.
    ///
    /// X maps to `dot(N, V)`, Y to roughness; the result stores the scale
    /// and bias applied to the specular color at lookup time.
    fn generate_brdf_lut(device: &mut dyn RenderDevice) -> TextureId {
        let size = BRDF_LUT_SIZE as usize;
        let mut data = Vec::with_capacity(size * size * 4);

        for y in 0..size {
            let roughness = (y as f32 + 0.5) / size as f32;
            for x in 0..size {
                let n_dot_v = (x as f32 + 0.5) / size as f32;
                let (scale, bias) = integrate_brdf(n_dot_v, roughness);
                data.extend_from_slice(&f32_to_f16_bits(scale).to_le_bytes());
                data.extend_from_slice(&f32_to_f16_bits(bias).to_le_bytes());
            }
        }

        let texture = device.create_texture(
            &TextureDesc::d2(
                PixelFormat::Rg16F,
                BRDF_LUT_SIZE,
                BRDF_LUT_SIZE,
                TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            ),
            "Preintegrated Env BRDF",
        );
        device.upload_texture(texture, &data);
        texture
    }

    // ── SSAO randomization ─────────────────────────────────────────────────

    /// 4×4 grid of unit rotation vectors in the XY plane. The sequence is
    /// deterministic so captures diff cleanly between runs.
    fn generate_ssao_noise(device: &mut dyn RenderDevice) -> TextureId {
        let mut data = Vec::with_capacity(16 * 4);
        let mut state = 0x9e37_79b9_u32;

        for _ in 0..16 {
            // xorshift; quality is irrelevant here, tiling disorder is all
            // that matters.
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let angle = (state as f32 / u32::MAX as f32) * std::f32::consts::TAU;

            let x = angle.cos() * 0.5 + 0.5;
            let y = angle.sin() * 0.5 + 0.5;
            data.extend_from_slice(&[(x * 255.0) as u8, (y * 255.0) as u8, 0, 255]);
        }

        let texture = device.create_texture(
            &TextureDesc::d2(
                PixelFormat::Rgba8,
                4,
                4,
                TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            ),
            "SSAO Randomization 4x4",
        );
        device.upload_texture(texture, &data);
        texture
    }

    // ── Fallbacks ──────────────────────────────────────────────────────────

    fn generate_default_irradiance(device: &mut dyn RenderDevice) -> TextureId {
        let grey = f32_to_f16_bits(0.18);
        let one = f32_to_f16_bits(1.0);
        let texel: Vec<u8> = [grey, grey, grey, one]
            .iter()
            .flat_map(|half| half.to_le_bytes())
            .collect();
        let data: Vec<u8> = std::iter::repeat_with(|| texel.clone())
            .take(6)
            .flatten()
            .collect();

        let texture = device.create_texture(
            &TextureDesc::cube(
                PixelFormat::Rgba16F,
                1,
                TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            ),
            "Default Irradiance",
        );
        device.upload_texture(texture, &data);
        texture
    }

    fn solid_texture(
        device: &mut dyn RenderDevice,
        rgba: [u8; 4],
        label: &'static str,
    ) -> TextureId {
        let texture = device.create_texture(
            &TextureDesc::d2(
                PixelFormat::Rgba8,
                1,
                1,
                TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            ),
            label,
        );
        device.upload_texture(texture, &rgba);
        texture
    }
}

// ─── BRDF math ────────────────────────────────────────────────────────────────

fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = bits.reverse_bits();
    bits as f32 * 2.328_306_4e-10
}

fn hammersley(i: u32, count: u32) -> (f32, f32) {
    (i as f32 / count as f32, radical_inverse_vdc(i))
}

fn importance_sample_ggx(xi: (f32, f32), roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = std::f32::consts::TAU * xi.0;
    let cos_theta = ((1.0 - xi.1) / (1.0 + (a * a - 1.0) * xi.1)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

fn g_smith_ibl(roughness: f32, n_dot_v: f32, n_dot_l: f32) -> f32 {
    // Schlick-GGX with the k remapping used for image-based lighting.
    let k = (roughness * roughness) / 2.0;
    let g1 = |n_dot_x: f32| n_dot_x / (n_dot_x * (1.0 - k) + k);
    g1(n_dot_v) * g1(n_dot_l)
}

/// Split-sum integration of the GGX environment BRDF for one (NoV,
/// roughness) pair. Returns the (scale, bias) pair applied to F0 at runtime.
fn integrate_brdf(n_dot_v: f32, roughness: f32) -> (f32, f32) {
    let n_dot_v = n_dot_v.max(1e-4);
    let view = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);

    let mut scale = 0.0;
    let mut bias = 0.0;

    for i in 0..BRDF_SAMPLE_COUNT {
        let xi = hammersley(i, BRDF_SAMPLE_COUNT);
        let half = importance_sample_ggx(xi, roughness);
        let light = 2.0 * view.dot(half) * half - view;

        let n_dot_l = light.z.max(0.0);
        let n_dot_h = half.z.max(0.0);
        let v_dot_h = view.dot(half).max(0.0);

        if n_dot_l > 0.0 && n_dot_h > 0.0 {
            let g = g_smith_ibl(roughness, n_dot_v, n_dot_l);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v);
            let fresnel = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fresnel) * g_vis;
            bias += fresnel * g_vis;
        }
    }

    (
        scale / BRDF_SAMPLE_COUNT as f32,
        bias / BRDF_SAMPLE_COUNT as f32,
    )
}

/// IEEE 754 float-to-half conversion (round-toward-zero).
fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exponent == 0xff {
        // Infinity or NaN.
        let nan_bit = if mantissa != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan_bit;
    }

    let exponent = exponent - 127 + 15;
    if exponent >= 0x1f {
        return sign | 0x7c00;
    }
    if exponent <= 0 {
        if exponent < -10 {
            return sign;
        }
        let mantissa = mantissa | 0x0080_0000;
        return sign | (mantissa >> (14 - exponent)) as u16;
    }

    sign | ((exponent as u16) << 10) | (mantissa >> 13) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_conversion_round_trips_simple_values() {
        assert_eq!(f32_to_f16_bits(0.0), 0x0000);
        assert_eq!(f32_to_f16_bits(1.0), 0x3c00);
        assert_eq!(f32_to_f16_bits(-2.0), 0xc000);
        assert_eq!(f32_to_f16_bits(65504.0), 0x7bff);
        assert_eq!(f32_to_f16_bits(1e9), 0x7c00, "overflow clamps to inf");
    }

    #[test]
    fn brdf_integral_is_bounded_and_monotone_at_grazing() {
        let (scale, bias) = integrate_brdf(0.5, 0.25);
        assert!(scale > 0.0 && scale <= 1.0);
        assert!(bias >= 0.0 && bias <= 1.0);

        // Rough grazing angles lose energy relative to smooth head-on views.
        let (smooth, _) = integrate_brdf(0.95, 0.05);
        let (rough, _) = integrate_brdf(0.1, 0.95);
        assert!(smooth > rough);
    }
}
