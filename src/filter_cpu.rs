//! CPU filter stage. All functions operate in place on premultiplied RGBA8
//! frames and preserve the premul invariant (channel <= alpha).
//!
//! Fixed application order: brightness, contrast, saturation, sepia,
//! grayscale, blur, hue-rotate. Grain and vignette are separate stages run
//! by the compositor after the color work.

use crate::{
    core::{Frame, SplitMix64, mix64},
    error::{MuralError, MuralResult},
    labs::FilterSettings,
};

const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Apply the seven color knobs. Neutral settings are a no-op.
#[tracing::instrument(skip(frame, filters))]
pub fn apply_color_filters(frame: &mut Frame, filters: &FilterSettings) -> MuralResult<()> {
    if filters.color_is_neutral() {
        return Ok(());
    }

    let brightness = (filters.brightness / 100.0).max(0.0);
    let contrast = (filters.contrast / 100.0).max(0.0);
    let saturation = (filters.saturation / 100.0).max(0.0);
    let sepia = (filters.sepia / 100.0).clamp(0.0, 1.0);
    let grayscale = (filters.grayscale / 100.0).clamp(0.0, 1.0);

    let point_work = brightness != 1.0
        || contrast != 1.0
        || saturation != 1.0
        || sepia != 0.0
        || grayscale != 0.0;
    if point_work {
        for_each_straight_pixel(frame, |[r, g, b]| {
            let mut px = [r * brightness, g * brightness, b * brightness];
            for c in &mut px {
                *c = (*c - 0.5) * contrast + 0.5;
            }
            if saturation != 1.0 {
                let luma = LUMA_R * px[0] + LUMA_G * px[1] + LUMA_B * px[2];
                for c in &mut px {
                    *c = luma + (*c - luma) * saturation;
                }
            }
            if sepia != 0.0 {
                let [r, g, b] = px;
                let sr = 0.393 * r + 0.769 * g + 0.189 * b;
                let sg = 0.349 * r + 0.686 * g + 0.168 * b;
                let sb = 0.272 * r + 0.534 * g + 0.131 * b;
                px = [r + (sr - r) * sepia, g + (sg - g) * sepia, b + (sb - b) * sepia];
            }
            if grayscale != 0.0 {
                let luma = LUMA_R * px[0] + LUMA_G * px[1] + LUMA_B * px[2];
                for c in &mut px {
                    *c += (luma - *c) * grayscale;
                }
            }
            px
        });
    }

    if filters.blur > 0.0 {
        let radius = filters.blur.round().clamp(0.0, 256.0) as u32;
        blur_premul_in_place(frame, radius, (radius as f32 / 2.0).max(0.5))?;
    }

    if filters.hue != 0.0 {
        let m = hue_rotate_matrix(filters.hue.to_radians());
        for_each_straight_pixel(frame, |[r, g, b]| {
            [
                m[0] * r + m[1] * g + m[2] * b,
                m[3] * r + m[4] * g + m[5] * b,
                m[6] * r + m[7] * g + m[8] * b,
            ]
        });
    }

    Ok(())
}

/// Run `op` on every non-transparent pixel's straight-alpha color in 0..1
/// space, then re-premultiply with clamping.
fn for_each_straight_pixel(frame: &mut Frame, mut op: impl FnMut([f32; 3]) -> [f32; 3]) {
    for px in frame.data.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 {
            continue;
        }
        let af = f32::from(a);
        let straight = [
            f32::from(px[0]) / af,
            f32::from(px[1]) / af,
            f32::from(px[2]) / af,
        ];
        let out = op(straight);
        for c in 0..3 {
            px[c] = (out[c].clamp(0.0, 1.0) * af + 0.5) as u8;
        }
    }
}

/// Hue rotation matrix over the sRGB luma axis, row-major 3x3.
fn hue_rotate_matrix(radians: f32) -> [f32; 9] {
    let (sin, cos) = radians.sin_cos();
    [
        LUMA_R + cos * (1.0 - LUMA_R) - sin * LUMA_R,
        LUMA_G - cos * LUMA_G - sin * LUMA_G,
        LUMA_B - cos * LUMA_B + sin * (1.0 - LUMA_B),
        LUMA_R - cos * LUMA_R + sin * 0.143,
        LUMA_G + cos * (1.0 - LUMA_G) + sin * 0.140,
        LUMA_B - cos * LUMA_B - sin * 0.283,
        LUMA_R - cos * LUMA_R - sin * (1.0 - LUMA_R),
        LUMA_G - cos * LUMA_G + sin * LUMA_G,
        LUMA_B + cos * (1.0 - LUMA_B) + sin * LUMA_B,
    ]
}

/// Two-pass separable gaussian blur on the premultiplied buffer, Q16
/// fixed-point kernel, edge-clamped sampling.
pub fn blur_premul_in_place(frame: &mut Frame, radius: u32, sigma: f32) -> MuralResult<()> {
    if radius == 0 {
        return Ok(());
    }
    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let (w, h) = (frame.width as i32, frame.height as i32);
    let mut tmp = vec![0u8; frame.data.len()];

    blur_pass(&frame.data, &mut tmp, w, h, &kernel, true);
    blur_pass(&tmp, &mut frame.data, w, h, &kernel, false);
    Ok(())
}

fn blur_pass(src: &[u8], dst: &mut [u8], w: i32, h: i32, kernel: &[u32], horizontal: bool) {
    let radius = (kernel.len() / 2) as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = if horizontal {
                    ((x + d).clamp(0, w - 1), y)
                } else {
                    (x, (y + d).clamp(0, h - 1))
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out + c] = (((acc[c] + 32768) >> 16).min(255)) as u8;
            }
        }
    }
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> MuralResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(MuralError::validation("blur sigma must be > 0"));
    }
    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r).map(|i| (-(i * i) as f64 / denom).exp()).collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(MuralError::evaluation("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|&wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // Push rounding drift into the center tap so the kernel sums to one.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let mid = weights.len() / 2;
    weights[mid] = (i64::from(weights[mid]) + (65536 - acc)).clamp(0, 65536) as u32;
    Ok(weights)
}

/// Perturb every non-transparent pixel's RGB with independent uniform noise
/// of amplitude `grain / 255 * 0.2`. Seeded from the document seed and a
/// caller-chosen nonce, so a fixed nonce gives reproducible grain.
#[tracing::instrument(skip(frame))]
pub fn apply_grain(frame: &mut Frame, grain: f32, seed: u64, nonce: u64) {
    if grain <= 0.0 {
        return;
    }
    let amplitude = (grain / 255.0) * 0.2;
    let mut rng = SplitMix64::new(mix64(seed ^ mix64(nonce)));
    for px in frame.data.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 {
            continue;
        }
        let af = f32::from(a);
        for c in 0..3 {
            // Noise is defined in straight-alpha space; scale by alpha to
            // stay premultiplied.
            let delta = rng.next_signed_unit() * amplitude * af;
            px[c] = (f32::from(px[c]) + delta).clamp(0.0, af) as u8;
        }
    }
}

/// Darken toward the edges with a radial falloff, source-atop: only pixels
/// that already have coverage darken, and alpha never grows.
#[tracing::instrument(skip(frame))]
pub fn apply_vignette(frame: &mut Frame, vignette: f32) {
    if vignette <= 0.0 {
        return;
    }
    let strength = (vignette / 100.0).clamp(0.0, 1.0);
    let (w, h) = (frame.width as f32, frame.height as f32);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let larger = w.max(h);
    let inner = 0.3 * larger;
    let outer = 0.8 * larger;
    let span = (outer - inner).max(1.0);

    for y in 0..frame.height {
        for x in 0..frame.width {
            let idx = ((y * frame.width + x) as usize) * 4;
            if frame.data[idx + 3] == 0 {
                continue;
            }
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            let t = ((dist - inner) / span).clamp(0.0, 1.0);
            let keep = 1.0 - t * strength;
            for c in 0..3 {
                frame.data[idx + c] = (f32::from(frame.data[idx + c]) * keep) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frame;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Frame {
        let mut frame = Frame::new(w, h);
        for chunk in frame.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
        frame
    }

    #[test]
    fn neutral_filters_are_identity() {
        let mut frame = solid(4, 4, [40, 80, 120, 255]);
        let before = frame.data.clone();
        apply_color_filters(&mut frame, &FilterSettings::default()).unwrap();
        assert_eq!(frame.data, before);
    }

    #[test]
    fn brightness_zero_blacks_out_color_but_not_alpha() {
        let mut frame = solid(2, 2, [100, 150, 200, 255]);
        let filters = FilterSettings { brightness: 0.0, ..Default::default() };
        apply_color_filters(&mut frame, &filters).unwrap();
        for px in frame.data.chunks_exact(4) {
            assert_eq!(&px[..3], &[0, 0, 0]);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn grayscale_full_equalizes_channels() {
        let mut frame = solid(2, 2, [200, 50, 100, 255]);
        let filters = FilterSettings { grayscale: 100.0, ..Default::default() };
        apply_color_filters(&mut frame, &filters).unwrap();
        let px = &frame.data[..4];
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }

    #[test]
    fn hue_rotate_360_round_trips_within_rounding() {
        let mut frame = solid(2, 2, [180, 90, 30, 255]);
        let filters = FilterSettings { hue: 360.0, ..Default::default() };
        apply_color_filters(&mut frame, &filters).unwrap();
        for (got, want) in frame.data.iter().zip([180u8, 90, 30, 255].iter().cycle()) {
            assert!((i16::from(*got) - i16::from(*want)).abs() <= 2);
        }
    }

    #[test]
    fn blur_constant_image_is_identity() {
        let mut frame = solid(4, 3, [10, 20, 30, 255]);
        let before = frame.data.clone();
        blur_premul_in_place(&mut frame, 3, 2.0).unwrap();
        assert_eq!(frame.data, before);
    }

    #[test]
    fn blur_preserves_total_alpha_energy() {
        let mut frame = Frame::new(5, 5);
        let center = ((2 * 5 + 2) * 4) as usize;
        frame.data[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);
        blur_premul_in_place(&mut frame, 2, 1.2).unwrap();
        let nonzero = frame.data.chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(nonzero > 1);
        let sum_a: u32 = frame.data.chunks_exact(4).map(|px| u32::from(px[3])).sum();
        assert!((sum_a as i32 - 255).abs() <= 4);
    }

    #[test]
    fn grain_is_reproducible_for_a_fixed_nonce() {
        let mut a = solid(8, 8, [120, 120, 120, 255]);
        let mut b = solid(8, 8, [120, 120, 120, 255]);
        apply_grain(&mut a, 80.0, 42, 0);
        apply_grain(&mut b, 80.0, 42, 0);
        assert_eq!(a.data, b.data);

        let mut c = solid(8, 8, [120, 120, 120, 255]);
        apply_grain(&mut c, 80.0, 42, 1);
        assert_ne!(a.data, c.data);
    }

    #[test]
    fn grain_skips_transparent_pixels() {
        let mut frame = Frame::new(4, 4);
        apply_grain(&mut frame, 100.0, 7, 0);
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn vignette_darkens_corners_not_center_alpha() {
        let mut frame = solid(64, 64, [200, 200, 200, 255]);
        apply_vignette(&mut frame, 100.0);
        let corner = &frame.data[..4];
        let center_idx = ((32 * 64 + 32) * 4) as usize;
        let center = &frame.data[center_idx..center_idx + 4];
        assert!(corner[0] < center[0]);
        assert_eq!(corner[3], 255);
        assert_eq!(center[3], 255);
    }

    #[test]
    fn vignette_never_extends_alpha() {
        let mut frame = Frame::new(32, 32);
        apply_vignette(&mut frame, 100.0);
        assert!(frame.data.chunks_exact(4).all(|px| px[3] == 0));
    }
}
