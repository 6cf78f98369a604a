//! CPU transform stage and premultiplied source-over compositing.

use crate::{
    core::{Affine, Frame, Point},
    error::{MuralError, MuralResult},
    labs::TransformSettings,
};

pub type PremulRgba8 = [u8; 4];

/// Resample `src` through the canvas transform: rotate, then zoom, then pan,
/// all about the canvas center. Bilinear sampling, transparent outside the
/// source footprint. Identity settings return an untouched copy.
#[tracing::instrument(skip(src))]
pub fn apply_transform(src: &Frame, settings: &TransformSettings) -> Frame {
    if settings.is_identity() {
        return src.clone();
    }

    let w = src.width as f64;
    let h = src.height as f64;
    let center = Point::new(w / 2.0, h / 2.0);
    let pan_x = f64::from(settings.x) / 100.0 * w;
    let pan_y = f64::from(settings.y) / 100.0 * h;

    // Forward map: rotate and zoom about the center, then translate.
    let forward = Affine::translate((pan_x, pan_y))
        * Affine::translate(center.to_vec2())
        * Affine::scale(f64::from(settings.effective_zoom()))
        * Affine::rotate(f64::from(settings.rotation).to_radians())
        * Affine::translate(-center.to_vec2());
    let inverse = forward.inverse();

    let mut out = Frame::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let dst_center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let sample = inverse * dst_center;
            let px = sample_bilinear(src, sample.x - 0.5, sample.y - 0.5);
            let idx = ((y * src.width + x) as usize) * 4;
            out.data[idx..idx + 4].copy_from_slice(&px);
        }
    }
    out
}

/// Bilinear sample at fractional pixel coordinates; out-of-bounds taps read
/// as fully transparent. Premultiplied channels interpolate directly.
fn sample_bilinear(src: &Frame, x: f64, y: f64) -> PremulRgba8 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f32;
    let fy = (y - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let tap = |tx: i64, ty: i64| -> [f32; 4] {
        if tx < 0 || ty < 0 || tx >= i64::from(src.width) || ty >= i64::from(src.height) {
            return [0.0; 4];
        }
        let idx = ((ty as u32 * src.width + tx as u32) as usize) * 4;
        [
            f32::from(src.data[idx]),
            f32::from(src.data[idx + 1]),
            f32::from(src.data[idx + 2]),
            f32::from(src.data[idx + 3]),
        ]
    };

    let p00 = tap(x0, y0);
    let p10 = tap(x0 + 1, y0);
    let p01 = tap(x0, y0 + 1);
    let p11 = tap(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] + (p10[c] - p00[c]) * fx;
        let bottom = p01[c] + (p11[c] - p01[c]) * fx;
        out[c] = (top + (bottom - top) * fy + 0.5).clamp(0.0, 255.0) as u8;
    }
    out
}

/// Premultiplied source-over for one pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = mul_div255(u16::from(dst[3]), inv).saturating_add(sa);
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Source-over `src` onto `dst`, both premultiplied RGBA8 of equal size.
pub fn over_in_place(dst: &mut Frame, src: &Frame, opacity: f32) -> MuralResult<()> {
    if dst.width != src.width || dst.height != src.height {
        return Err(MuralError::evaluation(
            "over_in_place expects equal-sized frames",
        ));
    }
    for (d, s) in dst.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
