//! Pixel-level building blocks for the synthesizer.
//!
//! Whole-frame transforms take a source image and return a new one of the
//! same size. Band helpers mutate a freshly rendered frame in place and never
//! see the caller's source image.

use stillmotion_core::{Color, PixelFormat, StillImage};

/// Below this a rotation or zoom is treated as identity.
const IDENTITY_EPSILON: f32 = 1e-4;

fn center(img: &StillImage) -> (f32, f32) {
    ((img.width as f32 - 1.0) / 2.0, (img.height as f32 - 1.0) / 2.0)
}

/// Build a new image by inverse-mapping every destination pixel into `src`.
fn remap<F>(src: &StillImage, fill: [u8; 4], map: F) -> StillImage
where
    F: Fn(f32, f32) -> (f32, f32),
{
    let mut out = StillImage::new(src.width, src.height, PixelFormat::Rgba8);
    for y in 0..src.height {
        for x in 0..src.width {
            let (sx, sy) = map(x as f32, y as f32);
            let px = src.sample_bilinear(sx, sy).unwrap_or(fill);
            out.set_pixel(x, y, px);
        }
    }
    out
}

/// Scale up around the center by `scale` and crop back to the original size.
pub fn zoom_crop(src: &StillImage, scale: f32) -> StillImage {
    if (scale - 1.0).abs() < IDENTITY_EPSILON || scale <= 0.0 {
        return src.clone();
    }
    let (cx, cy) = center(src);
    remap(src, [0, 0, 0, 255], |x, y| {
        ((x - cx) / scale + cx, (y - cy) / scale + cy)
    })
}

/// Rotate around the center; exposed corners take `fill`.
pub fn rotate(src: &StillImage, degrees: f32, fill: &Color) -> StillImage {
    if degrees.abs() < IDENTITY_EPSILON {
        return src.clone();
    }
    let (cx, cy) = center(src);
    let (sin, cos) = (-degrees.to_radians()).sin_cos();
    remap(src, fill.to_rgba8(), |x, y| {
        let (dx, dy) = (x - cx, y - cy);
        (dx * cos - dy * sin + cx, dx * sin + dy * cos + cy)
    })
}

/// Shift the whole frame by whole pixels; exposed edges take `fill`.
pub fn translate(src: &StillImage, dx: i32, dy: i32, fill: &Color) -> StillImage {
    if dx == 0 && dy == 0 {
        return src.clone();
    }
    let fill = fill.to_rgba8();
    let mut out = StillImage::new(src.width, src.height, PixelFormat::Rgba8);
    for y in 0..src.height as i32 {
        for x in 0..src.width as i32 {
            let (sx, sy) = (x - dx, y - dy);
            let px = if sx < 0 || sy < 0 {
                None
            } else {
                src.get_pixel(sx as u32, sy as u32)
            };
            out.set_pixel(x as u32, y as u32, px.unwrap_or(fill));
        }
    }
    out
}

#[inline]
fn scale_channel(value: u8, factor: f32) -> u8 {
    (value as f32 * factor).round().clamp(0.0, 255.0) as u8
}

/// Multiply RGB by `factor`, leaving alpha untouched.
pub fn adjust_brightness(src: &StillImage, factor: f32) -> StillImage {
    let mut out = src.clone();
    scale_rows(&mut out, 0, src.height, [factor; 3]);
    out
}

/// Push colors away from (factor > 1) or toward (factor < 1) their luma.
pub fn adjust_saturation(src: &StillImage, factor: f32) -> StillImage {
    let mut out = src.clone();
    if (factor - 1.0).abs() < IDENTITY_EPSILON {
        return out;
    }
    for px in out.data.chunks_exact_mut(4) {
        let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
        for c in px.iter_mut().take(3) {
            *c = (luma + (*c as f32 - luma) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Multiply each RGB channel of rows `[y0, y1)` by its own factor.
pub fn scale_rows(img: &mut StillImage, y0: u32, y1: u32, factors: [f32; 3]) {
    if factors.iter().all(|f| (f - 1.0).abs() < IDENTITY_EPSILON) {
        return;
    }
    let stride = img.width as usize * 4;
    let (y0, y1) = (y0.min(img.height) as usize, y1.min(img.height) as usize);
    for px in img.data[y0 * stride..y1 * stride].chunks_exact_mut(4) {
        for c in 0..3 {
            px[c] = scale_channel(px[c], factors[c]);
        }
    }
}

/// Shift rows `[y0, y1)` horizontally by `dx` pixels, clamping at the edges
/// so no empty stripe opens up inside the band.
pub fn shift_band(img: &mut StillImage, y0: u32, y1: u32, dx: i32) {
    if dx == 0 || img.width == 0 {
        return;
    }
    for y in y0..y1.min(img.height) {
        shift_row(img, y, dx);
    }
}

fn shift_row(img: &mut StillImage, y: u32, dx: i32) {
    let stride = img.width as usize * 4;
    let start = y as usize * stride;
    let row = img.data[start..start + stride].to_vec();
    let max_x = img.width as i32 - 1;
    for x in 0..img.width as i32 {
        let sx = (x - dx).clamp(0, max_x) as usize;
        let dst = start + x as usize * 4;
        img.data[dst..dst + 4].copy_from_slice(&row[sx * 4..sx * 4 + 4]);
    }
}

/// Horizontal ripple: each row in `[y0, y1)` shifts by
/// `amplitude * sin(2π·y / wavelength)` pixels.
pub fn ripple_band(img: &mut StillImage, y0: u32, y1: u32, amplitude: f32, wavelength: f32) {
    if amplitude.abs() < 0.5 || wavelength <= 0.0 {
        return;
    }
    for y in y0..y1.min(img.height) {
        let dx = (amplitude * (std::f32::consts::TAU * y as f32 / wavelength).sin()).round();
        if dx != 0.0 {
            shift_row(img, y, dx as i32);
        }
    }
}

/// Multiply the rectangle `[x0, x1) × [y0, y1)` by `factor`.
pub fn darken_rect(img: &mut StillImage, x0: u32, y0: u32, x1: u32, y1: u32, factor: f32) {
    for y in y0..y1.min(img.height) {
        for x in x0..x1.min(img.width) {
            if let Some(px) = img.get_pixel(x, y) {
                img.set_pixel(
                    x,
                    y,
                    [
                        scale_channel(px[0], factor),
                        scale_channel(px[1], factor),
                        scale_channel(px[2], factor),
                        px[3],
                    ],
                );
            }
        }
    }
}

/// Gaussian blur restricted to rows `[y0, y1)`.
pub fn blur_band(img: &mut StillImage, y0: u32, y1: u32, sigma: f32) {
    let y1 = y1.min(img.height);
    if y0 >= y1 || sigma <= 0.0 {
        return;
    }
    let stride = img.width as usize * 4;
    let range = y0 as usize * stride..y1 as usize * stride;
    let Some(band) = image::RgbaImage::from_raw(img.width, y1 - y0, img.data[range.clone()].to_vec())
    else {
        return;
    };
    let blurred = image::imageops::blur(&band, sigma);
    img.data[range].copy_from_slice(blurred.as_raw());
}

/// Transparent overlay of horizontal bands whose opacity follows a vertical
/// sine wave, shifted by `offset` radians.
pub fn sine_bands(
    width: u32,
    height: u32,
    color: &Color,
    max_alpha: f32,
    period: f32,
    offset: f32,
) -> StillImage {
    let mut overlay = StillImage::new(width, height, PixelFormat::Rgba8);
    let [r, g, b, _] = color.to_rgba8();
    let stride = width as usize * 4;
    for y in 0..height {
        let wave = (std::f32::consts::TAU * y as f32 / period + offset).sin().max(0.0);
        let alpha = (wave * max_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
        if alpha == 0 {
            continue;
        }
        let start = y as usize * stride;
        for px in overlay.data[start..start + stride].chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, alpha]);
        }
    }
    overlay
}
