use serde::{Deserialize, Serialize};

use crate::{StillmotionError, StillmotionResult};

/// Pixel format (color mode) of a still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (4 bytes per pixel).
    Rgba8,
    /// 8-bit RGB (3 bytes per pixel, no alpha).
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// An immutable-by-convention pixel raster.
///
/// Transforms never touch a source image; they build a new `StillImage`
/// and only mutate that fresh buffer before handing it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillImage {
    /// Raw pixel data, row-major.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
}

impl StillImage {
    /// Create an image filled with zeros (transparent black).
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            data: vec![0u8; size],
            width,
            height,
            format,
        }
    }

    /// Create an RGBA image filled with a solid color.
    pub fn solid(width: u32, height: u32, color: &crate::Color) -> Self {
        let pixel = color.to_rgba8();
        let pixel_count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&pixel);
        }
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        }
    }

    /// Wrap an existing RGBA buffer, checking its length.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> StillmotionResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(StillmotionError::Render(format!(
                "RGBA buffer has {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        })
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Same dimensions as `other`.
    pub fn same_size(&self, other: &StillImage) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Convert to RGBA, copying when the image is already RGBA.
    pub fn to_rgba(&self) -> StillImage {
        match self.format {
            PixelFormat::Rgba8 => self.clone(),
            PixelFormat::Rgb8 => {
                let mut data = Vec::with_capacity(self.pixel_count() * 4);
                for px in self.data.chunks_exact(3) {
                    data.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
                StillImage {
                    data,
                    width: self.width,
                    height: self.height,
                    format: PixelFormat::Rgba8,
                }
            }
        }
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * bpp;
        match self.format {
            PixelFormat::Rgba8 => Some([
                self.data[offset],
                self.data[offset + 1],
                self.data[offset + 2],
                self.data[offset + 3],
            ]),
            PixelFormat::Rgb8 => Some([
                self.data[offset],
                self.data[offset + 1],
                self.data[offset + 2],
                255,
            ]),
        }
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * bpp;
        self.data[offset..offset + 3].copy_from_slice(&rgba[..3]);
        if self.format == PixelFormat::Rgba8 {
            self.data[offset + 3] = rgba[3];
        }
    }

    /// Bilinear sample at a fractional pixel-center coordinate.
    ///
    /// Returns `None` when the coordinate falls outside the image, so the
    /// caller decides how exposed areas are filled.
    pub fn sample_bilinear(&self, fx: f32, fy: f32) -> Option<[u8; 4]> {
        if self.is_empty() {
            return None;
        }
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        if fx < -0.5 || fy < -0.5 || fx > max_x + 0.5 || fy > max_y + 0.5 {
            return None;
        }
        let fx = fx.clamp(0.0, max_x);
        let fy = fy.clamp(0.0, max_y);
        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let p00 = self.get_pixel(x0, y0)?;
        let p10 = self.get_pixel(x1, y0)?;
        let p01 = self.get_pixel(x0, y1)?;
        let p11 = self.get_pixel(x1, y1)?;

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = p00[c] as f32 + (p10[c] as f32 - p00[c] as f32) * tx;
            let bottom = p01[c] as f32 + (p11[c] as f32 - p01[c] as f32) * tx;
            out[c] = (top + (bottom - top) * ty).round().clamp(0.0, 255.0) as u8;
        }
        Some(out)
    }

    /// Largest per-channel difference against another image of the same size.
    pub fn max_channel_delta(&self, other: &StillImage) -> Option<u8> {
        if !self.same_size(other) || self.format != other.format {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a.abs_diff(*b))
                .max()
                .unwrap_or(0),
        )
    }

    /// Alpha-composite `src` on top of `self` at position (dx, dy).
    /// Integer math laid out so the inner loop auto-vectorizes.
    pub fn composite_over(&mut self, src: &StillImage, dx: i32, dy: i32) {
        if self.format != PixelFormat::Rgba8 || src.format != PixelFormat::Rgba8 {
            return;
        }

        let dst_width = self.width as i32;
        let dst_height = self.height as i32;

        let mut start_y = 0;
        let mut end_y = src.height as i32;
        let mut start_x = 0;
        let mut end_x = src.width as i32;

        if dy < 0 {
            start_y = -dy;
        }
        if dy + end_y > dst_height {
            end_y = dst_height - dy;
        }
        if dx < 0 {
            start_x = -dx;
        }
        if dx + end_x > dst_width {
            end_x = dst_width - dx;
        }

        if start_x >= end_x || start_y >= end_y {
            return;
        }

        let src_stride = (src.width * 4) as usize;
        let dst_stride = (self.width * 4) as usize;

        for sy in start_y..end_y {
            let dst_y = dy + sy;
            let src_row_start = (sy as usize * src_stride) + (start_x as usize * 4);
            let dst_row_start = (dst_y as usize * dst_stride) + ((dx + start_x) as usize * 4);
            let len = (end_x - start_x) as usize * 4;

            let src_slice = &src.data[src_row_start..src_row_start + len];
            let dst_slice = &mut self.data[dst_row_start..dst_row_start + len];

            for (s, d) in src_slice.chunks_exact(4).zip(dst_slice.chunks_exact_mut(4)) {
                let sa = s[3] as u32;
                if sa == 0 {
                    continue;
                }
                if sa == 255 {
                    d.copy_from_slice(s);
                    continue;
                }

                let da = d[3] as u32;
                let inv_sa = 255 - sa;
                let out_a = sa + ((da * inv_sa) / 255);

                if out_a == 0 {
                    continue;
                }

                for c in 0..3 {
                    let blended =
                        (s[c] as u32 * sa * 255 + d[c] as u32 * da * inv_sa) / (out_a * 255);
                    d[c] = blended.min(255) as u8;
                }
                d[3] = out_a as u8;
            }
        }
    }
}
