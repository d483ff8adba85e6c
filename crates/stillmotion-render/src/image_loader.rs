//! Image loading module.
//! Decodes uploaded PNG and JPEG files into RGBA `StillImage`s.

use std::path::Path;

use image::imageops::FilterType;
use stillmotion_core::{StillImage, StillmotionError};

fn from_dynamic(img: image::DynamicImage) -> Result<StillImage, StillmotionError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    StillImage::from_rgba(width, height, rgba.into_raw())
}

/// Load an image file and convert it to a `StillImage`.
pub fn load_image(path: &Path) -> Result<StillImage, StillmotionError> {
    let data = std::fs::read(path).map_err(|e| {
        StillmotionError::asset(
            format!("failed to read image '{}': {}", path.display(), e),
            path,
        )
    })?;
    load_image_from_bytes(&data).map_err(|e| match e {
        StillmotionError::Asset { message, .. } => StillmotionError::asset(
            format!("{} ('{}')", message, path.display()),
            path,
        ),
        other => other,
    })
}

/// Load an image from raw bytes (e.g., an upload body).
pub fn load_image_from_bytes(data: &[u8]) -> Result<StillImage, StillmotionError> {
    let img = image::load_from_memory(data).map_err(|e| {
        StillmotionError::asset(format!("failed to decode image: {}", e), "<memory>")
    })?;
    from_dynamic(img)
}

/// Shrink an image to fit within the given max dimensions, preserving
/// aspect ratio. Never upscales.
pub fn resize_to_fit(img: &StillImage, max_width: u32, max_height: u32) -> StillImage {
    if img.is_empty() {
        return img.clone();
    }
    let scale_x = max_width as f64 / img.width as f64;
    let scale_y = max_height as f64 / img.height as f64;
    let scale = scale_x.min(scale_y).min(1.0);

    let new_width = ((img.width as f64 * scale).round() as u32).max(1);
    let new_height = ((img.height as f64 * scale).round() as u32).max(1);

    if new_width == img.width && new_height == img.height {
        return img.clone();
    }

    let rgba = img.to_rgba();
    let Some(buffer) = image::RgbaImage::from_raw(rgba.width, rgba.height, rgba.data) else {
        return img.clone();
    };
    let resized = image::imageops::resize(&buffer, new_width, new_height, FilterType::Triangle);
    tracing::debug!(
        "resized source {}x{} -> {}x{}",
        img.width,
        img.height,
        new_width,
        new_height
    );
    StillImage {
        width: new_width,
        height: new_height,
        format: stillmotion_core::PixelFormat::Rgba8,
        data: resized.into_raw(),
    }
}
