use std::io::Write;

use image::codecs::gif::{GifEncoder as ImageGifEncoder, Repeat};
use stillmotion_core::{StillImage, StillmotionError, StillmotionResult};

/// In-memory looping GIF encoder built on the `image` crate.
pub struct GifEncoder;

impl GifEncoder {
    /// GIF delays are stored in centiseconds; browsers clamp anything
    /// shorter than 2cs.
    pub fn delay_cs(frame_interval_ms: u32) -> u16 {
        ((frame_interval_ms as f64 / 10.0).round() as u16).max(2)
    }

    /// Encode RGBA frames into GIF bytes that loop forever.
    pub fn encode(frames: &[StillImage], frame_interval_ms: u32) -> StillmotionResult<Vec<u8>> {
        let mut bytes = Vec::new();
        Self::encode_to(&mut bytes, frames, frame_interval_ms)?;
        Ok(bytes)
    }

    fn encode_to<W: Write>(
        writer: W,
        frames: &[StillImage],
        frame_interval_ms: u32,
    ) -> StillmotionResult<()> {
        let Some(first) = frames.first() else {
            return Err(StillmotionError::EncodingFailure("no frames to encode for GIF".into()));
        };
        let (width, height) = (first.width, first.height);
        let delay_cs = Self::delay_cs(frame_interval_ms);

        let mut encoder = ImageGifEncoder::new_with_speed(writer, 10);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| StillmotionError::EncodingFailure(format!("failed to set GIF repeat: {}", e)))?;

        for (i, frame) in frames.iter().enumerate() {
            if frame.width != width || frame.height != height {
                return Err(StillmotionError::EncodingFailure(format!(
                    "frame {} has dimensions {}x{}, expected {}x{}",
                    i, frame.width, frame.height, width, height
                )));
            }

            let rgba = frame.to_rgba();
            let buffer = image::RgbaImage::from_raw(width, height, rgba.data).ok_or_else(|| {
                StillmotionError::EncodingFailure(format!("invalid frame data at frame {}", i))
            })?;
            let gif_frame = image::Frame::from_parts(
                buffer,
                0,
                0,
                image::Delay::from_numer_denom_ms(delay_cs as u32 * 10, 1),
            );

            encoder.encode_frame(gif_frame).map_err(|e| {
                StillmotionError::EncodingFailure(format!("failed to encode GIF frame {}: {}", i, e))
            })?;
        }

        tracing::info!(
            "Encoded {} frames to GIF ({}x{}, delay={}cs)",
            frames.len(),
            width,
            height,
            delay_cs,
        );
        Ok(())
    }
}
