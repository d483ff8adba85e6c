//! # stillmotion-encode
//!
//! Packages a synthesized frame sequence into an `AnimatedArtifact`.
//! H.264 MP4 through an FFmpeg subprocess when it is installed and
//! preferred, otherwise a looping GIF encoded in memory.

pub mod artifact;
pub mod ffmpeg;
pub mod gif;

pub use artifact::{
    extension_for, remote_filename, timestamped_filename, AnimatedArtifact, ContainerKind,
};
pub use ffmpeg::FfmpegEncoder;
pub use gif::GifEncoder;

use stillmotion_core::{StillmotionError, StillmotionResult};
use stillmotion_render::FrameSequence;

/// Encode a frame sequence, trying MP4 first when `prefer_video` is set.
///
/// A missing or failing FFmpeg degrades to GIF; only when the GIF encoder
/// fails as well is `EncodingFailure` returned.
pub fn encode_sequence(
    sequence: &FrameSequence,
    prefer_video: bool,
) -> StillmotionResult<AnimatedArtifact> {
    let frame_count = sequence.len();
    let interval = sequence.frame_interval_ms;

    let video_error = if prefer_video {
        match FfmpegEncoder::encode(sequence.frames(), sequence.fps()) {
            Ok(bytes) => {
                return Ok(AnimatedArtifact::new(ContainerKind::Mp4, bytes, frame_count, interval))
            }
            Err(e) => {
                tracing::warn!("MP4 encoding unavailable, falling back to GIF: {}", e);
                Some(e)
            }
        }
    } else {
        None
    };

    match GifEncoder::encode(sequence.frames(), interval) {
        Ok(bytes) => Ok(AnimatedArtifact::new(ContainerKind::Gif, bytes, frame_count, interval)),
        Err(gif_error) => Err(StillmotionError::EncodingFailure(match video_error {
            Some(video_error) => format!("video: {}; gif: {}", video_error, gif_error),
            None => gif_error.to_string(),
        })),
    }
}
