use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use stillmotion_core::{StillImage, StillmotionError, StillmotionResult};

/// Encoder that shells out to FFmpeg for H.264 encoding.
pub struct FfmpegEncoder;

impl FfmpegEncoder {
    /// Check if FFmpeg is available on the system.
    pub fn is_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn temp_output() -> PathBuf {
        std::env::temp_dir().join(format!("stillmotion_{}.mp4", uuid::Uuid::new_v4()))
    }

    /// Encode RGBA frames to constant-frame-rate H.264 MP4 bytes.
    ///
    /// libx264 with yuv420p needs even dimensions, so odd sizes are
    /// truncated by one pixel inside ffmpeg.
    pub fn encode(frames: &[StillImage], fps: f64) -> StillmotionResult<Vec<u8>> {
        let Some(first) = frames.first() else {
            return Err(StillmotionError::EncodingFailure("no frames to encode".into()));
        };
        if !Self::is_available() {
            return Err(StillmotionError::EncodingFailure(
                "ffmpeg not found in PATH".into(),
            ));
        }
        let (width, height) = (first.width, first.height);
        let output_path = Self::temp_output();
        let result = Self::run(frames, width, height, fps, &output_path)
            .and_then(|_| std::fs::read(&output_path).map_err(StillmotionError::from));
        let _ = std::fs::remove_file(&output_path);
        let bytes = result?;

        tracing::info!(
            "Encoded {} frames to MP4 ({}x{} @ {:.2}fps, {} bytes)",
            frames.len(),
            width,
            height,
            fps,
            bytes.len()
        );
        Ok(bytes)
    }

    fn run(
        frames: &[StillImage],
        width: u32,
        height: u32,
        fps: f64,
        output_path: &std::path::Path,
    ) -> StillmotionResult<()> {
        let fps_str = format!("{}", fps);

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y");
        cmd.args([
            "-f", "rawvideo",
            "-pixel_format", "rgba",
            "-video_size", &format!("{}x{}", width, height),
            "-framerate", &fps_str,
            "-i", "-",
        ]);
        cmd.args([
            "-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2",
            "-c:v", "libx264",
            "-pix_fmt", "yuv420p",
            "-preset", "medium",
            "-crf", "23",
            "-movflags", "+faststart",
        ]);
        cmd.arg(output_path);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StillmotionError::EncodingFailure(format!("failed to start ffmpeg: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StillmotionError::EncodingFailure("failed to open ffmpeg stdin".into()))?;

        for (i, frame) in frames.iter().enumerate() {
            if frame.width != width || frame.height != height {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(StillmotionError::EncodingFailure(format!(
                    "frame {} has dimensions {}x{}, expected {}x{}",
                    i, frame.width, frame.height, width, height
                )));
            }
            let rgba = frame.to_rgba();
            if let Err(e) = stdin.write_all(&rgba.data) {
                // The pipe breaks when ffmpeg exits early; its stderr says why.
                drop(stdin);
                let stderr = child
                    .wait_with_output()
                    .map(|o| String::from_utf8_lossy(&o.stderr).into_owned())
                    .unwrap_or_default();
                return Err(StillmotionError::EncodingFailure(format!(
                    "failed to write frame {} to ffmpeg: {}. FFmpeg stderr: {}",
                    i, e, stderr
                )));
            }
        }

        drop(stdin);

        let output = child
            .wait_with_output()
            .map_err(|e| StillmotionError::EncodingFailure(format!("ffmpeg process error: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StillmotionError::EncodingFailure(format!(
                "ffmpeg failed with status {}: {}",
                output.status, stderr
            )));
        }
        Ok(())
    }
}
