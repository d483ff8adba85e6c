//! Table-driven frame synthesis.
//!
//! Frame `i` of `N` is derived from the source image alone: the dominant
//! effect builds a new frame, then every active region effect mutates that
//! fresh frame in a fixed order. All oscillations are driven by
//! `phase = 2π·i/N` so the sequence loops, and every effect is at rest at
//! `i = 0`.

use std::f32::consts::TAU;

use rayon::prelude::*;
use stillmotion_core::hash::{self, ContentHash};
use stillmotion_core::{
    Color, MotionCategory, MotionPlan, StillImage, StillmotionError, StillmotionResult,
};

use crate::effects;
use crate::jitter::Jitter;

/// Frame count and timing for one synthesis run.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisSettings {
    pub frame_count: u32,
    pub frame_interval_ms: u32,
    /// Fill for areas exposed by rotation or translation.
    pub background: Color,
}

impl SynthesisSettings {
    /// Derive settings from a target duration and frame rate.
    ///
    /// The frame count is `duration·fps` clamped to `[min_frames, max_frames]`;
    /// the interval spreads the duration over those frames, rounded to the
    /// 10 ms GIF delay resolution and never below 20 ms.
    pub fn for_duration(duration_secs: u32, fps: u32, min_frames: u32, max_frames: u32) -> Self {
        let frame_count = duration_secs
            .saturating_mul(fps)
            .clamp(min_frames.max(1), max_frames.max(min_frames.max(1)));
        let raw_ms = duration_secs as f64 * 1000.0 / frame_count as f64;
        let frame_interval_ms = (((raw_ms / 10.0).round() as u32) * 10).max(20);
        Self {
            frame_count,
            frame_interval_ms,
            background: Color::BLACK,
        }
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }
}

/// Ordered, non-empty list of same-sized frames plus their display interval.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<StillImage>,
    pub frame_interval_ms: u32,
}

impl FrameSequence {
    pub fn new(frames: Vec<StillImage>, frame_interval_ms: u32) -> StillmotionResult<Self> {
        let Some(first) = frames.first() else {
            return Err(StillmotionError::invalid_input("frame sequence is empty"));
        };
        if let Some((i, _)) = frames.iter().enumerate().find(|(_, f)| !f.same_size(first)) {
            return Err(StillmotionError::Render(format!(
                "frame {} is {}x{}, expected {}x{}",
                i, frames[i].width, frames[i].height, first.width, first.height
            )));
        }
        Ok(Self {
            frames,
            frame_interval_ms,
        })
    }

    pub fn frames(&self) -> &[StillImage] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.frames[0].width
    }

    pub fn height(&self) -> u32 {
        self.frames[0].height
    }

    /// Playback rate implied by the interval.
    pub fn fps(&self) -> f64 {
        1000.0 / self.frame_interval_ms.max(1) as f64
    }

    pub fn content_hash(&self) -> ContentHash {
        hash::hash_frames(&self.frames)
    }
}

/// Per-frame inputs shared by every effect.
struct FrameContext {
    index: u32,
    phase: f32,
    jitter: f32,
    background: Color,
}

impl FrameContext {
    /// 0 at the first frame, 1 halfway through, back to 0 at the loop point.
    fn envelope(&self) -> f32 {
        (1.0 - self.phase.cos()) / 2.0
    }
}

type DominantEffect = fn(&StillImage, &FrameContext) -> StillImage;
type RegionEffect = fn(&mut StillImage, &FrameContext);

const DOMINANT_EFFECTS: &[(MotionCategory, DominantEffect)] = &[
    (MotionCategory::CameraMove, camera_move),
    (MotionCategory::Sway, sway),
    (MotionCategory::Flow, flow),
    (MotionCategory::Flicker, flicker),
    (MotionCategory::DefaultPulse, pulse),
];

/// Application order for overlapping region masks.
const REGION_EFFECTS: &[(MotionCategory, RegionEffect)] = &[
    (MotionCategory::HairRegion, hair),
    (MotionCategory::ClothRegion, cloth),
    (MotionCategory::WaterRegion, water),
    (MotionCategory::FireRegion, fire),
    (MotionCategory::EyesRegion, eyes),
    (MotionCategory::SmokeRegion, smoke),
];

fn camera_move(src: &StillImage, ctx: &FrameContext) -> StillImage {
    effects::zoom_crop(src, 1.0 + 0.008 * ctx.index as f32)
}

fn sway(src: &StillImage, ctx: &FrameContext) -> StillImage {
    effects::rotate(src, 1.5 * ctx.phase.sin(), &ctx.background)
}

fn flow(src: &StillImage, ctx: &FrameContext) -> StillImage {
    let amp_x = (src.width as f32 * 0.012).max(1.0);
    let amp_y = (src.height as f32 * 0.008).max(1.0);
    let dx = (amp_x * ctx.phase.sin()).round() as i32;
    let dy = (amp_y * (2.0 * ctx.phase).sin()).round() as i32;
    effects::translate(src, dx, dy, &ctx.background)
}

fn flicker(src: &StillImage, ctx: &FrameContext) -> StillImage {
    let brightness = 1.0 + 0.08 * (3.0 * ctx.phase).sin() + 0.025 * ctx.jitter;
    let lit = effects::adjust_brightness(src, brightness);
    effects::adjust_saturation(&lit, 1.0 + 0.12 * ctx.envelope())
}

fn pulse(src: &StillImage, ctx: &FrameContext) -> StillImage {
    effects::adjust_brightness(src, 1.0 + 0.03 * ctx.phase.sin())
}

fn band_offset(frame: &StillImage, fraction: f32, wave: f32) -> i32 {
    ((frame.width as f32 * fraction).max(1.0) * wave).round() as i32
}

fn hair(frame: &mut StillImage, ctx: &FrameContext) {
    let dx = band_offset(frame, 0.01, ctx.phase.sin());
    effects::shift_band(frame, 0, frame.height / 3, dx);
}

fn cloth(frame: &mut StillImage, ctx: &FrameContext) {
    // Counter-phase to the hair band.
    let dx = band_offset(frame, 0.008, -ctx.phase.sin());
    effects::shift_band(frame, frame.height / 3, frame.height * 2 / 3, dx);
}

fn water(frame: &mut StillImage, ctx: &FrameContext) {
    let (top, bottom) = (frame.height / 2, frame.height);
    let amplitude = (frame.height as f32 * 0.006).max(1.0) * ctx.phase.sin();
    let wavelength = (frame.height as f32 / 12.0).max(8.0);
    effects::ripple_band(frame, top, bottom, amplitude, wavelength);
    if ctx.index % 4 == 3 {
        effects::blur_band(frame, top, bottom, 0.8);
    }
}

fn fire(frame: &mut StillImage, ctx: &FrameContext) {
    let env = ctx.envelope();
    let b = 1.0 + 0.06 * (3.0 * ctx.phase).sin() + 0.03 * ctx.jitter * env;
    let warm = 0.05 * env;
    effects::scale_rows(
        frame,
        frame.height / 2,
        frame.height,
        [b * (1.0 + warm), b, b * (1.0 - warm)],
    );
    if ctx.index % 3 == 2 {
        effects::blur_band(frame, frame.height / 2, frame.height, 0.6);
    }
}

fn eyes(frame: &mut StillImage, ctx: &FrameContext) {
    if ctx.index % 12 != 11 {
        return;
    }
    let (w, h) = (frame.width as f32, frame.height as f32);
    effects::darken_rect(
        frame,
        (w * 0.3) as u32,
        (h * 0.3) as u32,
        (w * 0.7).ceil() as u32,
        (h * 0.45).ceil() as u32,
        0.35,
    );
}

fn smoke(frame: &mut StillImage, ctx: &FrameContext) {
    let max_alpha = 0.22 * ctx.envelope();
    if max_alpha <= 0.0 {
        return;
    }
    let period = (frame.height as f32 / 4.0).max(8.0);
    let overlay = effects::sine_bands(
        frame.width,
        frame.height,
        &Color::SMOKE,
        max_alpha,
        period,
        ctx.index as f32 * 0.6,
    );
    frame.composite_over(&overlay, 0, 0);
}

fn render_frame(source: &StillImage, plan: &MotionPlan, ctx: &FrameContext) -> StillImage {
    let dominant = DOMINANT_EFFECTS
        .iter()
        .find(|(category, _)| *category == plan.dominant)
        .map(|(_, effect)| *effect)
        .unwrap_or(pulse);
    let mut frame = dominant(source, ctx);
    for (category, effect) in REGION_EFFECTS {
        if plan.has_region(*category) {
            effect(&mut frame, ctx);
        }
    }
    frame
}

/// Produce `settings.frame_count` frames of the source image animated per
/// `plan`. The source is never modified; every frame has its dimensions.
pub fn synthesize_frames(
    source: &StillImage,
    plan: &MotionPlan,
    settings: &SynthesisSettings,
    jitter: &mut Jitter,
) -> StillmotionResult<FrameSequence> {
    if settings.frame_count == 0 {
        return Err(StillmotionError::invalid_input("frame count must be positive"));
    }
    if source.is_empty() {
        return Err(StillmotionError::invalid_input("source image is empty"));
    }

    let source = source.to_rgba();
    let count = settings.frame_count;
    // Drawn up front so parallel rendering cannot reorder the random stream.
    let jitters = jitter.per_frame(count as usize);

    tracing::info!(
        "Synthesizing {} frames ({}x{}) for {} with regions {:?}",
        count,
        source.width,
        source.height,
        plan.dominant,
        plan.regions
    );

    let frames: Vec<StillImage> = (0..count)
        .into_par_iter()
        .map(|index| {
            let ctx = FrameContext {
                index,
                phase: TAU * index as f32 / count as f32,
                jitter: jitters[index as usize],
                background: settings.background,
            };
            render_frame(&source, plan, &ctx)
        })
        .collect();

    let sequence = FrameSequence::new(frames, settings.frame_interval_ms)?;
    tracing::debug!("frame sequence hash {}", sequence.content_hash().short());
    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> StillImage {
        let mut img = StillImage::solid(width, height, &Color::BLACK);
        for y in 0..height {
            for x in 0..width {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                img.set_pixel(x, y, [r, g, 120, 255]);
            }
        }
        img
    }

    fn settings(frames: u32) -> SynthesisSettings {
        SynthesisSettings {
            frame_count: frames,
            frame_interval_ms: 100,
            background: Color::BLACK,
        }
    }

    fn everything(dominant: MotionCategory) -> MotionPlan {
        [
            MotionCategory::HairRegion,
            MotionCategory::ClothRegion,
            MotionCategory::WaterRegion,
            MotionCategory::FireRegion,
            MotionCategory::EyesRegion,
            MotionCategory::SmokeRegion,
        ]
        .into_iter()
        .fold(MotionPlan::new(dominant), |plan, r| plan.with_region(r))
    }

    #[test]
    fn test_for_duration_defaults() {
        let s = SynthesisSettings::for_duration(3, 12, 6, 25);
        assert_eq!(s.frame_count, 25);
        assert_eq!(s.frame_interval_ms, 120);

        let s = SynthesisSettings::for_duration(2, 8, 6, 25);
        assert_eq!(s.frame_count, 16);
        assert_eq!(s.frame_interval_ms, 130);
    }

    #[test]
    fn test_for_duration_clamps_low() {
        let s = SynthesisSettings::for_duration(0, 8, 6, 25);
        assert_eq!(s.frame_count, 6);
        assert_eq!(s.frame_interval_ms, 20);
    }

    #[test]
    fn test_frame_count_and_size_for_every_dominant() {
        let src = gradient(48, 36);
        for (category, _) in DOMINANT_EFFECTS {
            let seq = synthesize_frames(&src, &everything(*category), &settings(12), &mut Jitter::default())
                .unwrap();
            assert_eq!(seq.len(), 12);
            assert!(seq.frames().iter().all(|f| f.width == 48 && f.height == 36));
        }
    }

    #[test]
    fn test_first_frame_matches_source() {
        let src = gradient(64, 48);
        for (category, _) in DOMINANT_EFFECTS {
            let seq = synthesize_frames(&src, &everything(*category), &settings(24), &mut Jitter::seeded(3))
                .unwrap();
            let delta = seq.frames()[0].max_channel_delta(&src).unwrap();
            assert!(delta <= 8, "{} frame 0 differs by {}", category, delta);
        }
    }

    #[test]
    fn test_non_jittered_first_frame_is_exact() {
        let src = gradient(30, 30);
        let plan = MotionPlan::new(MotionCategory::Sway).with_region(MotionCategory::HairRegion);
        let seq = synthesize_frames(&src, &plan, &settings(10), &mut Jitter::default()).unwrap();
        assert_eq!(seq.frames()[0], src);
    }

    #[test]
    fn test_source_is_not_modified() {
        let src = gradient(20, 20);
        let copy = src.clone();
        synthesize_frames(&src, &everything(MotionCategory::Flicker), &settings(8), &mut Jitter::default())
            .unwrap();
        assert_eq!(src, copy);
    }

    #[test]
    fn test_seeded_synthesis_is_reproducible() {
        let src = gradient(32, 24);
        let plan = everything(MotionCategory::Flicker);
        let a = synthesize_frames(&src, &plan, &settings(16), &mut Jitter::seeded(42)).unwrap();
        let b = synthesize_frames(&src, &plan, &settings(16), &mut Jitter::seeded(42)).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_pulse_brightens_at_quarter_phase() {
        let src = StillImage::solid(8, 8, &Color::rgb(100.0 / 255.0, 100.0 / 255.0, 100.0 / 255.0));
        let seq = synthesize_frames(&src, &MotionPlan::default(), &settings(24), &mut Jitter::default())
            .unwrap();
        assert_eq!(seq.frames()[6].get_pixel(0, 0), Some([103, 103, 103, 255]));
        assert_eq!(seq.frames()[18].get_pixel(0, 0), Some([97, 97, 97, 255]));
    }

    #[test]
    fn test_eyes_blink_only_on_eleventh_frame() {
        let src = StillImage::solid(40, 40, &Color::WHITE);
        let plan = MotionPlan::new(MotionCategory::Sway).with_region(MotionCategory::EyesRegion);
        let seq = synthesize_frames(&src, &plan, &settings(24), &mut Jitter::default()).unwrap();

        let center = |i: usize| seq.frames()[i].get_pixel(20, 14).unwrap();
        assert_eq!(center(11), [89, 89, 89, 255]);
        assert_eq!(center(23)[0], 89);
        assert_eq!(center(10), [255, 255, 255, 255]);
        assert_eq!(center(12), [255, 255, 255, 255]);
    }

    #[test]
    fn test_camera_move_pushes_in() {
        let src = gradient(60, 40);
        let plan = MotionPlan::new(MotionCategory::CameraMove);
        let seq = synthesize_frames(&src, &plan, &settings(20), &mut Jitter::default()).unwrap();
        assert_ne!(seq.frames()[19], seq.frames()[0]);
        // Zooming pulls the left edge toward the center color.
        let left0 = seq.frames()[0].get_pixel(0, 20).unwrap()[0];
        let left19 = seq.frames()[19].get_pixel(0, 20).unwrap()[0];
        assert!(left19 > left0);
    }

    #[test]
    fn test_zero_frames_rejected() {
        let src = gradient(4, 4);
        let err = synthesize_frames(&src, &MotionPlan::default(), &settings(0), &mut Jitter::default())
            .unwrap_err();
        assert!(matches!(err, StillmotionError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_image_rejected() {
        let src = StillImage::solid(0, 0, &Color::BLACK);
        let err = synthesize_frames(&src, &MotionPlan::default(), &settings(6), &mut Jitter::default())
            .unwrap_err();
        assert!(matches!(err, StillmotionError::InvalidInput(_)));
    }

    #[test]
    fn test_sequence_rejects_mixed_sizes() {
        let frames = vec![gradient(4, 4), gradient(5, 4)];
        assert!(FrameSequence::new(frames, 100).is_err());
        assert!(FrameSequence::new(Vec::new(), 100).is_err());
    }
}
