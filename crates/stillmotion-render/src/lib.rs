//! # stillmotion-render
//!
//! The procedural frame synthesizer. Takes a still image and a motion plan
//! and produces a looping sequence of derived frames. CPU only; frames are
//! rendered in parallel.

pub mod effects;
pub mod image_loader;
pub mod jitter;
pub mod synth;

pub use jitter::Jitter;
pub use synth::{synthesize_frames, FrameSequence, SynthesisSettings};
