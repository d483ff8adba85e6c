//! # stillmotion-core
//!
//! Core types and primitives shared by every stillmotion crate:
//! still images, colors, motion classification, configuration, content
//! hashes and the error taxonomy.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod motion;

pub use config::*;

pub use color::Color;
pub use error::{StillmotionError, StillmotionResult};
pub use frame::{PixelFormat, StillImage};
pub use motion::{classify, MotionCategory, MotionPlan};
