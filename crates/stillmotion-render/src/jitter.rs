//! Random jitter for the flicker-style effects.
//!
//! This is the one intentionally non-deterministic input of the
//! synthesizer. Production runs seed from OS entropy; tests and anyone who
//! needs reproducible output construct a seeded source.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used by `Jitter::default()` in test builds.
pub const TEST_SEED: u64 = 0x5EED_0F_F11C;

/// Injectable source of per-frame jitter values in `[-1.0, 1.0]`.
pub struct Jitter {
    rng: StdRng,
}

impl Jitter {
    /// Reproducible jitter.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Non-reproducible jitter seeded from the OS.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Next unit jitter value.
    pub fn next_unit(&mut self) -> f32 {
        self.rng.gen_range(-1.0f32..=1.0)
    }

    /// Draw one value per frame, in frame order.
    pub fn per_frame(&mut self, frame_count: usize) -> Vec<f32> {
        (0..frame_count).map(|_| self.next_unit()).collect()
    }
}

impl Default for Jitter {
    #[cfg(test)]
    fn default() -> Self {
        Self::seeded(TEST_SEED)
    }

    #[cfg(not(test))]
    fn default() -> Self {
        Self::from_entropy()
    }
}
