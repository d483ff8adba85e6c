//! Content hashing for synthesized frames.
//!
//! Produces a SHA-256 digest of image data so seeded syntheses can be
//! compared bit-for-bit across runs.

use sha2::{Digest, Sha256};

use crate::frame::StillImage;

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Short prefix used in log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn update_with_image(hasher: &mut Sha256, image: &StillImage) {
    // Dimensions and format are part of the digest so equal bytes at
    // different sizes do not collide.
    hasher.update(image.width.to_le_bytes());
    hasher.update(image.height.to_le_bytes());
    hasher.update([image.format as u8]);
    hasher.update(&image.data);
}

fn finish(hasher: Sha256) -> ContentHash {
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    ContentHash::from_bytes(bytes)
}

/// Compute the content hash of an ordered frame sequence.
pub fn hash_frames(frames: &[StillImage]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update((frames.len() as u64).to_le_bytes());
    for frame in frames {
        update_with_image(&mut hasher, frame);
    }
    finish(hasher)
}
