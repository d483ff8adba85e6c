use chrono::{DateTime, Local};
use serde::Serialize;

/// Container format of an encoded animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Gif,
    Mp4,
}

impl ContainerKind {
    pub fn mime(&self) -> &'static str {
        match self {
            ContainerKind::Gif => "image/gif",
            ContainerKind::Mp4 => "video/mp4",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ContainerKind::Gif => "gif",
            ContainerKind::Mp4 => "mp4",
        }
    }

    /// Parse a `Content-Type` value, ignoring parameters and case.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("image/gif") {
            Some(ContainerKind::Gif)
        } else if essence.eq_ignore_ascii_case("video/mp4") {
            Some(ContainerKind::Mp4)
        } else {
            None
        }
    }

    /// Identify a container from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ContainerKind::Gif)
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            Some(ContainerKind::Mp4)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// `animation_YYYYMMDD_HHMMSS.<extension>`.
pub fn timestamped_filename(at: &DateTime<Local>, extension: &str) -> String {
    format!("animation_{}.{}", at.format("%Y%m%d_%H%M%S"), extension)
}

/// File extension for a downloaded result: the declared content type first,
/// then the byte signature, then the `video/*` subtype, else `bin`.
pub fn extension_for(content_type: &str, bytes: &[u8]) -> String {
    if let Some(kind) = ContainerKind::from_mime(content_type).or_else(|| ContainerKind::detect(bytes)) {
        return kind.extension().to_string();
    }
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.strip_prefix("video/") {
        Some(sub) if !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()) => {
            sub.to_string()
        }
        _ => "bin".to_string(),
    }
}

/// Timestamped name for a result downloaded from a provider.
pub fn remote_filename(content_type: &str, bytes: &[u8]) -> String {
    timestamped_filename(&Local::now(), &extension_for(content_type, bytes))
}

/// Encoded animation ready to be written out or streamed.
#[derive(Debug, Clone)]
pub struct AnimatedArtifact {
    pub kind: ContainerKind,
    pub bytes: Vec<u8>,
    pub frame_count: usize,
    pub frame_interval_ms: u32,
    pub created_at: DateTime<Local>,
}

impl AnimatedArtifact {
    pub fn new(kind: ContainerKind, bytes: Vec<u8>, frame_count: usize, frame_interval_ms: u32) -> Self {
        Self {
            kind,
            bytes,
            frame_count,
            frame_interval_ms,
            created_at: Local::now(),
        }
    }

    pub fn mime(&self) -> &'static str {
        self.kind.mime()
    }

    /// `animation_YYYYMMDD_HHMMSS.{gif,mp4}` from the creation time.
    pub fn suggested_filename(&self) -> String {
        timestamped_filename(&self.created_at, self.kind.extension())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
