use serde::{Deserialize, Serialize};

use crate::{Color, StillmotionError, StillmotionResult};

/// Default config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "stillmotion.config.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub frame_count_min: u32,
    pub frame_count_max: u32,
    pub default_fps: u32,
    pub default_duration_secs: u32,
    /// Fill color for corners and edges exposed by rotation or translation.
    pub background: String,
    /// Emit MP4 when ffmpeg is available instead of a GIF.
    pub prefer_video: bool,
    /// Optional cap on the longest side; sources above it are downscaled
    /// before synthesis. `0` keeps the source size.
    pub max_dimension: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            frame_count_min: 6,
            frame_count_max: 25,
            default_fps: 12,
            default_duration_secs: 3,
            background: "#000000".to_string(),
            prefer_video: true,
            max_dimension: 0,
        }
    }
}

impl SynthesisConfig {
    pub fn background_color(&self) -> StillmotionResult<Color> {
        Color::from_hex(&self.background).map_err(|e| {
            StillmotionError::Config(format!("synthesis.background '{}': {}", self.background, e))
        })
    }
}

/// Settings for one remote provider. The token itself never lives in the
/// file, only the name of the environment variable holding it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub base_url: String,
    pub token_env: String,
    /// Model version (Replicate) or model path (HuggingFace).
    pub model: String,
}

impl ProviderSettings {
    /// Read the token from the configured environment variable.
    /// Returns `None` when disabled, unset or blank.
    pub fn resolve_token(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

fn default_replicate() -> ProviderSettings {
    ProviderSettings {
        enabled: true,
        base_url: "https://api.replicate.com".to_string(),
        token_env: "REPLICATE_TOKEN".to_string(),
        model: "25a2413bf4e23c1cc6e5e07a9005c80b8c17d344a8a9bc4ed8e1fea5ed88d8a2".to_string(),
    }
}

fn default_huggingface() -> ProviderSettings {
    ProviderSettings {
        enabled: true,
        base_url: "https://api-inference.huggingface.co".to_string(),
        token_env: "HF_TOKEN".to_string(),
        model: "stabilityai/stable-video-diffusion-img2vid".to_string(),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub poll_interval_secs: u64,
    pub max_attempts: u32,
    /// Provider names tried in order: "replicate", "huggingface".
    pub order: Vec<String>,
    pub replicate: ProviderSettings,
    pub huggingface: ProviderSettings,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_attempts: 60,
            order: vec!["replicate".to_string(), "huggingface".to_string()],
            replicate: default_replicate(),
            huggingface: default_huggingface(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StillmotionConfig {
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl StillmotionConfig {
    pub fn load_from_file(path: &std::path::Path) -> StillmotionResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> StillmotionResult<Self> {
        let config: StillmotionConfig =
            toml::from_str(contents).map_err(|e| StillmotionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> StillmotionResult<()> {
        let s = &self.synthesis;
        if s.frame_count_min == 0 || s.frame_count_min > s.frame_count_max {
            return Err(StillmotionError::Config(format!(
                "synthesis frame count range {}..={} is invalid",
                s.frame_count_min, s.frame_count_max
            )));
        }
        if s.default_fps == 0 {
            return Err(StillmotionError::Config(
                "synthesis.default_fps must be positive".into(),
            ));
        }
        if self.remote.max_attempts == 0 {
            return Err(StillmotionError::Config(
                "remote.max_attempts must be positive".into(),
            ));
        }
        s.background_color()?;
        Ok(())
    }
}
