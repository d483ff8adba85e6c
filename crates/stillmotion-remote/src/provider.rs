use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Remote image-to-video services we know how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Replicate,
    HuggingFace,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Replicate, Provider::HuggingFace];
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Replicate => write!(f, "replicate"),
            Provider::HuggingFace => write!(f, "huggingface"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replicate" => Ok(Provider::Replicate),
            "huggingface" | "hugging_face" | "hf" => Ok(Provider::HuggingFace),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}
