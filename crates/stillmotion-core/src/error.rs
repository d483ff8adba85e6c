/// Core error types for stillmotion.
use std::path::PathBuf;

/// A specialized Result type for stillmotion operations.
pub type StillmotionResult<T> = Result<T, StillmotionError>;

/// Top-level error type shared by the classifier, synthesizer and encoders.
#[derive(Debug, thiserror::Error)]
pub enum StillmotionError {
    /// Rejected before any work was done (blank description, empty image, zero frames).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The polling budget ran out before the remote task reached a terminal status.
    #[error("remote task {task_id} did not finish after {attempts} polling attempts")]
    Timeout { task_id: String, attempts: u32 },

    #[error("generation cancelled")]
    Cancelled,

    /// Neither the video nor the image encoder produced output.
    #[error("encoding failed: {0}")]
    EncodingFailure(String),

    /// A remote provider refused or failed the job.
    #[error("remote provider error: {0}")]
    Remote(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("asset error: {message} ({path:?})")]
    Asset { message: String, path: PathBuf },

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StillmotionError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StillmotionError::InvalidInput(message.into())
    }

    /// Create an asset error.
    pub fn asset(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        StillmotionError::Asset {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Whether this error should be shown to the user as-is instead of
    /// triggering another fallback path.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StillmotionError::InvalidInput(_)
                | StillmotionError::Timeout { .. }
                | StillmotionError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let err = StillmotionError::invalid_input("motion description is empty");
        assert_eq!(err.to_string(), "invalid input: motion description is empty");
    }

    #[test]
    fn test_timeout_display() {
        let err = StillmotionError::Timeout {
            task_id: "abc".into(),
            attempts: 60,
        };
        assert_eq!(
            err.to_string(),
            "remote task abc did not finish after 60 polling attempts"
        );
        assert!(err.is_terminal());
    }

    #[test]
    fn test_asset_error_display() {
        let err = StillmotionError::asset("file not found", "/uploads/photo.jpg");
        assert!(err.to_string().contains("file not found"));
        assert!(!err.is_terminal());
    }
}
