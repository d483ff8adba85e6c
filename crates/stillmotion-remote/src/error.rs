use stillmotion_core::StillmotionError;

/// Why a job could not be submitted. Submission is never retried.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("provider rejected the credentials (HTTP {0})")]
    AuthRejected(u16),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider rejected the job with HTTP {0}")]
    Rejected(u16),

    #[error("provider {0} is disabled (no token configured)")]
    ProviderDisabled(String),

    #[error("failed to prepare upload: {0}")]
    Encoding(String),
}

/// Why the polling loop stopped without a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("remote task {task_id} failed: {}", reason.as_deref().unwrap_or("no reason given"))]
    Failed {
        task_id: String,
        reason: Option<String>,
    },

    #[error("remote task {task_id} did not finish after {attempts} polling attempts")]
    Timeout { task_id: String, attempts: u32 },

    #[error("polling cancelled")]
    Cancelled,
}

impl From<SubmissionError> for StillmotionError {
    fn from(err: SubmissionError) -> Self {
        StillmotionError::Remote(err.to_string())
    }
}

impl From<PollError> for StillmotionError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Timeout { task_id, attempts } => StillmotionError::Timeout { task_id, attempts },
            PollError::Cancelled => StillmotionError::Cancelled,
            failed @ PollError::Failed { .. } => StillmotionError::Remote(failed.to_string()),
        }
    }
}
