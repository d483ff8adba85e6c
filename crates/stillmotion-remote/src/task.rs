use crate::provider::Provider;

/// Generation parameters forwarded to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOptions {
    pub duration_secs: u32,
    pub fps: u32,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            duration_secs: 3,
            fps: 8,
        }
    }
}

/// Where a finished remote job put its video.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutput {
    Url(String),
    Bytes { bytes: Vec<u8>, content_type: String },
}

/// Opaque reference to a submitted job.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHandle {
    pub task_id: String,
    pub provider: Provider,
    /// Set when the provider answered the submission with the result itself.
    pub inline: Option<RemoteOutput>,
}

impl TaskHandle {
    pub fn new(task_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            task_id: task_id.into(),
            provider,
            inline: None,
        }
    }

    pub fn completed(task_id: impl Into<String>, provider: Provider, output: RemoteOutput) -> Self {
        Self {
            task_id: task_id.into(),
            provider,
            inline: Some(output),
        }
    }
}

/// Result of one status check.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Succeeded(RemoteOutput),
    Failed(Option<String>),
    /// The check itself failed; treated like `Pending`.
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded(_) | TaskStatus::Failed(_))
    }
}

/// Polling-side record of a job. Once terminal it never changes again.
#[derive(Debug, Clone)]
pub struct RemoteTask {
    pub handle: TaskHandle,
    status: TaskStatus,
    attempts: u32,
}

impl RemoteTask {
    pub fn new(handle: TaskHandle) -> Self {
        Self {
            handle,
            status: TaskStatus::Pending,
            attempts: 0,
        }
    }

    /// Record a poll result. Returns `false` and keeps the old status if
    /// the task already reached a terminal status.
    pub fn record(&mut self, status: TaskStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.attempts += 1;
        self.status = status;
        true
    }

    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn result_location(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Succeeded(RemoteOutput::Url(url)) => Some(url),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_monotonic() {
        let mut task = RemoteTask::new(TaskHandle::new("abc", Provider::Replicate));
        assert!(task.record(TaskStatus::Unknown));
        assert!(task.record(TaskStatus::Pending));
        assert!(task.record(TaskStatus::Succeeded(RemoteOutput::Url("https://x/v.mp4".into()))));
        assert!(!task.record(TaskStatus::Failed(None)));
        assert!(!task.record(TaskStatus::Pending));

        assert_eq!(task.attempts(), 3);
        assert_eq!(task.result_location(), Some("https://x/v.mp4"));
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut task = RemoteTask::new(TaskHandle::new("abc", Provider::Replicate));
        task.record(TaskStatus::Failed(Some("nsfw".into())));
        assert!(task.is_terminal());
        assert_eq!(task.result_location(), None);
    }
}
