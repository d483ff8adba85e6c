//! The caller-owned polling loop.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::PollError;
use crate::task::{RemoteOutput, RemoteTask, TaskHandle, TaskStatus};

/// Anything that can check a task's status once.
#[async_trait]
pub trait TaskPoll: Send + Sync {
    async fn poll(&self, handle: &TaskHandle) -> TaskStatus;
}

/// Fixed-interval polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollSchedule {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 60)
    }
}

/// Reported once per attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollProgress {
    pub attempt: u32,
    pub max_attempts: u32,
    pub elapsed: Duration,
}

impl PollProgress {
    pub fn fraction(&self) -> f32 {
        self.attempt as f32 / self.max_attempts.max(1) as f32
    }
}

/// Resolves once the token reads `true`. A dropped sender never cancels.
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Poll `handle` until it succeeds, fails, the attempt budget runs out or
/// `cancel` flips to `true`.
///
/// No status request is issued after a terminal status, and there is no
/// sleep after the last attempt. Cancellation sends nothing to the provider.
pub async fn wait_for_completion<P, F>(
    poller: &P,
    handle: &TaskHandle,
    schedule: &PollSchedule,
    cancel: &mut watch::Receiver<bool>,
    mut on_progress: F,
) -> Result<RemoteOutput, PollError>
where
    P: TaskPoll + ?Sized,
    F: FnMut(PollProgress),
{
    let started = Instant::now();
    let mut task = RemoteTask::new(handle.clone());

    for attempt in 1..=schedule.max_attempts {
        if *cancel.borrow() {
            return Err(PollError::Cancelled);
        }
        let status = tokio::select! {
            status = poller.poll(handle) => status,
            _ = cancelled(cancel) => return Err(PollError::Cancelled),
        };
        tracing::debug!(
            "poll {}/{} for {} task {}: {:?}",
            attempt,
            schedule.max_attempts,
            handle.provider,
            handle.task_id,
            status
        );
        task.record(status);
        on_progress(PollProgress {
            attempt,
            max_attempts: schedule.max_attempts,
            elapsed: started.elapsed(),
        });

        match task.status() {
            TaskStatus::Succeeded(output) => return Ok(output.clone()),
            TaskStatus::Failed(reason) => {
                return Err(PollError::Failed {
                    task_id: handle.task_id.clone(),
                    reason: reason.clone(),
                })
            }
            TaskStatus::Pending | TaskStatus::Unknown => {}
        }

        if attempt < schedule.max_attempts {
            tokio::select! {
                _ = tokio::time::sleep(schedule.interval) => {}
                _ = cancelled(cancel) => return Err(PollError::Cancelled),
            }
        }
    }

    Err(PollError::Timeout {
        task_id: handle.task_id.clone(),
        attempts: schedule.max_attempts,
    })
}
