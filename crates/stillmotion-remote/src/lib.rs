//! # stillmotion-remote
//!
//! Submits image-to-video jobs to remote providers and polls them to a
//! terminal status. One generic poller drives every provider through the
//! `ProviderAdapter` seam; the polling loop itself is caller-owned and
//! cancellable.

pub mod adapter;
pub mod error;
pub mod poller;
pub mod polling;
pub mod provider;
pub mod task;

pub use adapter::{encode_jpeg, HuggingFaceAdapter, ProviderAdapter, RawResponse, ReplicateAdapter, Upload};
pub use error::{PollError, SubmissionError};
pub use poller::{PollerConfig, ProviderEndpoint, RemoteTaskPoller};
pub use polling::{cancelled, wait_for_completion, PollProgress, PollSchedule, TaskPoll};
pub use provider::Provider;
pub use task::{RemoteOutput, RemoteTask, SubmitOptions, TaskHandle, TaskStatus};
