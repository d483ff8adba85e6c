use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use stillmotion_core::{ProviderSettings, RemoteConfig, StillImage};

use crate::adapter::{encode_jpeg, HuggingFaceAdapter, ProviderAdapter, RawResponse, ReplicateAdapter, Upload};
use crate::error::SubmissionError;
use crate::polling::{PollSchedule, TaskPoll};
use crate::provider::Provider;
use crate::task::{SubmitOptions, TaskHandle, TaskStatus};

static REPLICATE: ReplicateAdapter = ReplicateAdapter;
static HUGGINGFACE: HuggingFaceAdapter = HuggingFaceAdapter;

/// Where and how to reach one provider. A missing token disables it.
#[derive(Debug, Clone, Default)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub token: Option<String>,
    pub model: String,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>, token: Option<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            model: model.into(),
        }
    }

    fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(&settings.base_url, settings.resolve_token(), &settings.model)
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Everything the poller needs, resolved up front.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub replicate: ProviderEndpoint,
    pub huggingface: ProviderEndpoint,
    /// Providers in the order `auto` mode tries them.
    pub order: Vec<Provider>,
    pub schedule: PollSchedule,
    /// Per-request timeout; HuggingFace answers only when the video is done.
    pub request_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            replicate: ProviderEndpoint::default(),
            huggingface: ProviderEndpoint::default(),
            order: Provider::ALL.to_vec(),
            schedule: PollSchedule::default(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl PollerConfig {
    /// Resolve tokens from the environment variables named in `config`.
    pub fn from_remote_config(config: &RemoteConfig) -> Self {
        let order = config
            .order
            .iter()
            .filter_map(|name| match name.parse::<Provider>() {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!("ignoring provider in remote.order: {}", e);
                    None
                }
            })
            .collect();
        Self {
            replicate: ProviderEndpoint::from_settings(&config.replicate),
            huggingface: ProviderEndpoint::from_settings(&config.huggingface),
            order,
            schedule: PollSchedule::new(
                Duration::from_secs(config.poll_interval_secs),
                config.max_attempts,
            ),
            ..Self::default()
        }
    }

    pub fn endpoint(&self, provider: Provider) -> &ProviderEndpoint {
        match provider {
            Provider::Replicate => &self.replicate,
            Provider::HuggingFace => &self.huggingface,
        }
    }
}

/// Submits jobs and checks their status, one request at a time.
pub struct RemoteTaskPoller {
    client: Client,
    config: PollerConfig,
}

impl RemoteTaskPoller {
    pub fn new(config: PollerConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn schedule(&self) -> &PollSchedule {
        &self.config.schedule
    }

    fn adapter(provider: Provider) -> &'static dyn ProviderAdapter {
        match provider {
            Provider::Replicate => &REPLICATE,
            Provider::HuggingFace => &HUGGINGFACE,
        }
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.config.endpoint(provider).token.is_some()
    }

    /// Enabled providers in configured order.
    pub fn enabled_providers(&self) -> Vec<Provider> {
        self.config
            .order
            .iter()
            .copied()
            .filter(|p| self.is_enabled(*p))
            .collect()
    }

    async fn send(request: RequestBuilder) -> Result<RawResponse, reqwest::Error> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    /// Submit one generation job. Exactly one request, never retried.
    pub async fn submit(
        &self,
        image: &StillImage,
        description: &str,
        provider: Provider,
        options: &SubmitOptions,
    ) -> Result<TaskHandle, SubmissionError> {
        let endpoint = self.config.endpoint(provider);
        let Some(token) = endpoint.token.as_deref() else {
            return Err(SubmissionError::ProviderDisabled(provider.to_string()));
        };
        let jpeg = encode_jpeg(image)?;
        let upload = Upload {
            jpeg: &jpeg,
            description,
            options,
        };
        let adapter = Self::adapter(provider);
        let request = adapter.build_submit_request(&self.client, endpoint, token, &upload);

        let response = Self::send(request)
            .await
            .map_err(|e| SubmissionError::ProviderUnreachable(e.to_string()))?;
        let handle = adapter.parse_submit_response(&response)?;
        tracing::info!(
            "Submitted job to {} (task {}, HTTP {})",
            provider,
            handle.task_id,
            response.status
        );
        Ok(handle)
    }

    /// One status check. Transport and HTTP failures come back as `Unknown`.
    pub async fn poll(&self, handle: &TaskHandle) -> TaskStatus {
        if let Some(output) = &handle.inline {
            return TaskStatus::Succeeded(output.clone());
        }
        let endpoint = self.config.endpoint(handle.provider);
        let Some(token) = endpoint.token.as_deref() else {
            return TaskStatus::Unknown;
        };
        let adapter = Self::adapter(handle.provider);
        let Some(request) = adapter.build_status_request(&self.client, endpoint, token, handle) else {
            return TaskStatus::Unknown;
        };
        match Self::send(request).await {
            Ok(response) => adapter.parse_status_response(&response),
            Err(e) => {
                tracing::debug!("status check for {} failed: {}", handle.task_id, e);
                TaskStatus::Unknown
            }
        }
    }
}

#[async_trait]
impl TaskPoll for RemoteTaskPoller {
    async fn poll(&self, handle: &TaskHandle) -> TaskStatus {
        RemoteTaskPoller::poll(self, handle).await
    }
}
