//! Provider adapters.
//!
//! Each adapter knows one provider's request shapes and status vocabulary.
//! Adapters never perform I/O themselves: they build `reqwest` requests and
//! parse already-read responses, so parsing is testable without a server.

use std::io::Cursor;

use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use stillmotion_core::StillImage;

use crate::error::SubmissionError;
use crate::poller::ProviderEndpoint;
use crate::provider::Provider;
use crate::task::{RemoteOutput, SubmitOptions, TaskHandle, TaskStatus};

const ID_FIELDS: &[&str] = &["id", "task_id", "taskId"];
const OUTPUT_FIELDS: &[&str] = &["output", "video_url", "result_url"];

/// Motion strength passed to Stable Video Diffusion.
const MOTION_BUCKET_ID: u32 = 127;

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".into()),
            body: value.to_string().into_bytes(),
        }
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("json"))
    }

    fn parse_json(&self) -> Result<Value, SubmissionError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| SubmissionError::MalformedResponse(format!("invalid JSON: {}", e)))
    }
}

/// What is being uploaded in one submission.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub jpeg: &'a [u8],
    pub description: &'a str,
    pub options: &'a SubmitOptions,
}

/// Provider-specific request construction and response interpretation.
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn build_submit_request(
        &self,
        client: &Client,
        endpoint: &ProviderEndpoint,
        token: &str,
        upload: &Upload<'_>,
    ) -> RequestBuilder;

    fn parse_submit_response(&self, response: &RawResponse) -> Result<TaskHandle, SubmissionError>;

    /// `None` when the provider has no status endpoint.
    fn build_status_request(
        &self,
        client: &Client,
        endpoint: &ProviderEndpoint,
        token: &str,
        handle: &TaskHandle,
    ) -> Option<RequestBuilder>;

    fn parse_status_response(&self, response: &RawResponse) -> TaskStatus;
}

/// Encode a still image as an RGB JPEG for upload.
pub fn encode_jpeg(image: &StillImage) -> Result<Vec<u8>, SubmissionError> {
    let rgba = image.to_rgba();
    let buffer = image::RgbaImage::from_raw(rgba.width, rgba.height, rgba.data)
        .ok_or_else(|| SubmissionError::Encoding("image buffer size mismatch".into()))?;
    let rgb = image::DynamicImage::ImageRgba8(buffer).to_rgb8();
    let mut bytes = Vec::new();
    {
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut bytes), 90);
        encoder
            .encode_image(&rgb)
            .map_err(|e| SubmissionError::Encoding(e.to_string()))?;
    }
    Ok(bytes)
}

/// Map the HTTP status of a submission onto a `SubmissionError`.
fn check_submit_status(response: &RawResponse) -> Result<(), SubmissionError> {
    match response.status {
        s if (200..300).contains(&s) => Ok(()),
        401 | 403 => Err(SubmissionError::AuthRejected(response.status)),
        s => Err(SubmissionError::Rejected(s)),
    }
}

/// First string value among `fields`, or the first string of an array value.
pub fn lookup_str(value: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    })
}

fn failure_reason(value: &Value) -> Option<String> {
    lookup_str(value, &["error", "detail", "message"])
}

/// Map a generic status word onto `TaskStatus`.
fn interpret_status(value: &Value) -> TaskStatus {
    let Some(status) = lookup_str(value, &["status", "state"]) else {
        return TaskStatus::Unknown;
    };
    match status.to_ascii_lowercase().as_str() {
        "starting" | "queued" | "pending" | "processing" | "running" | "in_progress" => {
            TaskStatus::Pending
        }
        "succeeded" | "success" | "completed" | "done" => match lookup_str(value, OUTPUT_FIELDS) {
            Some(url) => TaskStatus::Succeeded(RemoteOutput::Url(url)),
            None => TaskStatus::Failed(Some("task succeeded without an output".into())),
        },
        "failed" | "canceled" | "cancelled" | "error" => TaskStatus::Failed(failure_reason(value)),
        other => {
            tracing::debug!("unrecognized remote status '{}'", other);
            TaskStatus::Unknown
        }
    }
}

/// Replicate predictions API: JSON submission, id-based status polling.
pub struct ReplicateAdapter;

impl ProviderAdapter for ReplicateAdapter {
    fn provider(&self) -> Provider {
        Provider::Replicate
    }

    fn build_submit_request(
        &self,
        client: &Client,
        endpoint: &ProviderEndpoint,
        token: &str,
        upload: &Upload<'_>,
    ) -> RequestBuilder {
        let data_uri = format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(upload.jpeg)
        );
        let body = json!({
            "version": endpoint.model,
            "input": {
                "image": data_uri,
                "prompt": upload.description,
                "duration": upload.options.duration_secs,
                "fps": upload.options.fps,
            }
        });
        client
            .post(format!("{}/v1/predictions", endpoint.base()))
            .bearer_auth(token)
            .json(&body)
    }

    fn parse_submit_response(&self, response: &RawResponse) -> Result<TaskHandle, SubmissionError> {
        check_submit_status(response)?;
        let value = response.parse_json()?;
        let id = lookup_str(&value, ID_FIELDS)
            .ok_or_else(|| SubmissionError::MalformedResponse("response has no task id".into()))?;
        Ok(TaskHandle::new(id, Provider::Replicate))
    }

    fn build_status_request(
        &self,
        client: &Client,
        endpoint: &ProviderEndpoint,
        token: &str,
        handle: &TaskHandle,
    ) -> Option<RequestBuilder> {
        Some(
            client
                .get(format!("{}/v1/predictions/{}", endpoint.base(), handle.task_id))
                .bearer_auth(token),
        )
    }

    fn parse_status_response(&self, response: &RawResponse) -> TaskStatus {
        if !response.is_success() {
            return TaskStatus::Unknown;
        }
        match serde_json::from_slice::<Value>(&response.body) {
            Ok(value) => interpret_status(&value),
            Err(_) => TaskStatus::Unknown,
        }
    }
}

/// HuggingFace inference API: multipart upload answered synchronously with
/// the video itself.
pub struct HuggingFaceAdapter;

impl ProviderAdapter for HuggingFaceAdapter {
    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }

    fn build_submit_request(
        &self,
        client: &Client,
        endpoint: &ProviderEndpoint,
        token: &str,
        upload: &Upload<'_>,
    ) -> RequestBuilder {
        let form = reqwest::multipart::Form::new()
            .part(
                "inputs",
                reqwest::multipart::Part::bytes(upload.jpeg.to_vec()).file_name("image.jpg"),
            )
            .text(
                "parameters",
                json!({ "motion_bucket_id": MOTION_BUCKET_ID }).to_string(),
            );
        client
            .post(format!("{}/models/{}", endpoint.base(), endpoint.model))
            .bearer_auth(token)
            .multipart(form)
    }

    fn parse_submit_response(&self, response: &RawResponse) -> Result<TaskHandle, SubmissionError> {
        check_submit_status(response)?;
        let task_id = format!("hf-{}", uuid::Uuid::new_v4());
        if response.is_json() {
            let value = response.parse_json()?;
            let url = lookup_str(&value, OUTPUT_FIELDS).ok_or_else(|| {
                SubmissionError::MalformedResponse("JSON response has no output".into())
            })?;
            return Ok(TaskHandle::completed(task_id, Provider::HuggingFace, RemoteOutput::Url(url)));
        }
        if response.body.is_empty() {
            return Err(SubmissionError::MalformedResponse("empty response body".into()));
        }
        let output = RemoteOutput::Bytes {
            bytes: response.body.clone(),
            content_type: response
                .content_type
                .clone()
                .unwrap_or_else(|| "video/mp4".into()),
        };
        Ok(TaskHandle::completed(task_id, Provider::HuggingFace, output))
    }

    fn build_status_request(
        &self,
        _client: &Client,
        _endpoint: &ProviderEndpoint,
        _token: &str,
        _handle: &TaskHandle,
    ) -> Option<RequestBuilder> {
        None
    }

    fn parse_status_response(&self, _response: &RawResponse) -> TaskStatus {
        TaskStatus::Unknown
    }
}
