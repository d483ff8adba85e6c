//! Request pipeline: remote providers first, local synthesis as the fallback.

use std::str::FromStr;

use stillmotion_core::{classify, Color, StillImage, StillmotionError, StillmotionResult, SynthesisConfig};
use stillmotion_encode::{encode_sequence, AnimatedArtifact};
use stillmotion_remote::{
    cancelled, wait_for_completion, PollError, PollProgress, Provider, RemoteOutput, RemoteTaskPoller,
    SubmitOptions,
};
use stillmotion_render::image_loader::resize_to_fit;
use stillmotion_render::{synthesize_frames, Jitter, SynthesisSettings};
use tokio::sync::watch;

/// Which backends a request may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChoice {
    /// Every enabled provider in configured order, then local.
    Auto,
    /// One provider, then local.
    Only(Provider),
    /// Skip remote providers entirely.
    Local,
}

impl FromStr for ProviderChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ProviderChoice::Auto),
            "local" => Ok(ProviderChoice::Local),
            other => other.parse::<Provider>().map(ProviderChoice::Only),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub image: StillImage,
    pub description: String,
    pub duration_secs: u32,
    pub fps: u32,
    pub provider: ProviderChoice,
}

/// Knobs for the local fallback.
#[derive(Debug, Clone)]
pub struct LocalSettings {
    pub frame_count_min: u32,
    pub frame_count_max: u32,
    pub background: Color,
    pub prefer_video: bool,
    /// Longest-side cap for the source; `0` disables downscaling.
    pub max_dimension: u32,
    /// Fixed jitter seed for reproducible output.
    pub jitter_seed: Option<u64>,
}

impl LocalSettings {
    pub fn from_config(config: &SynthesisConfig) -> StillmotionResult<Self> {
        Ok(Self {
            frame_count_min: config.frame_count_min,
            frame_count_max: config.frame_count_max,
            background: config.background_color()?,
            prefer_video: config.prefer_video,
            max_dimension: config.max_dimension,
            jitter_seed: None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum GenerateOutput {
    RemoteUrl {
        provider: Provider,
        url: String,
    },
    RemoteBytes {
        provider: Provider,
        bytes: Vec<u8>,
        content_type: String,
    },
    Local(AnimatedArtifact),
}

/// Classify, render and encode on the current thread.
///
/// Frames keep the source dimensions unless `settings.max_dimension` is set.
pub fn synthesize_local(
    image: &StillImage,
    description: &str,
    duration_secs: u32,
    fps: u32,
    settings: &LocalSettings,
) -> StillmotionResult<AnimatedArtifact> {
    let plan = classify(description)?;
    let resized;
    let source = if settings.max_dimension > 0 {
        resized = resize_to_fit(image, settings.max_dimension, settings.max_dimension);
        &resized
    } else {
        image
    };
    let synthesis = SynthesisSettings::for_duration(
        duration_secs,
        fps,
        settings.frame_count_min,
        settings.frame_count_max,
    )
    .with_background(settings.background);
    let mut jitter = settings.jitter_seed.map(Jitter::seeded).unwrap_or_default();
    let sequence = synthesize_frames(source, &plan, &synthesis, &mut jitter)?;
    encode_sequence(&sequence, settings.prefer_video)
}

/// Run one request end to end.
///
/// Submission errors and remote failures move on to the next provider and
/// finally to local synthesis. A polling timeout or cancellation is returned
/// as-is without producing anything. The cancel token is observed while a
/// submission is in flight and while frames are being synthesized.
pub async fn generate<F>(
    request: GenerateRequest,
    poller: &RemoteTaskPoller,
    settings: &LocalSettings,
    cancel: &mut watch::Receiver<bool>,
    mut progress: F,
) -> StillmotionResult<GenerateOutput>
where
    F: FnMut(Provider, PollProgress),
{
    if request.description.trim().is_empty() {
        return Err(StillmotionError::invalid_input(
            "motion description must not be blank",
        ));
    }

    let providers = match request.provider {
        ProviderChoice::Auto => poller.enabled_providers(),
        ProviderChoice::Only(provider) => vec![provider],
        ProviderChoice::Local => Vec::new(),
    };
    let options = SubmitOptions {
        duration_secs: request.duration_secs,
        fps: request.fps,
    };

    for provider in providers {
        if *cancel.borrow() {
            return Err(StillmotionError::Cancelled);
        }
        let submitted = tokio::select! {
            result = poller.submit(&request.image, &request.description, provider, &options) => result,
            _ = cancelled(cancel) => {
                tracing::warn!("{} submission abandoned: cancelled", provider);
                return Err(StillmotionError::Cancelled);
            }
        };
        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("{} submission failed, trying next backend: {}", provider, e);
                continue;
            }
        };

        let result = wait_for_completion(poller, &handle, poller.schedule(), cancel, |p| {
            progress(provider, p)
        })
        .await;
        match result {
            Ok(RemoteOutput::Url(url)) => {
                tracing::info!("{} finished: {}", provider, url);
                return Ok(GenerateOutput::RemoteUrl { provider, url });
            }
            Ok(RemoteOutput::Bytes {
                bytes,
                content_type,
            }) => {
                tracing::info!("{} returned {} bytes of {}", provider, bytes.len(), content_type);
                return Ok(GenerateOutput::RemoteBytes {
                    provider,
                    bytes,
                    content_type,
                });
            }
            Err(failed @ PollError::Failed { .. }) => {
                tracing::warn!("{}, trying next backend", failed);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if *cancel.borrow() {
        return Err(StillmotionError::Cancelled);
    }
    tracing::info!("Falling back to local synthesis");
    let settings = settings.clone();
    let synthesis = tokio::task::spawn_blocking(move || {
        synthesize_local(
            &request.image,
            &request.description,
            request.duration_secs,
            request.fps,
            &settings,
        )
    });
    // A cancelled render keeps its blocking thread until it finishes; the
    // result is dropped.
    let artifact = tokio::select! {
        joined = synthesis => joined
            .map_err(|e| StillmotionError::Render(format!("synthesis task failed: {}", e)))??,
        _ = cancelled(cancel) => return Err(StillmotionError::Cancelled),
    };
    Ok(GenerateOutput::Local(artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use stillmotion_encode::ContainerKind;
    use stillmotion_remote::{PollSchedule, PollerConfig, ProviderEndpoint};

    fn start_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut data = Vec::new();
                let mut buf = [0u8; 16 * 1024];
                // Read the whole request so the client never sees a reset.
                while let Ok(n) = stream.read(&mut buf) {
                    if n == 0 {
                        break;
                    }
                    data.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&data).to_string();
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text[..end]
                            .lines()
                            .filter_map(|l| l.split_once(':'))
                            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if data.len() >= end + 4 + length {
                            break;
                        }
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let resp = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes());
            }
        });

        (format!("http://{}", addr), hits)
    }

    fn poller(base_url: &str) -> RemoteTaskPoller {
        RemoteTaskPoller::new(PollerConfig {
            replicate: ProviderEndpoint::new(base_url, Some("r8_test".into()), "v"),
            huggingface: ProviderEndpoint::new(base_url, None, "m"),
            schedule: PollSchedule::new(Duration::from_millis(1), 60),
            ..PollerConfig::default()
        })
    }

    fn settings() -> LocalSettings {
        LocalSettings {
            frame_count_min: 6,
            frame_count_max: 25,
            background: Color::BLACK,
            prefer_video: false,
            max_dimension: 0,
            jitter_seed: Some(7),
        }
    }

    fn request(description: &str, provider: ProviderChoice) -> GenerateRequest {
        GenerateRequest {
            image: StillImage::solid(40, 30, &Color::rgb(0.2, 0.6, 0.9)),
            description: description.to_string(),
            duration_secs: 3,
            fps: 12,
            provider,
        }
    }

    #[test]
    fn test_provider_choice_parsing() {
        assert_eq!("auto".parse::<ProviderChoice>().unwrap(), ProviderChoice::Auto);
        assert_eq!("LOCAL".parse::<ProviderChoice>().unwrap(), ProviderChoice::Local);
        assert_eq!(
            "replicate".parse::<ProviderChoice>().unwrap(),
            ProviderChoice::Only(Provider::Replicate)
        );
        assert!("sora".parse::<ProviderChoice>().is_err());
    }

    #[tokio::test]
    async fn test_blank_description_is_invalid_input() {
        let (_tx, mut rx) = watch::channel(false);
        let err = generate(
            request("   ", ProviderChoice::Auto),
            &poller("http://127.0.0.1:9"),
            &settings(),
            &mut rx,
            |_, _| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StillmotionError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_auth_rejected_falls_back_to_local() {
        let (url, hits) = start_server(vec![(401, r#"{"detail":"Unauthenticated"}"#)]);
        let (_tx, mut rx) = watch::channel(false);
        let output = generate(
            request("Камера повільно наближається", ProviderChoice::Auto),
            &poller(&url),
            &settings(),
            &mut rx,
            |_, _| {},
        )
        .await
        .unwrap();

        let GenerateOutput::Local(artifact) = output else {
            panic!("expected a local artifact, got {:?}", output);
        };
        assert_eq!(artifact.kind, ContainerKind::Gif);
        assert_eq!(ContainerKind::detect(&artifact.bytes), Some(ContainerKind::Gif));
        assert_eq!(artifact.frame_count, 25);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local() {
        let (url, hits) = start_server(vec![
            (201, r#"{"id":"p1"}"#),
            (200, r#"{"status":"failed","error":"out of memory"}"#),
        ]);
        let (_tx, mut rx) = watch::channel(false);
        let output = generate(
            request("waves on water", ProviderChoice::Only(Provider::Replicate)),
            &poller(&url),
            &settings(),
            &mut rx,
            |_, _| {},
        )
        .await
        .unwrap();
        assert!(matches!(output, GenerateOutput::Local(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remote_success_returns_url_and_reports_progress() {
        let (url, _) = start_server(vec![
            (201, r#"{"id":"p2"}"#),
            (200, r#"{"status":"processing"}"#),
            (200, r#"{"status":"succeeded","output":"https://cdn/p2.mp4"}"#),
        ]);
        let (_tx, mut rx) = watch::channel(false);
        let mut attempts = Vec::new();
        let output = generate(
            request("sway in the wind", ProviderChoice::Auto),
            &poller(&url),
            &settings(),
            &mut rx,
            |provider, p| attempts.push((provider, p.attempt)),
        )
        .await
        .unwrap();

        assert!(matches!(
            output,
            GenerateOutput::RemoteUrl { provider: Provider::Replicate, ref url } if url == "https://cdn/p2.mp4"
        ));
        assert_eq!(attempts, vec![(Provider::Replicate, 1), (Provider::Replicate, 2)]);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_without_local_fallback() {
        let mut responses = vec![(201, r#"{"id":"p3"}"#)];
        responses.extend(std::iter::repeat((200, r#"{"status":"processing"}"#)).take(60));
        let (url, _) = start_server(responses);
        let (_tx, mut rx) = watch::channel(false);
        let err = generate(
            request("camera zoom", ProviderChoice::Auto),
            &poller(&url),
            &settings(),
            &mut rx,
            |_, _| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StillmotionError::Timeout { attempts: 60, .. }));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_submission() {
        // Accepts connections into the backlog but never answers.
        let silent = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", silent.local_addr().unwrap());
        let hf_poller = RemoteTaskPoller::new(PollerConfig {
            huggingface: ProviderEndpoint::new(&base_url, Some("hf_test".into()), "m"),
            ..PollerConfig::default()
        });
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            generate(
                request("waves", ProviderChoice::Only(Provider::HuggingFace)),
                &hf_poller,
                &settings(),
                &mut rx,
                |_, _| {},
            ),
        )
        .await
        .expect("cancellation should end the submission");

        assert!(matches!(result, Err(StillmotionError::Cancelled)));
        drop(silent);
    }

    #[tokio::test]
    async fn test_cancelled_before_local_synthesis() {
        let (_tx, mut rx) = watch::channel(true);
        let err = generate(
            request("a quiet portrait", ProviderChoice::Local),
            &poller("http://127.0.0.1:9"),
            &settings(),
            &mut rx,
            |_, _| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StillmotionError::Cancelled));
    }

    #[tokio::test]
    async fn test_local_only_skips_network() {
        let (_tx, mut rx) = watch::channel(false);
        let output = generate(
            request("a quiet portrait", ProviderChoice::Local),
            &poller("http://127.0.0.1:9"),
            &settings(),
            &mut rx,
            |_, _| {},
        )
        .await
        .unwrap();
        assert!(matches!(output, GenerateOutput::Local(ref a) if a.frame_interval_ms == 120));
    }

    /// Frame count and per-frame dimensions of an encoded GIF.
    fn decode_gif(bytes: &[u8]) -> (usize, Vec<(u32, u32)>) {
        use image::AnimationDecoder;
        let decoder = image::codecs::gif::GifDecoder::new(std::io::Cursor::new(bytes)).unwrap();
        let frames = decoder.into_frames().collect_frames().unwrap();
        let dims = frames.iter().map(|f| f.buffer().dimensions()).collect();
        (frames.len(), dims)
    }

    #[test]
    fn test_synthesize_local_keeps_source_dimensions() {
        let image = StillImage::solid(800, 600, &Color::rgb(0.2, 0.6, 0.9));
        let artifact =
            synthesize_local(&image, "Камера повільно наближається", 3, 12, &settings()).unwrap();

        assert_eq!(artifact.kind, ContainerKind::Gif);
        let (count, dims) = decode_gif(&artifact.bytes);
        assert_eq!(count, 25);
        assert!(dims.iter().all(|d| *d == (800, 600)), "{:?}", dims.first());
    }

    #[test]
    fn test_default_config_does_not_downscale() {
        let config = SynthesisConfig::default();
        let mut s = LocalSettings::from_config(&config).unwrap();
        s.prefer_video = false;
        let image = StillImage::solid(1200, 40, &Color::WHITE);
        let artifact = synthesize_local(&image, "a quiet portrait", 2, 8, &s).unwrap();
        let (_, dims) = decode_gif(&artifact.bytes);
        assert_eq!(dims[0], (1200, 40));
    }

    #[test]
    fn test_max_dimension_caps_source_when_set() {
        let mut s = settings();
        s.max_dimension = 32;
        let image = StillImage::solid(128, 64, &Color::WHITE);
        let artifact = synthesize_local(&image, "flicker", 2, 8, &s).unwrap();
        assert_eq!(artifact.frame_count, 16);
        let (_, dims) = decode_gif(&artifact.bytes);
        assert_eq!(dims[0], (32, 16));
    }
}
