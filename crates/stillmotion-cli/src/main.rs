mod generate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stillmotion_core::{classify, StillmotionConfig, CONFIG_FILE_NAME};
use stillmotion_remote::{PollerConfig, Provider, RemoteTaskPoller};
use tokio::sync::watch;

use crate::generate::{GenerateOutput, GenerateRequest, LocalSettings, ProviderChoice};

#[derive(Parser)]
#[command(
    name = "stillmotion",
    version,
    about = "stillmotion: bring a still image to life from a motion description",
    long_about = "Turns a photo and a short motion description into a video.\nRemote image-to-video providers are used when a token is configured;\notherwise the image is animated locally into a looping GIF or MP4."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Animate a PNG or JPEG image
    Animate {
        /// Path to the source image
        #[arg()]
        image: PathBuf,

        /// Motion description, e.g. "Камера повільно наближається"
        #[arg(short, long)]
        prompt: String,

        /// Clip length in seconds (2-8)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(2..=8))]
        duration: Option<u32>,

        /// Frame rate: 8 (fast), 12 (standard) or 24 (high)
        #[arg(long, value_parser = ["8", "12", "24"])]
        fps: Option<String>,

        /// Backend: auto, replicate, huggingface or local
        #[arg(long, default_value = "auto")]
        provider: String,

        /// Output file path (default: animation_<timestamp>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Always emit a GIF for local synthesis, even if ffmpeg is available
        #[arg(long)]
        gif: bool,

        /// Fixed seed for the flicker jitter (reproducible local output)
        #[arg(long)]
        seed: Option<u64>,

        /// Config file (default: ./stillmotion.config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show which effects a motion description selects
    Classify {
        /// Motion description
        #[arg(required_unless_present = "examples")]
        text: Option<String>,

        /// Classify the built-in example descriptions instead
        #[arg(long)]
        examples: bool,
    },

    /// List remote providers and whether a token is configured
    Providers {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Display version and encoder info
    Info,
}

/// Sample descriptions shown by `classify --examples`.
const EXAMPLE_PROMPTS: &[&str] = &[
    "Камера повільно рухається вперед",
    "Легке хитання на вітрі",
    "М'які хвилі на воді",
    "Плавне обертання навколо об'єкта",
    "Частинки пилу літають у повітрі",
    "Мерехтливе світло і тіні",
    "Хмари повільно рухаються",
    "Відблиски грають на поверхні",
    "Листя трепеще на дереві",
    "Дим піднімається вгору",
];

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Animate {
            image,
            prompt,
            duration,
            fps,
            provider,
            output,
            gif,
            seed,
            config,
        } => {
            let config = load_config(config.as_deref());
            let fps = match fps {
                Some(f) => f.parse::<u32>().context("invalid --fps")?,
                None => config.synthesis.default_fps,
            };
            let duration = duration.unwrap_or(config.synthesis.default_duration_secs);
            let provider: ProviderChoice = provider
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            run_async(cmd_animate(AnimateArgs {
                image,
                prompt,
                duration,
                fps,
                provider,
                output,
                gif,
                seed,
                config,
            }))
        }
        Commands::Classify { text, examples } => cmd_classify(text, examples),
        Commands::Providers { config } => cmd_providers(&load_config(config.as_deref())),
        Commands::Info => cmd_info(),
    }
}

/// Best-effort config load: a missing or broken file falls back to defaults.
fn load_config(path: Option<&Path>) -> StillmotionConfig {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    if !path.exists() {
        return StillmotionConfig::default();
    }
    match StillmotionConfig::load_from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("ignoring {}: {}", path.display(), e);
            StillmotionConfig::default()
        }
    }
}

fn run_async<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;
    let result = runtime.block_on(future);
    // Do not wait on a render abandoned by Ctrl-C.
    runtime.shutdown_background();
    result
}

struct AnimateArgs {
    image: PathBuf,
    prompt: String,
    duration: u32,
    fps: u32,
    provider: ProviderChoice,
    output: Option<PathBuf>,
    gif: bool,
    seed: Option<u64>,
    config: StillmotionConfig,
}

async fn cmd_animate(args: AnimateArgs) -> Result<()> {
    let source = stillmotion_render::image_loader::load_image(&args.image)
        .with_context(|| format!("failed to load {}", args.image.display()))?;

    let mut settings = LocalSettings::from_config(&args.config.synthesis)
        .context("invalid [synthesis] configuration")?;
    settings.prefer_video = settings.prefer_video && !args.gif;
    settings.jitter_seed = args.seed;

    let poller = RemoteTaskPoller::new(PollerConfig::from_remote_config(&args.config.remote));

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, cancelling");
            let _ = cancel_tx.send(true);
        }
    });

    println!("🎬 stillmotion");
    println!("   Image:     {} ({}x{})", args.image.display(), source.width, source.height);
    println!("   Motion:    {}", args.prompt);
    println!("   Duration:  {}s @ {} fps", args.duration, args.fps);

    let request = GenerateRequest {
        image: source,
        description: args.prompt,
        duration_secs: args.duration,
        fps: args.fps,
        provider: args.provider,
    };

    let output = generate::generate(request, &poller, &settings, &mut cancel_rx, |provider, p| {
        eprintln!(
            "   {} … {:>3.0}% ({}/{}, {}s)",
            provider,
            p.fraction() * 100.0,
            p.attempt,
            p.max_attempts,
            p.elapsed.as_secs()
        );
    })
    .await
    .context("generation failed")?;

    match output {
        GenerateOutput::RemoteUrl { provider, url } => {
            println!("✓ Video ready ({})", provider);
            println!("   URL:       {}", url);
        }
        GenerateOutput::RemoteBytes {
            provider,
            bytes,
            content_type,
        } => {
            let path = remote_output_path(args.output, &content_type, &bytes);
            write_output(&path, &bytes)?;
            println!("✓ Video ready ({}, {})", provider, content_type);
            println!("   Output:    {} ({} bytes)", path.display(), bytes.len());
        }
        GenerateOutput::Local(artifact) => {
            let path = args
                .output
                .unwrap_or_else(|| PathBuf::from(artifact.suggested_filename()));
            write_output(&path, &artifact.bytes)?;
            println!("✓ Animation ready (local, {})", artifact.mime());
            println!(
                "   Frames:    {} × {}ms",
                artifact.frame_count, artifact.frame_interval_ms
            );
            println!("   Output:    {} ({} bytes)", path.display(), artifact.len());
        }
    }
    Ok(())
}

/// `--output` when given, else a timestamped name matching the content type.
fn remote_output_path(output: Option<PathBuf>, content_type: &str, bytes: &[u8]) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(stillmotion_encode::remote_filename(content_type, bytes)))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn cmd_classify(text: Option<String>, examples: bool) -> Result<()> {
    if examples {
        for prompt in EXAMPLE_PROMPTS {
            let plan = classify(prompt)?;
            println!("{:<36} {}", prompt, serde_json::to_string(&plan)?);
        }
        return Ok(());
    }
    let text = text.unwrap_or_default();
    let plan = classify(&text)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_providers(config: &StillmotionConfig) -> Result<()> {
    let poller = RemoteTaskPoller::new(PollerConfig::from_remote_config(&config.remote));
    println!("🔌 Remote providers (in order)");
    for provider in &poller.config().order {
        let endpoint = poller.config().endpoint(*provider);
        let settings = match provider {
            Provider::Replicate => &config.remote.replicate,
            Provider::HuggingFace => &config.remote.huggingface,
        };
        let state = if poller.is_enabled(*provider) {
            "enabled ✓".to_string()
        } else if !settings.enabled {
            "disabled in config".to_string()
        } else {
            format!("disabled ({} not set)", settings.token_env)
        };
        println!("   {:<12} {:<40} {}", provider.to_string(), endpoint.base(), state);
    }
    if poller.enabled_providers().is_empty() {
        println!("   → no tokens configured; animations are synthesized locally");
    }
    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("🎬 stillmotion");
    println!("   Version:   {}", env!("CARGO_PKG_VERSION"));
    println!("   Synthesis: CPU (parallel frames)");
    println!(
        "   FFmpeg:    {}",
        if stillmotion_encode::FfmpegEncoder::is_available() {
            "available ✓ (MP4 output)"
        } else {
            "NOT FOUND ✗ (GIF output only)"
        }
    );
    println!("   Config:    {}", CONFIG_FILE_NAME);
    Ok(())
}
