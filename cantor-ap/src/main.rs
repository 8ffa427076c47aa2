//! Cantor Audio Player (cantor-ap) - command-line entry point
//!
//! Exercises the library components from a terminal: source resolution,
//! script markup, cached neural voice synthesis and cache maintenance.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use cantor_ap::cache::{AudioCache, SPEECH_NAMESPACE, STREAM_NAMESPACE};
use cantor_ap::config::{Config, ConfigOverrides};
use cantor_ap::markup::{render_ssml, MarkupBuilder, VoiceParams};
use cantor_ap::synthesis::{MediaSource, NeuralVoiceClient, NeuralVoicePipeline};
use cantor_ap::SourceResolver;
use cantor_common::{ContentReference, ContentType};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for cantor-ap
#[derive(Parser, Debug)]
#[command(name = "cantor-ap")]
#[command(about = "Devotional audio player: source resolution, neural voice synthesis and cache tools")]
#[command(version)]
struct Args {
    /// Configuration file (default: ~/.config/cantor/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root folder for cache and data
    #[arg(short, long, global = true, env = "CANTOR_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the audio source chosen for a content reference (JSON file)
    Resolve {
        content: PathBuf,
    },

    /// Print the markup built for a text file
    Script {
        text: PathBuf,

        #[arg(long = "type", default_value = "katha")]
        content_type: ContentType,

        /// Neural voice name (default from config)
        #[arg(long)]
        voice: Option<String>,

        /// Print the segment list as JSON instead of SSML
        #[arg(long)]
        json: bool,
    },

    /// Synthesize a text file with the neural voice, using the speech cache
    Synthesize {
        text: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long = "type", default_value = "katha")]
        content_type: ContentType,

        #[arg(long)]
        voice: Option<String>,
    },

    /// Inspect or clear the audio caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show entry counts and sizes
    Info,

    /// Remove cached audio
    Clear {
        /// Only this namespace (speech or stream)
        #[arg(long)]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(ConfigOverrides {
        config_path: args.config.clone(),
        root_folder: args.root_folder.clone(),
    });

    let (level, log_file) = match &config {
        Ok(config) => (config.logging.level.clone(), config.logging.file.clone()),
        Err(_) => ("info".to_string(), None),
    };
    init_tracing(&level, log_file.as_deref())?;

    info!(
        "cantor-ap {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = config.context("Failed to load configuration")?;

    match args.command {
        Commands::Resolve { content } => resolve(&config, &content),
        Commands::Script {
            text,
            content_type,
            voice,
            json,
        } => script(&config, &text, content_type, voice, json),
        Commands::Synthesize {
            text,
            output,
            content_type,
            voice,
        } => synthesize(&config, &text, &output, content_type, voice).await,
        Commands::Cache { action } => cache(&config, action).await,
    }
}

/// Tracing to stderr, or to the configured log file
///
/// `RUST_LOG` overrides the configured level.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cantor_ap={0},cantor_common={0}", level)));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    let stderr_layer = if file_layer.is_none() {
        Some(fmt::layer().with_writer(std::io::stderr))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn voice_params(config: &Config, voice: Option<String>) -> VoiceParams {
    VoiceParams::new(voice.unwrap_or_else(|| config.synthesis.voice.clone()))
}

fn read_text_reference(path: &Path, content_type: ContentType) -> Result<ContentReference> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "text".to_string());
    Ok(ContentReference::from_text(id, content_type, text))
}

fn resolve(config: &Config, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let content: ContentReference =
        serde_json::from_str(&json).context("Invalid content reference JSON")?;

    let mut resolver = SourceResolver::new(config.synthesis.enabled);
    if let Some(root) = config.bundled_asset_root() {
        resolver = resolver.with_bundled_asset_root(root);
    }

    let source = resolver.resolve(&content);
    println!("{}", serde_json::to_string_pretty(&source)?);
    Ok(())
}

fn script(config: &Config, path: &Path, content_type: ContentType, voice: Option<String>, json: bool) -> Result<()> {
    let content = read_text_reference(path, content_type)?;
    let voice = voice_params(config, voice);
    let script = MarkupBuilder::new().build(&content.text, content_type, &voice);

    if json {
        println!("{}", serde_json::to_string_pretty(&script)?);
    } else {
        println!("{}", render_ssml(&script));
    }
    Ok(())
}

async fn synthesize(
    config: &Config,
    path: &Path,
    output: &Path,
    content_type: ContentType,
    voice: Option<String>,
) -> Result<()> {
    let content = read_text_reference(path, content_type)?;
    let voice = voice_params(config, voice);

    let cache = AudioCache::open(
        SPEECH_NAMESPACE,
        config.cache_namespace_dir(SPEECH_NAMESPACE),
        config.cache.speech_budget_bytes(),
    )
    .await
    .context("Failed to open speech cache")?;
    let client = NeuralVoiceClient::new(&config.synthesis)?;
    let pipeline = NeuralVoicePipeline::new(Arc::new(cache), Arc::new(client), config.synthesis.timeout());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    let audio = pipeline
        .fetch(&content, &voice, &cancel)
        .await
        .context("Synthesis failed")?;

    match &audio.media {
        MediaSource::File(cached) => {
            tokio::fs::copy(cached, output)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        MediaSource::Buffer(bytes) => {
            tokio::fs::write(output, bytes.as_slice())
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        MediaSource::Uri(uri) => {
            anyhow::bail!("Unexpected media location {}", uri);
        }
    }

    println!(
        "{} -> {} ({}, key {})",
        path.display(),
        output.display(),
        if audio.from_cache { "cache hit" } else { "synthesized" },
        audio.key
    );
    Ok(())
}

async fn open_caches(config: &Config) -> Result<Vec<AudioCache>> {
    let speech = AudioCache::open(
        SPEECH_NAMESPACE,
        config.cache_namespace_dir(SPEECH_NAMESPACE),
        config.cache.speech_budget_bytes(),
    )
    .await?;
    let stream = AudioCache::open(
        STREAM_NAMESPACE,
        config.cache_namespace_dir(STREAM_NAMESPACE),
        config.cache.stream_budget_bytes(),
    )
    .await?;
    Ok(vec![speech, stream])
}

async fn cache(config: &Config, action: CacheAction) -> Result<()> {
    let caches = open_caches(config).await.context("Failed to open caches")?;

    match action {
        CacheAction::Info => {
            for cache in &caches {
                let stats = cache.stats();
                println!(
                    "{:<8} {:>5} entries {:>12} / {:>12} bytes  {}",
                    cache.namespace(),
                    stats.entries,
                    stats.total_bytes,
                    stats.budget_bytes,
                    cache.dir().display()
                );
            }
        }
        CacheAction::Clear { namespace } => {
            if let Some(name) = &namespace {
                if !caches.iter().any(|c| c.namespace() == name) {
                    anyhow::bail!("Unknown cache namespace {} (expected speech or stream)", name);
                }
            }
            for cache in caches
                .iter()
                .filter(|c| namespace.as_deref().map_or(true, |n| c.namespace() == n))
            {
                let removed = cache.clear().await?;
                println!("{}: removed {} entries", cache.namespace(), removed);
            }
        }
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling");
        },
    }
}
