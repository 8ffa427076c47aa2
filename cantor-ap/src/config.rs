//! Configuration management for the cantor-ap audio player
//!
//! Configuration is a single TOML bootstrap file. Every section and key is
//! optional; missing values take the built-in defaults defined here.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--config, --root-folder)
//! 2. Environment variables (CANTOR_ROOT_FOLDER)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use cantor_common::config::{load_or_default, resolve_root_folder, ROOT_FOLDER_ENV};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Size budget of the synthesized-speech cache
pub const DEFAULT_SPEECH_BUDGET_MB: u64 = 50;

/// Size budget of the streamed-audio cache
pub const DEFAULT_STREAM_BUDGET_MB: u64 = 100;

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Root folder for cache and data (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote neural voice service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// When false, the resolver never selects the neural voice tier
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// WebSocket endpoint of the voice service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Token appended as `TrustedClientToken` query parameter (optional)
    #[serde(default)]
    pub trusted_client_token: Option<String>,

    /// Default neural voice name
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Output codec requested in the speech config message
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Time allowed for the terminal marker to arrive
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            trusted_client_token: None,
            voice: default_voice(),
            output_format: default_output_format(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl SynthesisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Cache directory and budgets
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache directory (default: `<root_folder>/cache`)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_speech_budget_mb")]
    pub speech_budget_mb: u64,

    #[serde(default = "default_stream_budget_mb")]
    pub stream_budget_mb: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            speech_budget_mb: DEFAULT_SPEECH_BUDGET_MB,
            stream_budget_mb: DEFAULT_STREAM_BUDGET_MB,
        }
    }
}

impl CacheConfig {
    pub fn speech_budget_bytes(&self) -> u64 {
        self.speech_budget_mb * 1024 * 1024
    }

    pub fn stream_budget_bytes(&self) -> u64 {
        self.stream_budget_mb * 1024 * 1024
    }
}

/// Playback coordinator settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Progress sampling interval while playing a timeline
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Initial speed multiplier
    #[serde(default = "default_speed")]
    pub default_speed: f32,

    /// Directory holding bundled audio assets (optional)
    #[serde(default)]
    pub bundled_asset_root: Option<PathBuf>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            default_speed: default_speed(),
            bundled_asset_root: None,
        }
    }
}

impl PlaybackConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1".to_string()
}

fn default_voice() -> String {
    "hi-IN-MadhurNeural".to_string()
}

fn default_output_format() -> String {
    "audio-24khz-48kbitrate-mono-mp3".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_speech_budget_mb() -> u64 {
    DEFAULT_SPEECH_BUDGET_MB
}

fn default_stream_budget_mb() -> u64 {
    DEFAULT_STREAM_BUDGET_MB
}

fn default_progress_interval_ms() -> u64 {
    500
}

fn default_speed() -> f32 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Complete application configuration
///
/// Combines the TOML bootstrap with command-line overrides and the resolved
/// root folder.
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub cache_dir: PathBuf,
    pub synthesis: SynthesisConfig,
    pub cache: CacheConfig,
    pub playback: PlaybackConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the TOML file (if any) and apply overrides
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly named file is missing, or if any file
    /// found cannot be parsed.
    pub fn load(cli_overrides: ConfigOverrides) -> Result<Self> {
        let toml_config: TomlConfig = load_or_default(cli_overrides.config_path.as_deref())?;
        Self::from_toml(toml_config, cli_overrides)
    }

    /// Build from an already-parsed TOML config
    pub fn from_toml(toml_config: TomlConfig, cli_overrides: ConfigOverrides) -> Result<Self> {
        // Handles priority: CLI > env > TOML > OS default
        let root_folder = resolve_root_folder(
            cli_overrides.root_folder.as_deref(),
            ROOT_FOLDER_ENV,
            toml_config.root_folder.as_deref(),
        );
        info!("Root folder: {}", root_folder.display());

        let cache_dir = toml_config
            .cache
            .directory
            .clone()
            .unwrap_or_else(|| root_folder.join("cache"));

        let config = Config {
            root_folder,
            cache_dir,
            synthesis: toml_config.synthesis,
            cache: toml_config.cache,
            playback: toml_config.playback,
            logging: toml_config.logging,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.synthesis.enabled && self.synthesis.endpoint.trim().is_empty() {
            return Err(Error::Config(
                "synthesis.endpoint must be set when synthesis is enabled".to_string(),
            ));
        }
        if self.synthesis.timeout_ms == 0 {
            return Err(Error::Config("synthesis.timeout_ms must be positive".to_string()));
        }
        if !(0.5..=2.0).contains(&self.playback.default_speed) {
            return Err(Error::Config(format!(
                "playback.default_speed {} outside 0.5-2.0",
                self.playback.default_speed
            )));
        }
        Ok(())
    }

    /// Directory of one cache namespace
    pub fn cache_namespace_dir(&self, namespace: &str) -> PathBuf {
        self.cache_dir.join(namespace)
    }

    pub fn bundled_asset_root(&self) -> Option<&Path> {
        self.playback.bundled_asset_root.as_deref()
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
}
