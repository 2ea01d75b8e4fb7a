use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Root engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub audio_retry: AudioRetryConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Filesystem layout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory acquired media files are written to.
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// Directory provider binaries are installed under (one subdirectory
    /// per provider id).
    #[serde(default = "default_binaries_dir")]
    pub binaries_dir: PathBuf,

    /// SQLite database path.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            binaries_dir: default_binaries_dir(),
            database: default_database_path(),
        }
    }
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_binaries_dir() -> PathBuf {
    PathBuf::from("providers")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("mediadrop.db")
}

/// Acquisition provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Release asset URL the yt-dlp binary is installed from.
    #[serde(default = "default_ytdlp_release_url")]
    pub ytdlp_release_url: String,

    /// Assumed transfer-stream density used to derive a generous duration
    /// pre-filter from a byte-size cap.
    #[serde(default = "default_assumed_bytes_per_sec")]
    pub assumed_bytes_per_sec: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            ytdlp_release_url: default_ytdlp_release_url(),
            assumed_bytes_per_sec: default_assumed_bytes_per_sec(),
        }
    }
}

fn default_ytdlp_release_url() -> String {
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp".to_string()
}

fn default_assumed_bytes_per_sec() -> u64 {
    // ~2 Mbit/s muxed 1080p floor
    250_000
}

/// Retry policy for audio acquisitions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioRetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_audio_attempts")]
    pub attempts: u32,

    /// Base delay; attempt N sleeps N * base before the next try.
    #[serde(default = "default_audio_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for AudioRetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_audio_attempts(),
            base_delay_ms: default_audio_base_delay_ms(),
        }
    }
}

fn default_audio_attempts() -> u32 {
    3
}

fn default_audio_base_delay_ms() -> u64 {
    2000
}

/// Music metadata resolution service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Base URL of the song.link-compatible lookup API.
    #[serde(default = "default_resolver_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: default_resolver_base_url(),
            timeout_secs: default_resolver_timeout(),
        }
    }
}

fn default_resolver_base_url() -> String {
    "https://api.song.link".to_string()
}

fn default_resolver_timeout() -> u32 {
    15
}
