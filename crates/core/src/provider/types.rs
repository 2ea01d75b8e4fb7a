//! Types shared across provider implementations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A content type a provider can acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Video,
    Music,
}

/// Per-acquisition options passed to a provider.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Directory the provider writes all output files into.
    pub output_dir: PathBuf,

    /// Request id, used as the file-naming prefix for every produced file.
    pub request_id: String,

    /// Advisory duration cap passed to the tool as a pre-download filter.
    pub max_duration_secs: Option<u32>,

    /// Advisory byte cap passed to the tool; also drives a derived duration
    /// pre-filter for formats whose size is only known mid-transfer.
    pub max_file_size_bytes: Option<u64>,
}

impl DownloadOptions {
    pub fn new(output_dir: impl Into<PathBuf>, request_id: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            request_id: request_id.into(),
            max_duration_secs: None,
            max_file_size_bytes: None,
        }
    }

    pub fn with_max_duration_secs(mut self, secs: Option<u32>) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn with_max_file_size_bytes(mut self, bytes: Option<u64>) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }
}

/// Result of a successful video acquisition.
#[derive(Debug, Clone)]
pub struct VideoDownload {
    pub video_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
    /// Title parsed from the metadata sidecar, when available.
    pub title: Option<String>,
    /// Duration parsed from the metadata sidecar, when available.
    pub duration_secs: Option<f64>,
}

/// Result of a successful audio acquisition.
#[derive(Debug, Clone)]
pub struct AudioDownload {
    pub audio_path: PathBuf,
    pub duration_secs: Option<f64>,
}

/// Installed/active/version status of a known provider (configuration UI).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: String,
    pub capabilities: Vec<Capability>,
    pub installed: bool,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
