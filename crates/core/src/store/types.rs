//! Types for the media request store.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Media request not found.
    #[error("media request not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// The kind of media a submission asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Video,
    Music,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Music => "music",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(ContentType::Video),
            "music" => Some(ContentType::Music),
            _ => None,
        }
    }
}

/// Lifecycle state of a media request.
///
/// `Downloading` is the initial state; `Ready` and `Failed` are terminal.
/// A `Failed` request may be reset to `Downloading` by the external retry
/// action, which leaves the canonical URL (and therefore the dedup key)
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Downloading,
    Ready,
    Failed,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Downloading => "downloading",
            MediaStatus::Ready => "ready",
            MediaStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "downloading" => Some(MediaStatus::Downloading),
            "ready" => Some(MediaStatus::Ready),
            "failed" => Some(MediaStatus::Failed),
            _ => None,
        }
    }
}

/// The copyable result-field subset of a media request.
///
/// Used for store reuse, leader-to-follower sharing, and terminal updates:
/// a follower request becomes ready by copying the leader's `MediaResult`
/// wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaResult {
    /// Display title (extracted, resolved, or the submitter's caption).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Artist name (music only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    /// Path to the acquired media file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_path: Option<PathBuf>,

    /// Path to the acquired thumbnail (video only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,

    /// Remote artwork URL (music only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,

    /// Per-platform links resolved for the track (music only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_links: Option<serde_json::Value>,

    /// Reported duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,

    /// Total size of all produced files in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
}

/// A persisted media request.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub id: String,
    pub group_id: String,
    /// Canonical (normalized) source URL — the dedup key.
    pub canonical_url: String,
    pub content_type: ContentType,
    pub status: MediaStatus,
    /// Caption supplied at submission time; preferred over extracted titles.
    pub caption: Option<String>,
    pub result: MediaResult,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a new media request row.
#[derive(Debug, Clone)]
pub struct NewMediaRequest {
    pub group_id: String,
    /// Raw source URL as submitted; canonicalized on insert.
    pub source_url: String,
    pub content_type: ContentType,
    pub caption: Option<String>,
}

/// Per-group acquisition limits and provider selection.
///
/// Read-only input to the orchestrators; re-read from the store on every
/// request so concurrent configuration changes take effect immediately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSettings {
    /// Maximum allowed media duration in seconds, if any.
    #[serde(default)]
    pub max_duration_secs: Option<u32>,

    /// Maximum allowed media file size in megabytes, if any.
    #[serde(default)]
    pub max_file_size_mb: Option<u64>,

    /// Configured acquisition provider id, if any.
    #[serde(default)]
    pub active_provider_id: Option<String>,
}

impl GroupSettings {
    /// The byte-size limit derived from `max_file_size_mb`.
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        self.max_file_size_mb.map(|mb| mb * 1024 * 1024)
    }
}
