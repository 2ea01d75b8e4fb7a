//! Cross-platform music metadata resolution.
//!
//! Music submissions carry a link from one platform; the resolver looks up
//! the track across platforms to get a display title/artist/artwork bundle
//! and per-platform links. Resolution is best-effort: any error degrades to
//! null metadata in the orchestrator without aborting the pipeline.

mod songlink;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub use songlink::SongLinkResolver;

/// Errors from metadata resolution.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The lookup service returned an error status.
    #[error("lookup service returned {status}: {message}")]
    ApiError { status: u16, message: String },

    /// The response could not be interpreted.
    #[error("failed to parse lookup response: {0}")]
    Parse(String),
}

/// Cross-platform track metadata bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork_url: Option<String>,
    /// Per-platform links, keyed by platform id.
    pub platform_links: BTreeMap<String, String>,
    /// Direct YouTube link, used as the acquisition fallback target.
    pub youtube_url: Option<String>,
}

impl TrackMetadata {
    /// Search query for provider acquisition: `"<title> <artist>"`.
    pub fn search_query(&self) -> Option<String> {
        let title = self.title.as_deref()?;
        match self.artist.as_deref() {
            Some(artist) => Some(format!("{title} {artist}")),
            None => Some(title.to_string()),
        }
    }
}

/// A service that resolves a track URL into cross-platform metadata.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<TrackMetadata, ResolverError>;
}
