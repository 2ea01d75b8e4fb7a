//! Trait definition for acquisition providers.

use async_trait::async_trait;

use super::error::ProviderError;
use super::types::{AudioDownload, Capability, DownloadOptions, VideoDownload};

/// A provider that can acquire media from external platforms.
///
/// One shared, stateless instance per provider id; safe to use from many
/// concurrent acquisitions. Installed state is derived from the filesystem
/// on every call — never cached — so concurrent install/uninstall actions
/// take effect immediately.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Stable provider identifier, referenced by group configuration.
    fn id(&self) -> &str;

    /// Content types this provider can acquire.
    fn capabilities(&self) -> &[Capability];

    /// Whether the provider's tooling is present and runnable.
    async fn is_installed(&self) -> bool;

    /// Fetch and install the provider's tooling.
    async fn install(&self) -> Result<(), ProviderError>;

    /// Remove the provider's tooling. Removing an absent install is not an
    /// error.
    async fn uninstall(&self) -> Result<(), ProviderError>;

    /// Version string of the installed tooling, if it can be determined.
    async fn version(&self) -> Option<String>;

    /// Acquire a video from an exact URL.
    ///
    /// Never retried: video targets are exact URLs, so failures are not
    /// assumed transient.
    async fn download_video(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<VideoDownload, ProviderError>;

    /// Acquire audio from a search query or direct URL.
    ///
    /// Implementations retry transient failures internally: audio targets
    /// are fuzzy search queries, which fail transiently far more often than
    /// exact video URLs.
    async fn download_audio(
        &self,
        query: &str,
        options: &DownloadOptions,
    ) -> Result<AudioDownload, ProviderError>;
}
