//! Music acquisition.
//!
//! Music submissions resolve cross-platform metadata first and persist it
//! immediately so the group sees title/artist/artwork while the audio is
//! still in flight. Acquisition goes through provider search by
//! `"<title> <artist>"`, falling back to the resolved direct platform URL
//! when the search comes up empty.

use tracing::{debug, warn};

use crate::provider::{AudioDownload, DownloadOptions};
use crate::resolver::TrackMetadata;
use crate::store::{MediaResult, MediaStatus};

use super::cleanup;
use super::error::PipelineError;
use super::policy;
use super::runner::AcquireContext;

/// Acquire a track for the request, apply the safety net, and persist the
/// terminal state. Runs as the coordinator's leader body.
pub(crate) async fn acquire(ctx: AcquireContext) -> Result<(), PipelineError> {
    let request_id = ctx.request.id.clone();

    tokio::fs::create_dir_all(&ctx.media_dir).await?;

    // Metadata first; resolution failure degrades to null metadata and
    // never aborts the pipeline.
    let metadata = match ctx.resolver.resolve(&ctx.request.canonical_url).await {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!(%request_id, error = %e, "metadata resolution failed");
            None
        }
    };

    // Persist what we resolved right away, independent of audio success.
    if let Some(metadata) = &metadata {
        let early = MediaResult {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            artwork_url: metadata.artwork_url.clone(),
            platform_links: platform_links_value(metadata),
            ..Default::default()
        };
        ctx.store
            .update_result(&request_id, &early, MediaStatus::Downloading)?;
    }

    let options = DownloadOptions::new(&ctx.media_dir, &request_id)
        .with_max_duration_secs(ctx.settings.max_duration_secs)
        .with_max_file_size_bytes(ctx.settings.max_file_size_bytes());

    let download = match download_with_fallback(&ctx, metadata.as_ref(), &options).await {
        Ok(download) => download,
        Err(e) => {
            cleanup::remove_request_files(&ctx.media_dir, &request_id).await;
            return Err(e.into());
        }
    };

    // Safety net over what actually landed on disk.
    let measured_size = tokio::fs::metadata(&download.audio_path)
        .await
        .ok()
        .map(|m| m.len());
    if let Some(reason) =
        policy::limit_violation(&ctx.settings, measured_size, download.duration_secs)
    {
        warn!(%request_id, %reason, "acquired audio violates group limits");
        ctx.store.mark_failed(&request_id, Some(&reason))?;
        cleanup::remove_request_files(&ctx.media_dir, &request_id).await;
        return Err(PipelineError::LimitExceeded { reason });
    }

    let total_size = cleanup::sum_request_files(&ctx.media_dir, &request_id).await;

    // Caption wins over the resolved title.
    let title = ctx
        .request
        .caption
        .clone()
        .filter(|caption| !caption.trim().is_empty())
        .or_else(|| metadata.as_ref().and_then(|m| m.title.clone()));

    let result = MediaResult {
        title,
        artist: metadata.as_ref().and_then(|m| m.artist.clone()),
        media_path: Some(download.audio_path),
        artwork_url: metadata.as_ref().and_then(|m| m.artwork_url.clone()),
        platform_links: metadata.as_ref().and_then(|m| platform_links_value(m)),
        duration_secs: download.duration_secs,
        file_size_bytes: Some(total_size),
        thumbnail_path: None,
    };
    ctx.store
        .update_result(&request_id, &result, MediaStatus::Ready)?;

    debug!(%request_id, bytes = total_size, "audio ready");
    Ok(())
}

/// Search acquisition with direct-URL fallback.
///
/// Without resolved metadata the submitted URL itself is the target; with
/// metadata the search query runs first, and a resolved YouTube link is
/// tried directly if the search fails.
async fn download_with_fallback(
    ctx: &AcquireContext,
    metadata: Option<&TrackMetadata>,
    options: &DownloadOptions,
) -> Result<AudioDownload, crate::provider::ProviderError> {
    let query = metadata.and_then(|m| m.search_query());

    let primary = query
        .clone()
        .unwrap_or_else(|| ctx.request.canonical_url.clone());

    match ctx.provider.download_audio(&primary, options).await {
        Ok(download) => Ok(download),
        Err(search_err) => {
            let fallback_url = match (&query, metadata.and_then(|m| m.youtube_url.as_deref())) {
                (Some(_), Some(url)) => url.to_string(),
                _ => return Err(search_err),
            };
            warn!(
                request_id = %ctx.request.id,
                error = %search_err,
                "search acquisition failed, trying direct platform URL"
            );
            ctx.provider.download_audio(&fallback_url, options).await
        }
    }
}

fn platform_links_value(metadata: &TrackMetadata) -> Option<serde_json::Value> {
    if metadata.platform_links.is_empty() {
        return None;
    }
    serde_json::to_value(&metadata.platform_links).ok()
}
