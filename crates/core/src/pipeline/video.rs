//! Video acquisition.
//!
//! Video targets are exact URLs, so the acquisition itself is never
//! retried; failures either come back from the tool immediately or not at
//! all.

use tracing::{debug, warn};

use crate::provider::DownloadOptions;
use crate::store::{MediaResult, MediaStatus};

use super::cleanup;
use super::error::PipelineError;
use super::policy;
use super::runner::AcquireContext;

/// Acquire a video for the request, apply the safety net, and persist the
/// terminal state. Runs as the coordinator's leader body.
pub(crate) async fn acquire(ctx: AcquireContext) -> Result<(), PipelineError> {
    let request_id = ctx.request.id.clone();

    tokio::fs::create_dir_all(&ctx.media_dir).await?;

    let options = DownloadOptions::new(&ctx.media_dir, &request_id)
        .with_max_duration_secs(ctx.settings.max_duration_secs)
        .with_max_file_size_bytes(ctx.settings.max_file_size_bytes());

    let download = match ctx
        .provider
        .download_video(&ctx.request.canonical_url, &options)
        .await
    {
        Ok(download) => download,
        Err(e) => {
            cleanup::remove_request_files(&ctx.media_dir, &request_id).await;
            return Err(e.into());
        }
    };

    // Safety net: the pre-download filters were advisory, re-check what
    // actually landed.
    let measured_size = tokio::fs::metadata(&download.video_path)
        .await
        .ok()
        .map(|m| m.len());
    if let Some(reason) =
        policy::limit_violation(&ctx.settings, measured_size, download.duration_secs)
    {
        warn!(%request_id, %reason, "acquired video violates group limits");
        ctx.store.mark_failed(&request_id, Some(&reason))?;
        cleanup::remove_request_files(&ctx.media_dir, &request_id).await;
        return Err(PipelineError::LimitExceeded { reason });
    }

    let total_size = cleanup::sum_request_files(&ctx.media_dir, &request_id).await;

    // Caption supplied at submission wins over the extracted title.
    let title = ctx
        .request
        .caption
        .clone()
        .filter(|caption| !caption.trim().is_empty())
        .or(download.title);

    let result = MediaResult {
        title,
        media_path: Some(download.video_path),
        thumbnail_path: download.thumbnail_path,
        duration_secs: download.duration_secs,
        file_size_bytes: Some(total_size),
        ..Default::default()
    };
    ctx.store
        .update_result(&request_id, &result, MediaStatus::Ready)?;

    debug!(%request_id, bytes = total_size, "video ready");
    Ok(())
}
