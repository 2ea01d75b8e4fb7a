//! Output directory hygiene.
//!
//! Every file a provider produces is named with the owning request's id
//! prefix, so failure cleanup and size accounting are directory scans over
//! that prefix. All operations here are best-effort: a file that is already
//! gone is not an error worth surfacing.

use std::path::Path;

use tracing::debug;

/// Delete every file in `dir` whose name starts with `request_id`.
///
/// Deletion errors are swallowed; failure paths must never fail harder
/// because cleanup hiccuped.
pub(crate) async fn remove_request_files(dir: &Path, request_id: &str) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cleanup scan skipped");
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name();
        if !file_name.to_string_lossy().starts_with(request_id) {
            continue;
        }
        if let Err(e) = tokio::fs::remove_file(entry.path()).await {
            debug!(path = %entry.path().display(), error = %e, "cleanup delete skipped");
        }
    }
}

/// Sum the sizes of every file in `dir` whose name starts with `request_id`.
pub(crate) async fn sum_request_files(dir: &Path, request_id: &str) -> u64 {
    let mut total = 0;

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name();
        if !file_name.to_string_lossy().starts_with(request_id) {
            continue;
        }
        if let Ok(metadata) = entry.metadata().await {
            total += metadata.len();
        }
    }

    total
}
