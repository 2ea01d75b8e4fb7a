//! Post-acquisition limit policy.
//!
//! Pre-download filters handed to the tool are advisory only; this is the
//! safety net that re-checks what actually landed on disk against the
//! group's limits.

use crate::store::GroupSettings;

/// Check measured size and reported duration against the group limits.
///
/// Returns the user-facing failure title on violation (for example
/// "Exceeds 5 min limit"), `None` when the media is within limits or the
/// relevant measurement is unavailable.
pub(crate) fn limit_violation(
    settings: &GroupSettings,
    measured_size_bytes: Option<u64>,
    reported_duration_secs: Option<f64>,
) -> Option<String> {
    if let (Some(max_secs), Some(duration)) =
        (settings.max_duration_secs, reported_duration_secs)
    {
        if duration > max_secs as f64 {
            return Some(format!("Exceeds {} limit", duration_label(max_secs)));
        }
    }

    if let (Some(max_bytes), Some(size)) =
        (settings.max_file_size_bytes(), measured_size_bytes)
    {
        if size > max_bytes {
            let mb = settings.max_file_size_mb.unwrap_or(max_bytes / (1024 * 1024));
            return Some(format!("Exceeds {mb} MB limit"));
        }
    }

    None
}

/// Human-readable duration: whole minutes as "N min", otherwise "N sec".
fn duration_label(secs: u32) -> String {
    if secs >= 60 && secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{secs} sec")
    }
}
