//! Readiness notifications.
//!
//! The pipeline announces a newly ready request through this seam. Delivery
//! is fire-and-forget: the pipeline never awaits it for correctness, and a
//! failed send is logged, never escalated.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::store::MediaRequest;

/// Errors from notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The underlying delivery mechanism failed.
    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}

/// A sink that delivers "media ready" notifications to group members.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn media_ready(&self, request: &MediaRequest) -> Result<(), NotifyError>;
}

/// Default sink: emits a structured log event and nothing else.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn media_ready(&self, request: &MediaRequest) -> Result<(), NotifyError> {
        info!(
            request_id = %request.id,
            group_id = %request.group_id,
            title = request.result.title.as_deref().unwrap_or(""),
            "media ready"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ContentType, MediaResult, MediaStatus};
    use chrono::Utc;

    fn make_request() -> MediaRequest {
        let now = Utc::now();
        MediaRequest {
            id: "req-1".to_string(),
            group_id: "group-1".to_string(),
            canonical_url: "https://e.com/v".to_string(),
            content_type: ContentType::Video,
            status: MediaStatus::Ready,
            caption: None,
            result: MediaResult::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_log_notifier_always_succeeds() {
        let request = make_request();
        let result = tokio_test::block_on(LogNotifier.media_ready(&request));
        assert!(result.is_ok());
    }
}
