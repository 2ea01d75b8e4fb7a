//! Media pipeline runner.
//!
//! Owns the shared orchestration shape for both content types:
//! resolve limits and provider, coordinate the acquisition, then read the
//! terminal state back and fire the readiness notification.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::coordinator::DownloadCoordinator;
use crate::notify::NotificationSink;
use crate::provider::{Capability, MediaProvider, ProviderRegistry};
use crate::resolver::MetadataResolver;
use crate::store::{ContentType, GroupSettings, MediaRequest, MediaStatus, RequestStore};

use super::error::PipelineError;
use super::{music, video};

/// Everything a content-type acquisition needs, captured per request.
pub(crate) struct AcquireContext {
    pub store: Arc<dyn RequestStore>,
    pub provider: Arc<dyn MediaProvider>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub settings: GroupSettings,
    pub media_dir: PathBuf,
    pub request: MediaRequest,
}

/// The media acquisition pipeline.
///
/// One instance serves all groups and submissions; each submission runs as
/// an independent task calling [`MediaPipeline::process`]. Concurrency is
/// bounded only by how many submissions arrive.
pub struct MediaPipeline {
    config: EngineConfig,
    store: Arc<dyn RequestStore>,
    registry: Arc<ProviderRegistry>,
    coordinator: DownloadCoordinator,
    resolver: Arc<dyn MetadataResolver>,
    notifier: Arc<dyn NotificationSink>,
}

impl MediaPipeline {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RequestStore>,
        registry: Arc<ProviderRegistry>,
        resolver: Arc<dyn MetadataResolver>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let coordinator = DownloadCoordinator::new(Arc::clone(&store));
        Self {
            config,
            store,
            registry,
            coordinator,
            resolver,
            notifier,
        }
    }

    /// Number of acquisitions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.coordinator.in_flight()
    }

    /// Run the acquisition pipeline for a persisted request.
    ///
    /// Terminal state lands on the persisted record. The returned error only
    /// reports pre-coordination configuration problems (missing request,
    /// missing provider); acquisition failures are absorbed by the
    /// coordinator into a `failed` record, so callers read the record's
    /// status for the outcome.
    pub async fn process(&self, request_id: &str) -> Result<(), PipelineError> {
        let request = self
            .store
            .get(request_id)?
            .ok_or_else(|| PipelineError::NotFound(request_id.to_string()))?;

        // Settings and provider state are re-read per request, never
        // cached, so concurrent configuration changes take effect
        // immediately.
        let settings = self.store.group_settings(&request.group_id)?;

        let Some(provider) = self.registry.get_active(&settings).await else {
            warn!(
                %request_id,
                group_id = %request.group_id,
                "no active installed provider"
            );
            self.store.mark_failed(request_id, None)?;
            return Err(PipelineError::NoProvider {
                group_id: request.group_id,
            });
        };

        let needed = required_capability(request.content_type);
        if !provider.capabilities().contains(&needed) {
            warn!(
                %request_id,
                provider = provider.id(),
                content_type = request.content_type.as_str(),
                "provider lacks required capability"
            );
            self.store.mark_failed(request_id, None)?;
            return Err(PipelineError::CapabilityMissing {
                provider: provider.id().to_string(),
                content_type: request.content_type.as_str(),
            });
        }

        let ctx = AcquireContext {
            store: Arc::clone(&self.store),
            provider,
            resolver: Arc::clone(&self.resolver),
            settings,
            media_dir: self.config.storage.media_dir.clone(),
            request: request.clone(),
        };

        match request.content_type {
            ContentType::Video => {
                self.coordinator
                    .coordinate(request_id, &request.canonical_url, move || {
                        video::acquire(ctx)
                    })
                    .await;
            }
            ContentType::Music => {
                self.coordinator
                    .coordinate(request_id, &request.canonical_url, move || {
                        music::acquire(ctx)
                    })
                    .await;
            }
        }

        self.notify_if_ready(request_id)?;
        Ok(())
    }

    /// External retry action: reset a failed request to `downloading` and
    /// run the pipeline again. The canonical URL, and therefore the dedup
    /// key, is unchanged.
    pub async fn retry(&self, request_id: &str) -> Result<(), PipelineError> {
        let request = self
            .store
            .get(request_id)?
            .ok_or_else(|| PipelineError::NotFound(request_id.to_string()))?;

        if request.status != MediaStatus::Failed {
            return Err(PipelineError::NotRetriable(request_id.to_string()));
        }

        self.store
            .set_status(request_id, MediaStatus::Downloading)?;
        self.process(request_id).await
    }

    /// Fire the readiness notification when the request ended up ready.
    ///
    /// Emission is spawned and never awaited for correctness; a failed send
    /// is logged only.
    fn notify_if_ready(&self, request_id: &str) -> Result<(), PipelineError> {
        let finished = self
            .store
            .get(request_id)?
            .ok_or_else(|| PipelineError::NotFound(request_id.to_string()))?;

        if finished.status != MediaStatus::Ready {
            debug!(%request_id, status = finished.status.as_str(), "skipping notification");
            return Ok(());
        }

        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.media_ready(&finished).await {
                warn!(request_id = %finished.id, error = %e, "notification failed");
            }
        });
        Ok(())
    }
}

fn required_capability(content_type: ContentType) -> Capability {
    match content_type {
        ContentType::Video => Capability::Video,
        ContentType::Music => Capability::Music,
    }
}
