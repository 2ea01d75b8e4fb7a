//! Storage trait for media requests and group settings.

use super::types::{
    GroupSettings, MediaRequest, MediaResult, MediaStatus, NewMediaRequest, StoreError,
};

/// Trait for media request storage backends.
///
/// Methods are synchronous; implementations guard their connection with a
/// mutex and keep critical sections short. The pipeline re-reads group
/// settings through this trait on every request rather than caching them.
pub trait RequestStore: Send + Sync {
    /// Create a new media request with status `downloading`.
    ///
    /// The source URL is canonicalized on insert; the canonical form is the
    /// dedup key for the coordinator.
    fn create(&self, request: NewMediaRequest) -> Result<MediaRequest, StoreError>;

    /// Get a media request by id.
    fn get(&self, id: &str) -> Result<Option<MediaRequest>, StoreError>;

    /// Find the most recently updated `ready` request for a canonical URL.
    fn find_ready_by_canonical_url(
        &self,
        canonical_url: &str,
    ) -> Result<Option<MediaRequest>, StoreError>;

    /// Overwrite all result fields and set the status in one update.
    fn update_result(
        &self,
        id: &str,
        result: &MediaResult,
        status: MediaStatus,
    ) -> Result<(), StoreError>;

    /// Set only the status.
    fn set_status(&self, id: &str, status: MediaStatus) -> Result<(), StoreError>;

    /// Mark a request failed, optionally setting a user-facing title.
    ///
    /// When `title` is `None` the existing title is left untouched so that
    /// early-persisted metadata stays visible on failed music requests.
    fn mark_failed(&self, id: &str, title: Option<&str>) -> Result<(), StoreError>;

    /// Read a group's settings, falling back to defaults when absent.
    fn group_settings(&self, group_id: &str) -> Result<GroupSettings, StoreError>;

    /// Write a group's settings (configuration surface, not acquisition path).
    fn set_group_settings(
        &self,
        group_id: &str,
        settings: &GroupSettings,
    ) -> Result<(), StoreError>;
}
