//! Error type for pipeline operations.

use thiserror::Error;

use crate::provider::ProviderError;
use crate::store::StoreError;

/// Errors that can occur while running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Media request not found.
    #[error("media request not found: {0}")]
    NotFound(String),

    /// The group has no usable acquisition provider configured.
    ///
    /// A configuration error, distinct from an acquisition failure: it is
    /// terminal before coordination starts and never retried.
    #[error("group '{group_id}' has no active installed provider")]
    NoProvider { group_id: String },

    /// The group's provider does not support the requested content type.
    #[error("provider '{provider}' cannot acquire {content_type}")]
    CapabilityMissing {
        provider: String,
        content_type: &'static str,
    },

    /// The acquired media exceeded a configured group limit.
    #[error("limit exceeded: {reason}")]
    LimitExceeded { reason: String },

    /// A retry was requested for a request that is not in a failed state.
    #[error("media request {0} is not in a failed state")]
    NotRetriable(String),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Provider error.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// I/O error while preparing the output directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
