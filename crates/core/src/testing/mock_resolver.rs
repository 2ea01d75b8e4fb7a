//! Mock metadata resolvers.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::resolver::{MetadataResolver, ResolverError, TrackMetadata};

/// Resolver that always fails, for pipelines that must degrade to null
/// metadata (and for video pipelines, which never resolve at all).
pub struct NullResolver;

#[async_trait]
impl MetadataResolver for NullResolver {
    async fn resolve(&self, _url: &str) -> Result<TrackMetadata, ResolverError> {
        Err(ResolverError::ApiError {
            status: 503,
            message: "no resolver configured".to_string(),
        })
    }
}

/// Resolver returning a fixed metadata bundle.
pub struct MockResolver {
    metadata: TrackMetadata,
    fail: bool,
    calls: AtomicU32,
}

impl MockResolver {
    pub fn new(metadata: TrackMetadata) -> Self {
        Self {
            metadata,
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    /// A resolver that fails every lookup.
    pub fn failing() -> Self {
        Self {
            metadata: TrackMetadata::default(),
            fail: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataResolver for MockResolver {
    async fn resolve(&self, _url: &str) -> Result<TrackMetadata, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ResolverError::ApiError {
                status: 500,
                message: "scripted resolver failure".to_string(),
            });
        }
        Ok(self.metadata.clone())
    }
}
