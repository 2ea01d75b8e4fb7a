//! Provider registry: resolve the active provider for a group.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::EngineConfig;
use crate::store::GroupSettings;

use super::traits::MediaProvider;
use super::types::ProviderStatus;
use super::ytdlp::YtDlpProvider;

/// Registry of known acquisition providers, keyed by provider id.
///
/// Resolution re-derives installed state on every call rather than caching
/// it, trading I/O cost for correctness under concurrent install/uninstall
/// and group reconfiguration.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn MediaProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in providers registered.
    pub fn with_defaults(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(YtDlpProvider::new(config)));
        registry
    }

    /// Register a provider instance under its id.
    pub fn register(&mut self, provider: Arc<dyn MediaProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    /// Look up a known provider by id regardless of installed state
    /// (install/uninstall plumbing).
    pub fn get(&self, id: &str) -> Option<Arc<dyn MediaProvider>> {
        self.providers.get(id).cloned()
    }

    /// Resolve the group's active, installed provider.
    ///
    /// Returns `None` when the group has no provider configured, the
    /// configured id is unknown, or the provider's tooling is missing.
    /// This is a configuration failure, distinct from (and never retried
    /// like) an in-flight acquisition failure.
    pub async fn get_active(&self, settings: &GroupSettings) -> Option<Arc<dyn MediaProvider>> {
        let id = settings.active_provider_id.as_deref()?;
        let Some(provider) = self.providers.get(id) else {
            debug!(provider = id, "configured provider is not known");
            return None;
        };
        if !provider.is_installed().await {
            debug!(provider = id, "configured provider is not installed");
            return None;
        }
        Some(Arc::clone(provider))
    }

    /// Installed/active/version status for every known provider, for the
    /// configuration UI. Not used on the acquisition path.
    pub async fn list_with_status(&self, settings: &GroupSettings) -> Vec<ProviderStatus> {
        let active_id = settings.active_provider_id.as_deref();

        let mut statuses = Vec::with_capacity(self.providers.len());
        for (id, provider) in &self.providers {
            let installed = provider.is_installed().await;
            let version = if installed {
                provider.version().await
            } else {
                None
            };
            statuses.push(ProviderStatus {
                id: id.clone(),
                capabilities: provider.capabilities().to_vec(),
                installed,
                active: active_id == Some(id.as_str()),
                version,
            });
        }
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
