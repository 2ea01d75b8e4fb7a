//! Engine configuration.

mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    AudioRetryConfig, ConfigError, EngineConfig, ProviderConfig, ResolverConfig, StorageConfig,
};
pub use validate::validate_config;
