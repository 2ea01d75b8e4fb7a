use super::{types::EngineConfig, ConfigError};

/// Validate a loaded configuration.
pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.storage.media_dir.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("storage.media_dir is empty".into()));
    }
    if config.storage.binaries_dir.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("storage.binaries_dir is empty".into()));
    }
    if config.audio_retry.attempts == 0 {
        return Err(ConfigError::Invalid(
            "audio_retry.attempts must be at least 1".into(),
        ));
    }
    if config.provider.assumed_bytes_per_sec == 0 {
        return Err(ConfigError::Invalid(
            "provider.assumed_bytes_per_sec must be positive".into(),
        ));
    }
    if config.resolver.base_url.is_empty() {
        return Err(ConfigError::Invalid("resolver.base_url is empty".into()));
    }
    Ok(())
}
