pub mod config;
pub mod coordinator;
pub mod notify;
pub mod pipeline;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod testing;
pub mod urlnorm;

pub use config::{load_config, load_config_from_str, validate_config, ConfigError, EngineConfig};
pub use coordinator::{DownloadCoordinator, LeaderOutcome};
pub use notify::{LogNotifier, NotificationSink, NotifyError};
pub use pipeline::{MediaPipeline, PipelineError};
pub use provider::{
    AudioDownload, Capability, DownloadOptions, MediaProvider, ProviderError, ProviderRegistry,
    ProviderStatus, VideoDownload, YtDlpProvider, YTDLP_PROVIDER_ID,
};
pub use resolver::{MetadataResolver, ResolverError, SongLinkResolver, TrackMetadata};
pub use store::{
    ContentType, GroupSettings, MediaRequest, MediaResult, MediaStatus, NewMediaRequest,
    RequestStore, SqliteRequestStore, StoreError,
};
pub use urlnorm::normalize;
