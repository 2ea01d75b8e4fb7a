//! Acquisition providers.
//!
//! A provider turns a source URL (or search query) into media files on
//! disk, usually by driving an external command-line tool. Providers are
//! capability-typed: a group's active provider must support the content
//! type being acquired.

mod error;
mod registry;
mod traits;
mod types;
mod ytdlp;

pub use error::ProviderError;
pub use registry::ProviderRegistry;
pub use traits::MediaProvider;
pub use types::{AudioDownload, Capability, DownloadOptions, ProviderStatus, VideoDownload};
pub use ytdlp::{YtDlpProvider, YTDLP_PROVIDER_ID};
