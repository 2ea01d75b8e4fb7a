//! Persisted media request storage.
//!
//! One `MediaRequest` row per submission. Rows are created by the
//! submission layer with status `downloading` and mutated only by the
//! pipeline orchestrator that owns them; deletion is a collaborator
//! concern and never happens here.

mod sqlite;
mod traits;
mod types;

pub use sqlite::SqliteRequestStore;
pub use traits::RequestStore;
pub use types::{
    ContentType, GroupSettings, MediaRequest, MediaResult, MediaStatus, NewMediaRequest,
    StoreError,
};
