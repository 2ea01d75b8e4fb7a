//! SQLite-backed request store implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::urlnorm;

use super::traits::RequestStore;
use super::types::{
    ContentType, GroupSettings, MediaRequest, MediaResult, MediaStatus, NewMediaRequest,
    StoreError,
};

/// SQLite-backed media request store.
pub struct SqliteRequestStore {
    conn: Mutex<Connection>,
}

impl SqliteRequestStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media_requests (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                canonical_url TEXT NOT NULL,
                content_type TEXT NOT NULL,
                status TEXT NOT NULL,
                caption TEXT,
                title TEXT,
                artist TEXT,
                media_path TEXT,
                thumbnail_path TEXT,
                artwork_url TEXT,
                platform_links TEXT,
                duration_secs REAL,
                file_size_bytes INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_requests_canonical_url
                ON media_requests(canonical_url);
            CREATE INDEX IF NOT EXISTS idx_media_requests_status
                ON media_requests(status);

            CREATE TABLE IF NOT EXISTS group_settings (
                group_id TEXT PRIMARY KEY,
                max_duration_secs INTEGER,
                max_file_size_mb INTEGER,
                active_provider_id TEXT
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_request(row: &rusqlite::Row) -> rusqlite::Result<MediaRequest> {
        let id: String = row.get(0)?;
        let group_id: String = row.get(1)?;
        let canonical_url: String = row.get(2)?;
        let content_type_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let caption: Option<String> = row.get(5)?;
        let title: Option<String> = row.get(6)?;
        let artist: Option<String> = row.get(7)?;
        let media_path: Option<String> = row.get(8)?;
        let thumbnail_path: Option<String> = row.get(9)?;
        let artwork_url: Option<String> = row.get(10)?;
        let platform_links_json: Option<String> = row.get(11)?;
        let duration_secs: Option<f64> = row.get(12)?;
        let file_size_bytes: Option<u64> = row.get(13)?;
        let created_at_str: String = row.get(14)?;
        let updated_at_str: String = row.get(15)?;

        // Parse timestamps - use now if parsing fails (shouldn't happen with valid data)
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let content_type = ContentType::parse(&content_type_str).unwrap_or(ContentType::Video);
        let status = MediaStatus::parse(&status_str).unwrap_or(MediaStatus::Downloading);

        let platform_links =
            platform_links_json.and_then(|json| serde_json::from_str(&json).ok());

        Ok(MediaRequest {
            id,
            group_id,
            canonical_url,
            content_type,
            status,
            caption,
            result: MediaResult {
                title,
                artist,
                media_path: media_path.map(PathBuf::from),
                thumbnail_path: thumbnail_path.map(PathBuf::from),
                artwork_url,
                platform_links,
                duration_secs,
                file_size_bytes,
            },
            created_at,
            updated_at,
        })
    }

    const REQUEST_COLUMNS: &'static str = "id, group_id, canonical_url, content_type, status, \
         caption, title, artist, media_path, thumbnail_path, artwork_url, platform_links, \
         duration_secs, file_size_bytes, created_at, updated_at";
}

impl RequestStore for SqliteRequestStore {
    fn create(&self, request: NewMediaRequest) -> Result<MediaRequest, StoreError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let canonical_url = urlnorm::normalize(&request.source_url);
        let status = MediaStatus::Downloading;

        conn.execute(
            "INSERT INTO media_requests (id, group_id, canonical_url, content_type, status, caption, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.group_id,
                canonical_url,
                request.content_type.as_str(),
                status.as_str(),
                request.caption,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(MediaRequest {
            id,
            group_id: request.group_id,
            canonical_url,
            content_type: request.content_type,
            status,
            caption: request.caption,
            result: MediaResult::default(),
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<MediaRequest>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!(
                "SELECT {} FROM media_requests WHERE id = ?",
                Self::REQUEST_COLUMNS
            ),
            params![id],
            Self::row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn find_ready_by_canonical_url(
        &self,
        canonical_url: &str,
    ) -> Result<Option<MediaRequest>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!(
                "SELECT {} FROM media_requests WHERE canonical_url = ? AND status = 'ready' ORDER BY updated_at DESC LIMIT 1",
                Self::REQUEST_COLUMNS
            ),
            params![canonical_url],
            Self::row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn update_result(
        &self,
        id: &str,
        result: &MediaResult,
        status: MediaStatus,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let platform_links_json = result
            .platform_links
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let changed = conn
            .execute(
                "UPDATE media_requests SET title = ?, artist = ?, media_path = ?, thumbnail_path = ?, artwork_url = ?, platform_links = ?, duration_secs = ?, file_size_bytes = ?, status = ?, updated_at = ? WHERE id = ?",
                params![
                    result.title,
                    result.artist,
                    result.media_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                    result.thumbnail_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                    result.artwork_url,
                    platform_links_json,
                    result.duration_secs,
                    result.file_size_bytes,
                    status.as_str(),
                    Utc::now().to_rfc3339(),
                    id,
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_status(&self, id: &str, status: MediaStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let changed = conn
            .execute(
                "UPDATE media_requests SET status = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn mark_failed(&self, id: &str, title: Option<&str>) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let changed = match title {
            Some(title) => conn.execute(
                "UPDATE media_requests SET status = 'failed', title = ?, updated_at = ? WHERE id = ?",
                params![title, Utc::now().to_rfc3339(), id],
            ),
            None => conn.execute(
                "UPDATE media_requests SET status = 'failed', updated_at = ? WHERE id = ?",
                params![Utc::now().to_rfc3339(), id],
            ),
        }
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn group_settings(&self, group_id: &str) -> Result<GroupSettings, StoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT max_duration_secs, max_file_size_mb, active_provider_id FROM group_settings WHERE group_id = ?",
            params![group_id],
            |row| {
                Ok(GroupSettings {
                    max_duration_secs: row.get(0)?,
                    max_file_size_mb: row.get(1)?,
                    active_provider_id: row.get(2)?,
                })
            },
        );

        match result {
            Ok(settings) => Ok(settings),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(GroupSettings::default()),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn set_group_settings(
        &self,
        group_id: &str,
        settings: &GroupSettings,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO group_settings (group_id, max_duration_secs, max_file_size_mb, active_provider_id) VALUES (?, ?, ?, ?) \
             ON CONFLICT(group_id) DO UPDATE SET max_duration_secs = excluded.max_duration_secs, max_file_size_mb = excluded.max_file_size_mb, active_provider_id = excluded.active_provider_id",
            params![
                group_id,
                settings.max_duration_secs,
                settings.max_file_size_mb,
                settings.active_provider_id,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_store() -> SqliteRequestStore {
        SqliteRequestStore::in_memory().unwrap()
    }

    fn submit(store: &SqliteRequestStore, url: &str) -> MediaRequest {
        store
            .create(NewMediaRequest {
                group_id: "group-1".to_string(),
                source_url: url.to_string(),
                content_type: ContentType::Video,
                caption: None,
            })
            .unwrap()
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let store = make_store();
        let created = submit(&store, "https://e.com/watch?v=1");

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.group_id, "group-1");
        assert_eq!(fetched.canonical_url, "https://e.com/watch?v=1");
        assert_eq!(fetched.status, MediaStatus::Downloading);
        assert_eq!(fetched.result, MediaResult::default());
    }

    #[test]
    fn test_create_canonicalizes_source_url() {
        let store = make_store();
        let created = submit(&store, "https://e.com/watch?v=1&si=tracker&utm_source=x");
        assert_eq!(created.canonical_url, "https://e.com/watch?v=1");
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = make_store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_result_and_find_ready() {
        let store = make_store();
        let created = submit(&store, "https://e.com/watch?v=1");

        // Not found while still downloading
        assert!(store
            .find_ready_by_canonical_url("https://e.com/watch?v=1")
            .unwrap()
            .is_none());

        let result = MediaResult {
            title: Some("A video".to_string()),
            media_path: Some(PathBuf::from("/media/abc.mp4")),
            thumbnail_path: Some(PathBuf::from("/media/abc.jpg")),
            duration_secs: Some(123.4),
            file_size_bytes: Some(9_000_000),
            ..Default::default()
        };
        store
            .update_result(&created.id, &result, MediaStatus::Ready)
            .unwrap();

        let found = store
            .find_ready_by_canonical_url("https://e.com/watch?v=1")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.status, MediaStatus::Ready);
        assert_eq!(found.result, result);
    }

    #[test]
    fn test_update_result_missing_row() {
        let store = make_store();
        let err = store
            .update_result("nope", &MediaResult::default(), MediaStatus::Ready)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_mark_failed_with_title() {
        let store = make_store();
        let created = submit(&store, "https://e.com/watch?v=1");

        store
            .mark_failed(&created.id, Some("Exceeds 5 min limit"))
            .unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.status, MediaStatus::Failed);
        assert_eq!(fetched.result.title.as_deref(), Some("Exceeds 5 min limit"));
    }

    #[test]
    fn test_mark_failed_preserves_existing_title() {
        let store = make_store();
        let created = submit(&store, "https://e.com/watch?v=1");

        let early = MediaResult {
            title: Some("Resolved Track".to_string()),
            artist: Some("Resolved Artist".to_string()),
            ..Default::default()
        };
        store
            .update_result(&created.id, &early, MediaStatus::Downloading)
            .unwrap();

        store.mark_failed(&created.id, None).unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.status, MediaStatus::Failed);
        assert_eq!(fetched.result.title.as_deref(), Some("Resolved Track"));
    }

    #[test]
    fn test_set_status_resets_failed_to_downloading() {
        let store = make_store();
        let created = submit(&store, "https://e.com/watch?v=1");
        store.mark_failed(&created.id, None).unwrap();

        store
            .set_status(&created.id, MediaStatus::Downloading)
            .unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.status, MediaStatus::Downloading);
        // Retry leaves the canonical URL (dedup key) unchanged
        assert_eq!(fetched.canonical_url, created.canonical_url);
    }

    #[test]
    fn test_platform_links_round_trip() {
        let store = make_store();
        let created = submit(&store, "https://e.com/watch?v=1");

        let links = serde_json::json!({
            "youtube": "https://youtube.com/watch?v=1",
            "spotify": "https://open.spotify.com/track/x",
        });
        let result = MediaResult {
            platform_links: Some(links.clone()),
            ..Default::default()
        };
        store
            .update_result(&created.id, &result, MediaStatus::Ready)
            .unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.result.platform_links, Some(links));
    }

    #[test]
    fn test_group_settings_default_when_absent() {
        let store = make_store();
        let settings = store.group_settings("no-such-group").unwrap();
        assert_eq!(settings, GroupSettings::default());
    }

    #[test]
    fn test_group_settings_round_trip() {
        let store = make_store();
        let settings = GroupSettings {
            max_duration_secs: Some(300),
            max_file_size_mb: Some(50),
            active_provider_id: Some("yt-dlp".to_string()),
        };
        store.set_group_settings("group-1", &settings).unwrap();
        assert_eq!(store.group_settings("group-1").unwrap(), settings);

        // Upsert overwrites
        let updated = GroupSettings {
            max_duration_secs: None,
            ..settings.clone()
        };
        store.set_group_settings("group-1", &updated).unwrap();
        assert_eq!(store.group_settings("group-1").unwrap(), updated);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("mediadrop.db");

        let id = {
            let store = SqliteRequestStore::new(&db_path).unwrap();
            submit(&store, "https://e.com/watch?v=1").id
        };

        let reopened = SqliteRequestStore::new(&db_path).unwrap();
        assert!(reopened.get(&id).unwrap().is_some());
    }
}
