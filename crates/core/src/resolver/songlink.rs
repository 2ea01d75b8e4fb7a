//! song.link (Odesli) API client.
//!
//! One unauthenticated GET per lookup; the free tier is rate limited to
//! roughly 10 requests per minute, which is plenty for a private group.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::ResolverConfig;

use super::{MetadataResolver, ResolverError, TrackMetadata};

/// song.link API client.
pub struct SongLinkResolver {
    client: Client,
    base_url: String,
}

impl SongLinkResolver {
    /// Create a new resolver client.
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MetadataResolver for SongLinkResolver {
    async fn resolve(&self, url: &str) -> Result<TrackMetadata, ResolverError> {
        let request_url = format!(
            "{}/v1-alpha.1/links?url={}",
            self.base_url,
            urlencoding::encode(url)
        );

        debug!(url, "resolving track metadata");

        let response = self.client.get(&request_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolverError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let links: LinksResponse = response
            .json()
            .await
            .map_err(|e| ResolverError::Parse(e.to_string()))?;

        Ok(links.into_metadata())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinksResponse {
    #[serde(default)]
    entity_unique_id: Option<String>,
    #[serde(default)]
    entities_by_unique_id: HashMap<String, Entity>,
    #[serde(default)]
    links_by_platform: HashMap<String, PlatformLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entity {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformLink {
    url: String,
}

impl LinksResponse {
    fn into_metadata(mut self) -> TrackMetadata {
        // The response names its primary entity; fall back to any entity
        // that carries a title.
        let entity = self
            .entity_unique_id
            .as_deref()
            .and_then(|id| self.entities_by_unique_id.remove(id))
            .or_else(|| {
                let key = self
                    .entities_by_unique_id
                    .iter()
                    .find(|(_, e)| e.title.is_some())
                    .map(|(k, _)| k.clone())?;
                self.entities_by_unique_id.remove(&key)
            });

        let platform_links: BTreeMap<String, String> = self
            .links_by_platform
            .iter()
            .map(|(platform, link)| (platform.clone(), link.url.clone()))
            .collect();

        let youtube_url = platform_links.get("youtube").cloned();

        match entity {
            Some(entity) => TrackMetadata {
                title: entity.title,
                artist: entity.artist_name,
                artwork_url: entity.thumbnail_url,
                platform_links,
                youtube_url,
            },
            None => TrackMetadata {
                platform_links,
                youtube_url,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
        "entityUniqueId": "SPOTIFY_SONG::abc",
        "entitiesByUniqueId": {
            "SPOTIFY_SONG::abc": {
                "title": "One More Time",
                "artistName": "Daft Punk",
                "thumbnailUrl": "https://img.example/cover.jpg",
                "apiProvider": "spotify"
            },
            "YOUTUBE_VIDEO::xyz": {
                "title": "One More Time (Official)",
                "artistName": "Daft Punk",
                "apiProvider": "youtube"
            }
        },
        "linksByPlatform": {
            "spotify": { "url": "https://open.spotify.com/track/abc", "entityUniqueId": "SPOTIFY_SONG::abc" },
            "youtube": { "url": "https://www.youtube.com/watch?v=xyz", "entityUniqueId": "YOUTUBE_VIDEO::xyz" }
        }
    }"#;

    #[test]
    fn test_parse_links_response() {
        let links: LinksResponse = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        let metadata = links.into_metadata();

        assert_eq!(metadata.title.as_deref(), Some("One More Time"));
        assert_eq!(metadata.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(
            metadata.artwork_url.as_deref(),
            Some("https://img.example/cover.jpg")
        );
        assert_eq!(
            metadata.youtube_url.as_deref(),
            Some("https://www.youtube.com/watch?v=xyz")
        );
        assert_eq!(metadata.platform_links.len(), 2);
        assert_eq!(
            metadata.platform_links.get("spotify").map(String::as_str),
            Some("https://open.spotify.com/track/abc")
        );
    }

    #[test]
    fn test_parse_response_without_primary_entity() {
        let json = r#"{
            "entitiesByUniqueId": {
                "X::1": { "title": "Track", "artistName": "Artist" }
            },
            "linksByPlatform": {}
        }"#;
        let links: LinksResponse = serde_json::from_str(json).unwrap();
        let metadata = links.into_metadata();
        assert_eq!(metadata.title.as_deref(), Some("Track"));
        assert!(metadata.youtube_url.is_none());
    }

    #[test]
    fn test_parse_empty_response() {
        let links: LinksResponse = serde_json::from_str("{}").unwrap();
        let metadata = links.into_metadata();
        assert_eq!(metadata, TrackMetadata::default());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let resolver = SongLinkResolver::new(&ResolverConfig {
            base_url: "https://api.song.link/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(resolver.base_url, "https://api.song.link");
    }
}
