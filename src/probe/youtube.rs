// src/probe/youtube.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ProbeError;
use crate::probe::{read_json, LiveProbe, LiveSignal, Platform, UploadEvent, UploadFilter, UploadProbe};

pub const DATA_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

const PLATFORM: Platform = Platform::YouTube;

// A 200 without `items` is treated as malformed rather than "nothing there".
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    items: Option<Vec<T>>,
}

impl<T> ListResponse<T> {
    fn first(self) -> Result<Option<T>, ProbeError> {
        self.items
            .map(|v| v.into_iter().next())
            .ok_or_else(|| ProbeError::malformed(PLATFORM, "response has no `items`"))
    }
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    live_broadcast_content: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.high.or(self.medium).or(self.default).map(|t| t.url)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    snippet: Snippet,
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    actual_start_time: Option<DateTime<Utc>>,
    actual_end_time: Option<DateTime<Utc>>,
}

impl LiveStreamingDetails {
    /// Started and not yet ended. A scheduled broadcast only has `scheduledStartTime`.
    fn is_on_air(&self) -> bool {
        self.actual_start_time.is_some() && self.actual_end_time.is_none()
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://youtube.com/watch?v={video_id}")
}

fn decode_title(raw: &str) -> String {
    html_escape::decode_html_entities(raw).trim().to_string()
}

/// YouTube Data API v3 probe for one channel, authenticated by API key.
pub struct YouTubeProbe {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    channel_id: String,
    filter: UploadFilter,
}

impl YouTubeProbe {
    pub fn new(api_key: String, channel_id: String, filter: UploadFilter) -> Result<Self, ProbeError> {
        Ok(Self {
            http: super::http_client(PLATFORM)?,
            api_base: DATA_API_BASE.to_string(),
            api_key,
            channel_id,
            filter,
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    async fn get<T: DeserializeOwned>(&self, resource: &str, query: &[(&str, &str)]) -> Result<T, ProbeError> {
        let resp = self
            .http
            .get(format!("{}/{}", self.api_base, resource))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|source| ProbeError::Http {
                platform: PLATFORM,
                source,
            })?;
        read_json(PLATFORM, resp).await
    }

    async fn newest_search_hit(&self, extra: &[(&str, &str)]) -> Result<Option<SearchItem>, ProbeError> {
        let mut query = vec![
            ("part", "snippet"),
            ("channelId", self.channel_id.as_str()),
            ("type", "video"),
            ("maxResults", "1"),
        ];
        query.extend_from_slice(extra);
        let resp: ListResponse<SearchItem> = self.get("search", &query).await?;
        resp.first()
    }
}

#[async_trait]
impl LiveProbe for YouTubeProbe {
    async fn probe_live(&self) -> Result<Option<LiveSignal>, ProbeError> {
        let Some(candidate) = self.newest_search_hit(&[("eventType", "live")]).await? else {
            return Ok(None);
        };
        let video_id = candidate
            .id
            .video_id
            .ok_or_else(|| ProbeError::malformed(PLATFORM, "live search hit has no videoId"))?;

        // Search results lag and include scheduled broadcasts; confirm with the videos resource.
        let resp: ListResponse<VideoItem> = self
            .get(
                "videos",
                &[("part", "snippet,liveStreamingDetails"), ("id", video_id.as_str())],
            )
            .await?;
        let Some(video) = resp.first()? else {
            tracing::debug!(%video_id, "live candidate vanished before confirmation");
            return Ok(None);
        };
        match video.live_streaming_details {
            Some(details) if details.is_on_air() => Ok(Some(LiveSignal {
                is_live: true,
                title: decode_title(&video.snippet.title),
                source_url: watch_url(&video_id),
            })),
            _ => {
                tracing::debug!(%video_id, "live candidate not on air (scheduled or ended)");
                Ok(None)
            }
        }
    }

    fn platform(&self) -> Platform {
        PLATFORM
    }
}

#[async_trait]
impl UploadProbe for YouTubeProbe {
    async fn probe_latest_upload(&self) -> Result<Option<UploadEvent>, ProbeError> {
        let Some(item) = self.newest_search_hit(&[("order", "date")]).await? else {
            return Ok(None);
        };
        let video_id = item
            .id
            .video_id
            .ok_or_else(|| ProbeError::malformed(PLATFORM, "search hit has no videoId"))?;

        // "live" and "upcoming" entries are broadcasts, not uploads.
        let broadcast = item.snippet.live_broadcast_content.as_deref().unwrap_or("none");
        if broadcast != "none" {
            tracing::debug!(%video_id, broadcast, "newest item is a broadcast; skipping");
            return Ok(None);
        }

        let ev = UploadEvent {
            watch_url: watch_url(&video_id),
            id: video_id,
            title: decode_title(&item.snippet.title),
            thumbnail_url: item.snippet.thumbnails.best(),
            published_at: item.snippet.published_at,
        };
        Ok(self.filter.admit(ev, Utc::now()))
    }

    fn platform(&self) -> Platform {
        PLATFORM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::parse_json;

    #[test]
    fn titles_are_html_decoded() {
        assert_eq!(decode_title("Don&#39;t &amp; Won&#39;t "), "Don't & Won't");
    }

    #[test]
    fn missing_items_is_malformed_but_empty_items_is_absent() {
        let missing: ListResponse<SearchItem> = parse_json(PLATFORM, r#"{"kind":"youtube#searchListResponse"}"#).unwrap();
        assert!(missing.first().is_err());
        let empty: ListResponse<SearchItem> = parse_json(PLATFORM, r#"{"items":[]}"#).unwrap();
        assert!(empty.first().unwrap().is_none());
    }

    #[test]
    fn scheduled_broadcast_is_not_on_air() {
        let d: LiveStreamingDetails = serde_json::from_str(r#"{"scheduledStartTime":"2025-09-06T10:00:00Z"}"#).unwrap();
        assert!(!d.is_on_air());
        let d: LiveStreamingDetails = serde_json::from_str(r#"{"actualStartTime":"2025-09-06T10:00:00Z"}"#).unwrap();
        assert!(d.is_on_air());
        let d: LiveStreamingDetails = serde_json::from_str(
            r#"{"actualStartTime":"2025-09-06T10:00:00Z","actualEndTime":"2025-09-06T12:00:00Z"}"#,
        )
        .unwrap();
        assert!(!d.is_on_air());
    }

    #[test]
    fn best_thumbnail_prefers_high() {
        let t: Thumbnails = serde_json::from_str(
            r#"{"default":{"url":"d"},"medium":{"url":"m"},"high":{"url":"h"}}"#,
        )
        .unwrap();
        assert_eq!(t.best().as_deref(), Some("h"));
        assert_eq!(Thumbnails::default().best(), None);
    }
}
