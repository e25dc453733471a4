// src/probe/twitch.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::auth::CredentialCache;
use crate::error::ProbeError;
use crate::probe::{read_json, LiveProbe, LiveSignal, Platform, UploadEvent, UploadFilter, UploadProbe};

pub const HELIX_BASE: &str = "https://api.twitch.tv/helix";

const PLATFORM: Platform = Platform::Twitch;

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Video {
    id: String,
    title: String,
    url: String,
    #[serde(default)]
    thumbnail_url: String,
    published_at: DateTime<Utc>,
}

/// Live status via `helix/streams`, latest upload via `helix/videos`.
pub struct TwitchProbe {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    login: String,
    credentials: Arc<CredentialCache>,
    filter: UploadFilter,
    user_id: OnceCell<String>,
}

impl TwitchProbe {
    pub fn new(
        client_id: String,
        login: String,
        credentials: Arc<CredentialCache>,
        filter: UploadFilter,
    ) -> Result<Self, ProbeError> {
        Ok(Self {
            http: super::http_client(PLATFORM)?,
            api_base: HELIX_BASE.to_string(),
            client_id,
            login,
            credentials,
            filter,
            user_id: OnceCell::new(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn channel_url(&self) -> String {
        format!("https://twitch.tv/{}", self.login)
    }

    async fn send(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ProbeError> {
        let token = self
            .credentials
            .get_token()
            .await
            .map_err(|source| ProbeError::Auth {
                platform: PLATFORM,
                source,
            })?;
        self.http
            .get(format!("{}/{}", self.api_base, path))
            .query(query)
            .header("Client-ID", &self.client_id)
            .bearer_auth(&token.value)
            .send()
            .await
            .map_err(|source| ProbeError::Http {
                platform: PLATFORM,
                source,
            })
    }

    /// GET a Helix endpoint; a 401 drops the cached token and retries once.
    async fn helix_get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ProbeError> {
        let mut resp = self.send(path, query).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "twitch rejected bearer token; refreshing and retrying once");
            self.credentials.invalidate().await;
            resp = self.send(path, query).await?;
        }
        read_json(PLATFORM, resp).await
    }

    async fn resolve_user_id(&self) -> Result<&str, ProbeError> {
        let id = self
            .user_id
            .get_or_try_init(|| async {
                let page: Page<User> = self.helix_get("users", &[("login", self.login.as_str())]).await?;
                page.data
                    .into_iter()
                    .next()
                    .map(|u| u.id)
                    .ok_or_else(|| ProbeError::malformed(PLATFORM, format!("no user with login `{}`", self.login)))
            })
            .await?;
        Ok(id.as_str())
    }
}

fn expand_thumbnail(template: &str) -> Option<String> {
    if template.is_empty() {
        return None;
    }
    Some(template.replace("%{width}", "1280").replace("%{height}", "720"))
}

#[async_trait]
impl LiveProbe for TwitchProbe {
    async fn probe_live(&self) -> Result<Option<LiveSignal>, ProbeError> {
        let page: Page<Stream> = self.helix_get("streams", &[("user_login", self.login.as_str())]).await?;
        Ok(page
            .data
            .into_iter()
            .next()
            .filter(|s| s.kind == "live")
            .map(|s| LiveSignal {
                is_live: true,
                title: s.title,
                source_url: self.channel_url(),
            }))
    }

    fn platform(&self) -> Platform {
        PLATFORM
    }
}

#[async_trait]
impl UploadProbe for TwitchProbe {
    async fn probe_latest_upload(&self) -> Result<Option<UploadEvent>, ProbeError> {
        let user_id = self.resolve_user_id().await?;
        let page: Page<Video> = self
            .helix_get("videos", &[("user_id", user_id), ("type", "upload"), ("first", "1")])
            .await?;
        let Some(v) = page.data.into_iter().next() else {
            return Ok(None);
        };
        let ev = UploadEvent {
            thumbnail_url: expand_thumbnail(&v.thumbnail_url),
            id: v.id,
            title: v.title,
            published_at: v.published_at,
            watch_url: v.url,
        };
        Ok(self.filter.admit(ev, Utc::now()))
    }

    fn platform(&self) -> Platform {
        PLATFORM
    }
}
