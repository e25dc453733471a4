// src/probe/types.rs
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Upstream platforms the poller knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    YouTube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::YouTube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time answer to "is this account streaming right now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSignal {
    pub is_live: bool,
    pub title: String,
    pub source_url: String,
}

/// One discrete piece of published content. `id` is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEvent {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub watch_url: String,
}

#[async_trait]
pub trait LiveProbe: Send + Sync {
    /// `Ok(None)` means the account is not streaming.
    async fn probe_live(&self) -> Result<Option<LiveSignal>, ProbeError>;
    fn platform(&self) -> Platform;
}

#[async_trait]
pub trait UploadProbe: Send + Sync {
    /// Most recent item that passed the freshness and title filters.
    async fn probe_latest_upload(&self) -> Result<Option<UploadEvent>, ProbeError>;
    fn platform(&self) -> Platform;
}
