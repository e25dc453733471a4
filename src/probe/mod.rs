// src/probe/mod.rs
pub mod filters;
pub mod twitch;
pub mod types;
pub mod youtube;

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::ProbeError;

pub use filters::UploadFilter;
pub use types::{LiveProbe, LiveSignal, Platform, UploadEvent, UploadProbe};

pub(crate) fn http_client(platform: Platform) -> Result<reqwest::Client, ProbeError> {
    reqwest::Client::builder()
        .user_agent(concat!("stream-notify/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|source| ProbeError::Http { platform, source })
}

/// Read the body of a response that must be 2xx and decode it as `T`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    platform: Platform,
    resp: reqwest::Response,
) -> Result<T, ProbeError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(%platform, status = status.as_u16(), body = %truncate(&body, 300), "probe non-2xx");
        return Err(ProbeError::Status {
            platform,
            status: status.as_u16(),
        });
    }
    let body = resp
        .text()
        .await
        .map_err(|source| ProbeError::Http { platform, source })?;
    parse_json(platform, &body)
}

pub(crate) fn parse_json<T: DeserializeOwned>(platform: Platform, body: &str) -> Result<T, ProbeError> {
    serde_json::from_str(body).map_err(|e| ProbeError::malformed(platform, e.to_string()))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
