use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use super::{Destination, NormalizedEvent, Notifier};
use crate::error::NotifyError;
use crate::probe::Platform;

const EMBED_COLOR: u32 = 0x0da2ff;
const MAX_RETRIES: u8 = 8;
const MAX_RETRY_WAIT: Duration = Duration::from_secs(30);

/// Posts one embed per event to a Discord webhook (the destination's endpoint).
#[derive(Clone)]
pub struct DiscordNotifier {
    client: Client,
    username: Option<String>,
    timeout: Duration,
    max_retries: u8,
}

impl Default for DiscordNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscordNotifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            username: None,
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.clamp(1, MAX_RETRIES);
        self
    }

    fn payload(&self, ev: &NormalizedEvent) -> DiscordWebhookPayload {
        let embed = match ev {
            NormalizedEvent::WentLive { platform, title, url } => DiscordEmbed {
                title: format!("🔴 LIVE on {}", platform_label(*platform)),
                description: title.clone(),
                url: url.clone(),
                color: EMBED_COLOR,
                fields: vec![EmbedField {
                    name: "📺 Watch Now".into(),
                    value: url.clone(),
                    inline: false,
                }],
                image: None,
            },
            NormalizedEvent::NewUpload {
                platform,
                title,
                url,
                thumbnail_url,
            } => DiscordEmbed {
                title: format!("📹 New upload on {}", platform_label(*platform)),
                description: title.clone(),
                url: url.clone(),
                color: EMBED_COLOR,
                fields: vec![EmbedField {
                    name: "🎬 Watch it".into(),
                    value: url.clone(),
                    inline: false,
                }],
                image: thumbnail_url.clone().map(|url| EmbedImage { url }),
            },
        };
        DiscordWebhookPayload {
            username: self.username.clone(),
            embeds: vec![embed],
        }
    }

    fn backoff(attempt: u8) -> Duration {
        let factor = 1u64.checked_shl(u32::from(attempt.saturating_sub(1))).unwrap_or(u64::MAX);
        Duration::from_millis(500u64.saturating_mul(factor)).min(MAX_RETRY_WAIT)
    }
}

fn platform_label(p: Platform) -> &'static str {
    match p {
        Platform::Twitch => "Twitch",
        Platform::YouTube => "YouTube",
    }
}

fn retry_after(rsp: &reqwest::Response) -> Option<Duration> {
    parse_retry_after(rsp.headers().get("retry-after")?.to_str().ok()?)
}

/// Seconds, possibly fractional. Anything non-finite or negative is ignored.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs).map_or(MAX_RETRY_WAIT, |d| d.min(MAX_RETRY_WAIT)))
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, destination: &Destination, ev: &NormalizedEvent) -> Result<(), NotifyError> {
        let payload = self.payload(ev);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&destination.endpoint)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status();
                    // 4xx other than 429 will not succeed on retry.
                    let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if retryable && attempt < self.max_retries {
                        let wait = retry_after(&rsp).unwrap_or_else(|| Self::backoff(attempt));
                        tracing::warn!(status = status.as_u16(), attempt, ?wait, "discord webhook retry");
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    return Err(NotifyError::Rejected {
                        status: status.as_u16(),
                    });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::warn!(error = %e, attempt, "discord webhook request failed; retrying");
                        tokio::time::sleep(Self::backoff(attempt)).await;
                        continue;
                    }
                    return Err(NotifyError::Request(e));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct EmbedImage {
    url: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    url: String,
    color: u32,
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    embeds: Vec<DiscordEmbed>,
}
