//! Bearer credential cache for the Twitch Helix API.
//!
//! Refresh is lazy: a cached token is reused until the caller reports it was
//! rejected (`invalidate`) or the optional `expires_in` deadline passes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::AuthError;

pub const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Tokens are refreshed this long before their advertised expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCredential {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BearerCredential {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => false,
            Some(exp) => now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) >= exp,
        }
    }
}

/// Performs one credential exchange against an upstream token endpoint.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self) -> Result<BearerCredential, AuthError>;
}

/// Client-credentials grant against the Twitch identity service.
pub struct TwitchTokenExchange {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl TwitchTokenExchange {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, AuthError> {
        if client_id.trim().is_empty() {
            return Err(AuthError::NotConfigured("twitch client_id"));
        }
        if client_secret.trim().is_empty() {
            return Err(AuthError::NotConfigured("twitch client_secret"));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            token_url: TWITCH_TOKEN_URL.to_string(),
            client_id,
            client_secret,
        })
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[async_trait]
impl TokenExchange for TwitchTokenExchange {
    async fn exchange(&self) -> Result<BearerCredential, AuthError> {
        let resp = self
            .http
            .post(&self.token_url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: TokenResponse = resp.json().await?;
        let value = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let obtained_at = Utc::now();
        Ok(BearerCredential {
            value,
            obtained_at,
            expires_at: body
                .expires_in
                .filter(|s| *s > 0)
                .map(|s| obtained_at + ChronoDuration::seconds(s)),
        })
    }
}

/// Holds at most one credential; concurrent callers serialize on the refresh.
pub struct CredentialCache {
    exchange: Arc<dyn TokenExchange>,
    current: Mutex<Option<BearerCredential>>,
}

impl CredentialCache {
    pub fn new(exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            exchange,
            current: Mutex::new(None),
        }
    }

    pub async fn get_token(&self) -> Result<BearerCredential, AuthError> {
        let mut slot = self.current.lock().await;
        if let Some(cred) = slot.as_ref() {
            if !cred.is_stale(Utc::now()) {
                return Ok(cred.clone());
            }
            tracing::debug!("cached bearer token near expiry; refreshing");
        }
        let fresh = self.exchange.exchange().await?;
        tracing::info!(expires_at = ?fresh.expires_at, "obtained bearer token");
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached token after the upstream rejected it.
    pub async fn invalidate(&self) {
        let mut slot = self.current.lock().await;
        if slot.take().is_some() {
            tracing::info!("bearer token invalidated");
        }
    }
}
