//! Error taxonomy for the polling core.
//!
//! Nothing here is fatal to the process: every variant is either retried on the
//! next tick or reported and skipped. Only `ConfigError` aborts, and only at startup.

use std::time::Duration;

use thiserror::Error;

use crate::probe::Platform;

/// Credential exchange against the token endpoint failed.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("credentials not configured: {0}")]
    NotConfigured(&'static str),

    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("token endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token response has no access_token")]
    MissingToken,
}

/// One platform query failed or returned something we could not interpret.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{platform}: {source}")]
    Auth {
        platform: Platform,
        #[source]
        source: AuthError,
    },

    #[error("{platform}: request failed: {source}")]
    Http {
        platform: Platform,
        #[source]
        source: reqwest::Error,
    },

    #[error("{platform}: upstream returned HTTP {status}")]
    Status { platform: Platform, status: u16 },

    #[error("{platform}: malformed payload: {detail}")]
    Malformed { platform: Platform, detail: String },

    #[error("{platform}: probe timed out after {after:?}")]
    Timeout { platform: Platform, after: Duration },
}

impl ProbeError {
    pub fn platform(&self) -> Platform {
        match self {
            ProbeError::Auth { platform, .. }
            | ProbeError::Http { platform, .. }
            | ProbeError::Status { platform, .. }
            | ProbeError::Malformed { platform, .. }
            | ProbeError::Timeout { platform, .. } => *platform,
        }
    }

    pub(crate) fn malformed(platform: Platform, detail: impl Into<String>) -> Self {
        ProbeError::Malformed {
            platform,
            detail: detail.into(),
        }
    }
}

/// Persistence of the seen set failed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("seen store I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("seen store is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Delivery of a normalized event failed.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("destination rejected the message: HTTP {status}")]
    Rejected { status: u16 },
}

/// Startup configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(String),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: String, reason: String },

    #[error("no platform configured: set [twitch] and/or [youtube]")]
    NoPlatforms,
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
