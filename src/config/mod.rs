// src/config/mod.rs
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::probe::filters::{default_excluded_substrings, DEFAULT_FRESHNESS_MINUTES};
use crate::probe::UploadFilter;
use crate::store::DEFAULT_STATE_PATH;

pub const ENV_CONFIG_PATH: &str = "STREAM_NOTIFY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/stream_notify.toml";

/// Marker value meaning "read this secret from its environment variable".
const FROM_ENV: &str = "ENV";

fn default_poll_interval() -> u64 {
    3
}
fn default_probe_timeout() -> u64 {
    30
}
fn default_announce_channel() -> String {
    "announcements".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitchSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Account login, e.g. the `name` in `twitch.tv/name`.
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeSettings {
    pub api_key: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordSettings {
    pub username: Option<String>,
    /// Destination name -> webhook URL.
    #[serde(default)]
    pub webhooks: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,
    #[serde(default = "default_freshness")]
    pub freshness_window_minutes: i64,
    #[serde(default = "default_excluded_substrings")]
    pub excluded_title_substrings: Vec<String>,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_announce_channel")]
    pub announce_channel: String,
    pub twitch: Option<TwitchSettings>,
    pub youtube: Option<YouTubeSettings>,
    #[serde(default)]
    pub discord: DiscordSettings,
}

fn default_freshness() -> i64 {
    DEFAULT_FRESHNESS_MINUTES
}
fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_minutes: default_poll_interval(),
            freshness_window_minutes: default_freshness(),
            excluded_title_substrings: default_excluded_substrings(),
            probe_timeout_secs: default_probe_timeout(),
            state_path: default_state_path(),
            announce_channel: default_announce_channel(),
            twitch: None,
            youtube: None,
            discord: DiscordSettings::default(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn upload_filter(&self) -> UploadFilter {
        UploadFilter::new(self.freshness_window_minutes, self.excluded_title_substrings.clone())
    }

    /// Parse TOML, resolve `"ENV"` secrets and validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: Settings = toml::from_str(s).context("parsing settings TOML")?;
        cfg.resolve_env_secrets()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("loading {}", path.display()))
    }

    /// Settings lookup order:
    /// 1) $STREAM_NOTIFY_CONFIG (must exist)
    /// 2) config/stream_notify.toml
    /// 3) environment variables only
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            anyhow::ensure!(pb.exists(), "{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Self::from_env()
    }

    /// Build settings purely from environment variables (the `.env` layout).
    pub fn from_env() -> Result<Self> {
        let mut cfg = Settings::default();
        if let Some(v) = env_nonempty("POLL_INTERVAL_MINUTES") {
            cfg.poll_interval_minutes = v.parse().context("POLL_INTERVAL_MINUTES")?;
        }
        if let Some(v) = env_nonempty("FRESHNESS_WINDOW_MINUTES") {
            cfg.freshness_window_minutes = v.parse().context("FRESHNESS_WINDOW_MINUTES")?;
        }
        if let Some(v) = env_nonempty("STATE_PATH") {
            cfg.state_path = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty("ANNOUNCEMENT_CHANNEL") {
            cfg.announce_channel = v;
        }
        if let Some(login) = env_nonempty("TWITCH_USERNAME") {
            cfg.twitch = Some(TwitchSettings {
                client_id: env::var("TWITCH_CLIENT_ID").unwrap_or_default(),
                client_secret: env::var("TWITCH_CLIENT_SECRET").unwrap_or_default(),
                login,
            });
        }
        if let Some(channel_id) = env_nonempty("YOUTUBE_CHANNEL_ID") {
            cfg.youtube = Some(YouTubeSettings {
                api_key: env::var("YOUTUBE_API_KEY").unwrap_or_default(),
                channel_id,
            });
        }
        if let Some(url) = env_nonempty("DISCORD_WEBHOOK_URL") {
            cfg.discord.webhooks.insert(cfg.announce_channel.clone(), url);
        }
        cfg.discord.username = env_nonempty("DISCORD_USERNAME");
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_env_secrets(&mut self) -> Result<(), ConfigError> {
        if let Some(t) = self.twitch.as_mut() {
            resolve(&mut t.client_id, "TWITCH_CLIENT_ID")?;
            resolve(&mut t.client_secret, "TWITCH_CLIENT_SECRET")?;
        }
        if let Some(y) = self.youtube.as_mut() {
            resolve(&mut y.api_key, "YOUTUBE_API_KEY")?;
        }
        if let Some(url) = self.discord.webhooks.get_mut(&self.announce_channel) {
            resolve(url, "DISCORD_WEBHOOK_URL")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_minutes == 0 {
            return Err(ConfigError::invalid("poll_interval_minutes", "must be > 0"));
        }
        if self.freshness_window_minutes < 0 {
            return Err(ConfigError::invalid("freshness_window_minutes", "must be >= 0"));
        }
        if self.probe_timeout_secs == 0 || self.probe_timeout() >= self.poll_interval() {
            return Err(ConfigError::invalid(
                "probe_timeout_secs",
                "must be > 0 and shorter than the poll interval",
            ));
        }
        if self.announce_channel.trim().is_empty() {
            return Err(ConfigError::Missing("announce_channel".into()));
        }
        if let Some(t) = &self.twitch {
            require("twitch.client_id", &t.client_id)?;
            require("twitch.client_secret", &t.client_secret)?;
            require("twitch.login", &t.login)?;
        }
        if let Some(y) = &self.youtube {
            require("youtube.api_key", &y.api_key)?;
            require("youtube.channel_id", &y.channel_id)?;
        }
        if !self.discord.webhooks.is_empty() && !self.discord.webhooks.contains_key(&self.announce_channel) {
            return Err(ConfigError::invalid(
                "discord.webhooks",
                format!("no webhook named `{}` (announce_channel)", self.announce_channel),
            ));
        }
        for (name, url) in &self.discord.webhooks {
            require(&format!("discord.webhooks.{name}"), url)?;
        }
        if self.twitch.is_none() && self.youtube.is_none() {
            return Err(ConfigError::NoPlatforms);
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn resolve(value: &mut String, var: &str) -> Result<(), ConfigError> {
    if value.trim().eq_ignore_ascii_case(FROM_ENV) {
        *value = env_nonempty(var).ok_or_else(|| ConfigError::Missing(var.to_string()))?;
    }
    Ok(())
}

fn require(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key.to_string()));
    }
    Ok(())
}
