pub mod discord;
pub mod log;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::NotifyError;
use crate::probe::Platform;

pub use discord::DiscordNotifier;
pub use log::LogNotifier;

/// The only thing the polling core hands to the rendering side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedEvent {
    WentLive {
        platform: Platform,
        title: String,
        url: String,
    },
    NewUpload {
        platform: Platform,
        title: String,
        url: String,
        thumbnail_url: Option<String>,
    },
}

impl NormalizedEvent {
    pub fn platform(&self) -> Platform {
        match self {
            NormalizedEvent::WentLive { platform, .. } | NormalizedEvent::NewUpload { platform, .. } => *platform,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            NormalizedEvent::WentLive { title, .. } | NormalizedEvent::NewUpload { title, .. } => title,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            NormalizedEvent::WentLive { url, .. } | NormalizedEvent::NewUpload { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedEvent::WentLive { .. } => "went_live",
            NormalizedEvent::NewUpload { .. } => "new_upload",
        }
    }
}

/// A named place announcements go to, resolved by the host at tick time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub name: String,
    pub endpoint: String,
}

/// Delivers events. Must tolerate being called twice for the same event:
/// the core avoids duplicates but cannot rule them out across restarts.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, destination: &Destination, event: &NormalizedEvent) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}
