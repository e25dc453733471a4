// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod host;
pub mod notify;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod tracker;

// ---- Re-exports for stable public API ----
pub use crate::config::Settings;
pub use crate::notify::{Destination, NormalizedEvent, Notifier};
pub use crate::probe::{LiveProbe, LiveSignal, Platform, UploadEvent, UploadProbe};
pub use crate::scheduler::{EngineConfig, PlatformProbes, PollEngine, PollScheduler, RunningScheduler, TickReport};

use std::sync::Arc;

use anyhow::Context;

use crate::auth::{CredentialCache, TwitchTokenExchange};
use crate::host::{Host, StaticHost, WebhookHost};
use crate::notify::{DiscordNotifier, LogNotifier};
use crate::probe::twitch::TwitchProbe;
use crate::probe::youtube::YouTubeProbe;
use crate::store::SeenEventStore;

/// Build the probes for every platform present in `settings`.
pub fn build_probes(settings: &Settings) -> anyhow::Result<Vec<PlatformProbes>> {
    let mut out = Vec::new();
    let filter = settings.upload_filter();

    if let Some(t) = &settings.twitch {
        let exchange = TwitchTokenExchange::new(t.client_id.clone(), t.client_secret.clone())
            .context("twitch credential exchange")?;
        let credentials = Arc::new(CredentialCache::new(Arc::new(exchange)));
        let probe = Arc::new(
            TwitchProbe::new(t.client_id.clone(), t.login.clone(), credentials, filter.clone())
                .context("twitch probe")?,
        );
        out.push(PlatformProbes {
            platform: Platform::Twitch,
            live: Some(probe.clone()),
            upload: Some(probe),
        });
    }

    if let Some(y) = &settings.youtube {
        let probe = Arc::new(
            YouTubeProbe::new(y.api_key.clone(), y.channel_id.clone(), filter).context("youtube probe")?,
        );
        out.push(PlatformProbes {
            platform: Platform::YouTube,
            live: Some(probe.clone()),
            upload: Some(probe),
        });
    }

    Ok(out)
}

/// Discord webhooks when any are configured, otherwise log-only delivery.
pub fn build_delivery(settings: &Settings) -> (Arc<dyn Notifier>, Arc<dyn Host>) {
    if settings.discord.webhooks.is_empty() {
        tracing::warn!("no Discord webhooks configured; announcements go to the log only");
        let host = StaticHost::single(settings.announce_channel.clone(), "log");
        return (Arc::new(LogNotifier), Arc::new(host));
    }
    let notifier = DiscordNotifier::new().with_username(settings.discord.username.clone());
    let host = WebhookHost::new(settings.discord.webhooks.clone(), settings.announce_channel.clone());
    tracing::info!(
        notifier = notifier.name(),
        destinations = settings.discord.webhooks.len(),
        "delivery configured"
    );
    (Arc::new(notifier), Arc::new(host))
}

/// Assemble a ready-to-start scheduler from settings.
pub async fn build_scheduler(settings: &Settings) -> anyhow::Result<PollScheduler> {
    let probes = build_probes(settings)?;
    let (notifier, host) = build_delivery(settings);
    let store = SeenEventStore::open(settings.state_path.clone()).await;
    let engine = PollEngine::new(
        probes,
        store,
        notifier,
        host,
        EngineConfig {
            probe_timeout: settings.probe_timeout(),
            announce_channel: settings.announce_channel.clone(),
        },
    );
    Ok(PollScheduler::new(engine, settings.poll_interval()))
}
