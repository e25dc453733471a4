//! Demo that pushes a few sample events through the configured notifier
//! (log only when no webhook is configured).

use stream_notify::host::Host;
use stream_notify::{build_delivery, NormalizedEvent, Notifier, Platform, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let settings = Settings::load_default()?;
    let (notifier, host) = build_delivery(&settings);
    host.wait_ready().await;
    let Some(dest) = host.resolve_destination(&settings.announce_channel) else {
        anyhow::bail!("destination `{}` not found", settings.announce_channel);
    };

    let events = [
        NormalizedEvent::WentLive {
            platform: Platform::Twitch,
            title: "demo stream".into(),
            url: "https://twitch.tv/example".into(),
        },
        NormalizedEvent::NewUpload {
            platform: Platform::YouTube,
            title: "Episode 12: Builds".into(),
            url: "https://youtube.com/watch?v=dQw4w9WgXcQ".into(),
            thumbnail_url: None,
        },
    ];

    for ev in &events {
        if let Err(e) = notifier.notify(&dest, ev).await {
            tracing::warn!(error = %e, kind = ev.kind(), "demo delivery failed");
        }
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    println!("notify-demo done");
    Ok(())
}
