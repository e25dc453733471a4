//! stream-notify binary entrypoint
//!
//! `stream-notify [run]`  poll forever and announce new events (default)
//! `stream-notify check`  probe every platform once and print what it sees

use anyhow::Context;
use stream_notify::scheduler::observe_all;
use stream_notify::{build_probes, build_scheduler, Settings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stream_notify=info,scheduler=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let scheduler = build_scheduler(&settings).await?;
    let running = scheduler.start();

    let shutdown = running.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested; waiting for in-flight tick"),
            Err(e) => tracing::error!(error = %e, "listening for ctrl-c failed; stopping"),
        }
        shutdown.cancel();
    });

    let engine = running.join().await.context("scheduler task panicked")?;
    tracing::info!(seen = engine.store().len(), "bye");
    Ok(())
}

async fn check(settings: Settings) -> anyhow::Result<()> {
    let probes = build_probes(&settings)?;
    for obs in observe_all(&probes, settings.probe_timeout()).await {
        match obs.live {
            Some(Ok(Some(sig))) => println!("🟢 {} is LIVE: {} ({})", obs.platform, sig.title, sig.source_url),
            Some(Ok(None)) => println!("🔴 {} not live", obs.platform),
            Some(Err(e)) => println!("⚠️  {} live check failed: {e}", obs.platform),
            None => {}
        }
        match obs.upload {
            Some(Ok(Some(up))) => println!("📹 {} latest upload: {} ({})", obs.platform, up.title, up.watch_url),
            Some(Ok(None)) => println!("   {} no fresh upload", obs.platform),
            Some(Err(e)) => println!("⚠️  {} upload check failed: {e}", obs.platform),
            None => {}
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::load_default().context("loading settings")?;
    let command = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());
    match command.as_str() {
        "run" => run(settings).await,
        "check" => check(settings).await,
        other => anyhow::bail!("unknown command `{other}` (expected `run` or `check`)"),
    }
}
