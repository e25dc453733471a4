// tests/metrics.rs
mod common;

use common::*;
use metrics_exporter_prometheus::PrometheusBuilder;
use stream_notify::store::SeenEventStore;
use stream_notify::{Platform, PlatformProbes};

#[tokio::test]
async fn tick_exports_expected_series() {
    // Install a local recorder for this test binary
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let dir = tempfile::tempdir().unwrap();
    let live = ScriptedLive::new(Platform::Twitch, vec![Err(malformed(Platform::Twitch))]);
    let upload = ScriptedUpload::new(Platform::YouTube, vec![Ok(Some(upload("v1")))]);
    let mut engine = engine_with(
        vec![
            PlatformProbes {
                platform: Platform::Twitch,
                live: Some(live),
                upload: None,
            },
            PlatformProbes {
                platform: Platform::YouTube,
                live: None,
                upload: Some(upload),
            },
        ],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        RecordingNotifier::new(),
    )
    .await;

    let report = engine.run_tick().await;
    assert_eq!(report.sent.len(), 1);

    let out = handle.render();
    for needle in [
        "notify_ticks_total",
        "notify_probe_errors_total",
        "notify_events_sent_total",
        "notify_last_tick_ts",
    ] {
        assert!(out.contains(needle), "missing `{needle}` in:\n{out}");
    }
}
