// tests/scheduler_scenarios.rs
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::*;
use stream_notify::host::StaticHost;
use stream_notify::store::SeenEventStore;
use stream_notify::tracker::LiveState;
use stream_notify::{NormalizedEvent, Platform, PlatformProbes, PollEngine};

fn live_only(probe: Arc<ScriptedLive>) -> PlatformProbes {
    PlatformProbes {
        platform: probe.platform,
        live: Some(probe),
        upload: None,
    }
}

fn upload_only(probe: Arc<ScriptedUpload>) -> PlatformProbes {
    PlatformProbes {
        platform: probe.platform,
        live: None,
        upload: Some(probe),
    }
}

#[tokio::test]
async fn went_live_is_announced_once_per_stream() {
    let dir = tempfile::tempdir().unwrap();
    let probe = ScriptedLive::new(
        Platform::Twitch,
        vec![
            Ok(Some(live("speedrun"))),
            Ok(Some(live("speedrun"))),
            Ok(None),
            Ok(Some(live("speedrun, part 2"))),
        ],
    );
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(
        vec![live_only(probe)],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        notifier.clone(),
    )
    .await;

    let sent: Vec<usize> = {
        let mut v = Vec::new();
        for _ in 0..4 {
            v.push(engine.run_tick().await.sent.len());
        }
        v
    };
    assert_eq!(sent, vec![1, 0, 0, 1]);
    assert_eq!(engine.tracker().state(Platform::Twitch), LiveState::Announced);

    let delivered = notifier.delivered();
    assert_eq!(delivered.len(), 2);
    assert!(matches!(
        &delivered[1],
        NormalizedEvent::WentLive { platform: Platform::Twitch, title, .. } if title == "speedrun, part 2"
    ));
}

#[tokio::test]
async fn new_upload_is_announced_then_remembered() {
    let dir = tempfile::tempdir().unwrap();
    let probe = ScriptedUpload::new(Platform::YouTube, vec![Ok(Some(upload("v1"))), Ok(Some(upload("v1")))]);
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(
        vec![upload_only(probe)],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        notifier.clone(),
    )
    .await;

    let first = engine.run_tick().await;
    assert_eq!(first.sent.len(), 1);
    assert!(engine.store().has(Platform::YouTube, "v1"));

    let second = engine.run_tick().await;
    assert!(second.sent.is_empty());
    assert_eq!(notifier.delivered().len(), 1);
}

#[tokio::test]
async fn failed_delivery_is_not_marked_and_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let probe = ScriptedUpload::new(Platform::YouTube, vec![Ok(Some(upload("v1"))), Ok(Some(upload("v1")))]);
    let notifier = RecordingNotifier::new();
    notifier.fail_for("https://youtube.com/watch?v=v1");
    let mut engine = engine_with(
        vec![upload_only(probe)],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        notifier.clone(),
    )
    .await;

    let first = engine.run_tick().await;
    assert_eq!(first.notify_errors, 1);
    assert!(!engine.store().has(Platform::YouTube, "v1"));

    notifier.heal();
    let second = engine.run_tick().await;
    assert_eq!(second.sent.len(), 1);
    assert!(engine.store().has(Platform::YouTube, "v1"));
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_went_live_delivery_is_retried_while_still_live() {
    let dir = tempfile::tempdir().unwrap();
    let probe = ScriptedLive::new(
        Platform::Twitch,
        vec![Ok(Some(live("speedrun"))), Ok(Some(live("speedrun"))), Ok(Some(live("speedrun")))],
    );
    let notifier = RecordingNotifier::new();
    notifier.fail_for("https://twitch.tv/someone");
    let mut engine = engine_with(
        vec![live_only(probe)],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        notifier.clone(),
    )
    .await;

    assert_eq!(engine.run_tick().await.notify_errors, 1);
    assert_eq!(engine.tracker().state(Platform::Twitch), LiveState::Idle);

    notifier.heal();
    assert_eq!(engine.run_tick().await.sent.len(), 1);
    assert!(engine.run_tick().await.sent.is_empty());
}

#[tokio::test]
async fn probe_failure_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let twitch_live = ScriptedLive::new(Platform::Twitch, vec![Err(malformed(Platform::Twitch))]);
    let twitch_upload = ScriptedUpload::new(Platform::Twitch, vec![Ok(Some(upload("t1")))]);
    let yt_live = ScriptedLive::new(Platform::YouTube, vec![Ok(Some(live("premiere")))]);
    let yt_upload = ScriptedUpload::new(Platform::YouTube, vec![Err(malformed(Platform::YouTube))]);
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(
        vec![
            PlatformProbes {
                platform: Platform::Twitch,
                live: Some(twitch_live),
                upload: Some(twitch_upload),
            },
            PlatformProbes {
                platform: Platform::YouTube,
                live: Some(yt_live),
                upload: Some(yt_upload),
            },
        ],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        notifier.clone(),
    )
    .await;

    let report = engine.run_tick().await;
    assert_eq!(report.probe_calls, 4);
    assert_eq!(report.probe_errors, 2);
    assert_eq!(report.sent.len(), 2);
    assert!(!report.is_blind());
    assert!(engine.store().has(Platform::Twitch, "t1"));
    assert_eq!(engine.tracker().state(Platform::YouTube), LiveState::Announced);
}

#[tokio::test]
async fn probe_error_while_live_does_not_rearm() {
    let dir = tempfile::tempdir().unwrap();
    let probe = ScriptedLive::new(
        Platform::Twitch,
        vec![
            Ok(Some(live("speedrun"))),
            Err(malformed(Platform::Twitch)),
            Ok(Some(live("speedrun"))),
        ],
    );
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(
        vec![live_only(probe)],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        notifier.clone(),
    )
    .await;

    for _ in 0..3 {
        engine.run_tick().await;
    }
    assert_eq!(notifier.delivered().len(), 1);
}

#[tokio::test]
async fn consecutive_blind_ticks_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    let probe = ScriptedLive::new(
        Platform::Twitch,
        vec![Err(malformed(Platform::Twitch)), Err(malformed(Platform::Twitch)), Ok(None)],
    );
    let mut engine = engine_with(
        vec![live_only(probe)],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        RecordingNotifier::new(),
    )
    .await;

    assert!(engine.run_tick().await.is_blind());
    assert!(engine.run_tick().await.is_blind());
    assert_eq!(engine.blind_ticks(), 2);
    engine.run_tick().await;
    assert_eq!(engine.blind_ticks(), 0);
}

#[tokio::test]
async fn tick_is_skipped_without_destination() {
    let dir = tempfile::tempdir().unwrap();
    let probe = ScriptedLive::new(Platform::Twitch, vec![Ok(Some(live("speedrun")))]);
    let notifier = RecordingNotifier::new();
    let mut engine = PollEngine::new(
        vec![live_only(probe.clone())],
        SeenEventStore::open(dir.path().join("seen.json")).await,
        notifier.clone(),
        Arc::new(StaticHost::single("general", "https://discord.invalid/hook")),
        engine_config(),
    );

    let report = engine.run_tick().await;
    assert!(report.skipped);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert!(notifier.delivered().is_empty());
}

#[tokio::test]
async fn seen_uploads_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("seen.json");

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(
        vec![upload_only(ScriptedUpload::new(Platform::YouTube, vec![Ok(Some(upload("v1")))]))],
        SeenEventStore::open(&path).await,
        notifier.clone(),
    )
    .await;
    engine.run_tick().await;
    drop(engine);

    // New process: same upload is still the newest item.
    let mut restarted = engine_with(
        vec![upload_only(ScriptedUpload::new(Platform::YouTube, vec![Ok(Some(upload("v1")))]))],
        SeenEventStore::open(&path).await,
        notifier.clone(),
    )
    .await;
    assert!(restarted.run_tick().await.sent.is_empty());
    assert_eq!(notifier.delivered().len(), 1);
}

#[tokio::test]
async fn store_write_failure_keeps_delivery_and_memory() {
    let dir = tempfile::tempdir().unwrap();
    // The state file's parent is a regular file, so the directory cannot be created.
    let blocker = dir.path().join("state");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let probe = ScriptedUpload::new(Platform::YouTube, vec![Ok(Some(upload("v1"))), Ok(Some(upload("v1")))]);
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(
        vec![upload_only(probe)],
        SeenEventStore::open(blocker.join("seen.json")).await,
        notifier.clone(),
    )
    .await;

    let first = engine.run_tick().await;
    assert_eq!(first.sent.len(), 1);
    assert_eq!(first.store_errors, 1);
    assert_eq!(first.notify_errors, 0);
    assert!(engine.store().has(Platform::YouTube, "v1"));

    let second = engine.run_tick().await;
    assert!(second.sent.is_empty());
    assert_eq!(second.store_errors, 0);
    assert_eq!(notifier.delivered().len(), 1);
}
