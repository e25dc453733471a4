// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use stream_notify::error::{NotifyError, ProbeError};
use stream_notify::host::StaticHost;
use stream_notify::store::SeenEventStore;
use stream_notify::{
    Destination, EngineConfig, LiveProbe, LiveSignal, NormalizedEvent, Notifier, Platform, PlatformProbes,
    PollEngine, UploadEvent, UploadProbe,
};

pub const CHANNEL: &str = "announcements";

pub fn live(title: &str) -> LiveSignal {
    LiveSignal {
        is_live: true,
        title: title.into(),
        source_url: "https://twitch.tv/someone".into(),
    }
}

pub fn upload(id: &str) -> UploadEvent {
    UploadEvent {
        id: id.into(),
        title: format!("Upload {id}"),
        thumbnail_url: None,
        published_at: Utc::now(),
        watch_url: format!("https://youtube.com/watch?v={id}"),
    }
}

pub fn malformed(platform: Platform) -> ProbeError {
    ProbeError::Malformed {
        platform,
        detail: "scripted failure".into(),
    }
}

/// Pops one scripted answer per call; an empty script answers "not live".
pub struct ScriptedLive {
    pub platform: Platform,
    script: Mutex<VecDeque<Result<Option<LiveSignal>, ProbeError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedLive {
    pub fn new(platform: Platform, script: Vec<Result<Option<LiveSignal>, ProbeError>>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LiveProbe for ScriptedLive {
    async fn probe_live(&self) -> Result<Option<LiveSignal>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}

/// Same as `ScriptedLive` for uploads.
pub struct ScriptedUpload {
    pub platform: Platform,
    script: Mutex<VecDeque<Result<Option<UploadEvent>, ProbeError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedUpload {
    pub fn new(platform: Platform, script: Vec<Result<Option<UploadEvent>, ProbeError>>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl UploadProbe for ScriptedUpload {
    async fn probe_latest_upload(&self) -> Result<Option<UploadEvent>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}

/// Records delivered events; fails (without recording) while `failing` holds
/// the event's URL.
#[derive(Default)]
pub struct RecordingNotifier {
    pub delivered: Mutex<Vec<NormalizedEvent>>,
    pub failing: Mutex<HashSet<String>>,
    pub attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn delivered(&self) -> Vec<NormalizedEvent> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _destination: &Destination, event: &NormalizedEvent) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(event.url()) {
            return Err(NotifyError::Rejected { status: 503 });
        }
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        probe_timeout: Duration::from_secs(30),
        announce_channel: CHANNEL.into(),
    }
}

pub async fn engine_with(
    probes: Vec<PlatformProbes>,
    store: SeenEventStore,
    notifier: Arc<RecordingNotifier>,
) -> PollEngine {
    PollEngine::new(
        probes,
        store,
        notifier,
        Arc::new(StaticHost::single(CHANNEL, "https://discord.invalid/hook")),
        engine_config(),
    )
}
