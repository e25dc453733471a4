// src/scheduler.rs
//! Fixed-cadence poll driver.
//!
//! One driver task runs ticks back to back on an interval; a tick is never
//! started while the previous one is still running (the tick body is awaited
//! inline, and late ticks are skipped rather than bunched). Inside a tick every
//! probe call runs concurrently and is joined before any state is touched, so
//! the tracker and the seen store only ever see a single writer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;
use crate::host::Host;
use crate::notify::{Destination, NormalizedEvent, Notifier};
use crate::probe::{LiveProbe, LiveSignal, Platform, UploadEvent, UploadProbe};
use crate::store::SeenEventStore;
use crate::tracker::LiveStateTracker;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("notify_ticks_total", "Poll ticks executed.");
        describe_counter!("notify_probe_errors_total", "Probe calls that failed or timed out.");
        describe_counter!("notify_events_sent_total", "Events delivered to the notifier.");
        describe_counter!("notify_delivery_errors_total", "Notifier calls that failed.");
        describe_counter!(
            "notify_store_errors_total",
            "Seen-store writes that failed after a successful delivery."
        );
        describe_gauge!("notify_last_tick_ts", "Unix ts when the last tick finished.");
    });
}

/// The probes configured for one platform. Either side may be absent.
#[derive(Clone)]
pub struct PlatformProbes {
    pub platform: Platform,
    pub live: Option<Arc<dyn LiveProbe>>,
    pub upload: Option<Arc<dyn UploadProbe>>,
}

/// Raw outcome of one tick's probe calls for one platform. `None` = not configured.
#[derive(Debug)]
pub struct PlatformObservation {
    pub platform: Platform,
    pub live: Option<Result<Option<LiveSignal>, ProbeError>>,
    pub upload: Option<Result<Option<UploadEvent>, ProbeError>>,
}

async fn bounded<T>(
    platform: Platform,
    limit: Duration,
    fut: impl Future<Output = Result<T, ProbeError>>,
) -> Result<T, ProbeError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(ProbeError::Timeout {
            platform,
            after: limit,
        }),
    }
}

/// Run every configured probe once, concurrently, each bounded by `limit`.
/// Failures stay inside their own slot of the result.
pub async fn observe_all(probes: &[PlatformProbes], limit: Duration) -> Vec<PlatformObservation> {
    join_all(probes.iter().map(|p| async move {
        let live = async {
            match &p.live {
                Some(probe) => Some(bounded(p.platform, limit, probe.probe_live()).await),
                None => None,
            }
        };
        let upload = async {
            match &p.upload {
                Some(probe) => Some(bounded(p.platform, limit, probe.probe_latest_upload()).await),
                None => None,
            }
        };
        let (live, upload) = tokio::join!(live, upload);
        PlatformObservation {
            platform: p.platform,
            live,
            upload,
        }
    }))
    .await
}

/// What one tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Destination could not be resolved; nothing was probed.
    pub skipped: bool,
    pub probe_calls: usize,
    pub probe_errors: usize,
    /// Events the notifier accepted, in delivery order.
    pub sent: Vec<NormalizedEvent>,
    pub notify_errors: usize,
    pub store_errors: usize,
}

impl TickReport {
    /// Every probe of the tick failed: nothing could be observed at all.
    pub fn is_blind(&self) -> bool {
        self.probe_calls > 0 && self.probe_errors == self.probe_calls
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub probe_timeout: Duration,
    pub announce_channel: String,
}

/// Owns all state a tick mutates. Nothing outside the engine can reach the store.
pub struct PollEngine {
    probes: Vec<PlatformProbes>,
    tracker: LiveStateTracker,
    store: SeenEventStore,
    notifier: Arc<dyn Notifier>,
    host: Arc<dyn Host>,
    cfg: EngineConfig,
    blind_ticks: u32,
}

impl PollEngine {
    pub fn new(
        probes: Vec<PlatformProbes>,
        store: SeenEventStore,
        notifier: Arc<dyn Notifier>,
        host: Arc<dyn Host>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            probes,
            tracker: LiveStateTracker::new(),
            store,
            notifier,
            host,
            cfg,
            blind_ticks: 0,
        }
    }

    pub fn tracker(&self) -> &LiveStateTracker {
        &self.tracker
    }

    pub fn store(&self) -> &SeenEventStore {
        &self.store
    }

    pub fn host(&self) -> Arc<dyn Host> {
        Arc::clone(&self.host)
    }

    /// Consecutive ticks in which every probe failed.
    pub fn blind_ticks(&self) -> u32 {
        self.blind_ticks
    }

    /// One full poll-and-evaluate cycle.
    pub async fn run_tick(&mut self) -> TickReport {
        ensure_metrics_described();
        counter!("notify_ticks_total").increment(1);

        let mut report = TickReport::default();
        let Some(dest) = self.host.resolve_destination(&self.cfg.announce_channel) else {
            tracing::warn!(
                target: "scheduler",
                channel = %self.cfg.announce_channel,
                "announcement destination not found; skipping tick"
            );
            report.skipped = true;
            return report;
        };

        let observations = observe_all(&self.probes, self.cfg.probe_timeout).await;

        for obs in observations {
            if let Some(res) = obs.live {
                report.probe_calls += 1;
                match res {
                    Ok(signal) => self.apply_live(obs.platform, signal.as_ref(), &dest, &mut report).await,
                    Err(e) => probe_failed(&e, "live", &mut report),
                }
            }
            if let Some(res) = obs.upload {
                report.probe_calls += 1;
                match res {
                    Ok(Some(upload)) => self.apply_upload(obs.platform, upload, &dest, &mut report).await,
                    Ok(None) => {}
                    Err(e) => probe_failed(&e, "upload", &mut report),
                }
            }
        }

        self.track_blindness(&report);
        gauge!("notify_last_tick_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            target: "scheduler",
            sent = report.sent.len(),
            probe_errors = report.probe_errors,
            notify_errors = report.notify_errors,
            store_errors = report.store_errors,
            "tick done"
        );
        report
    }

    async fn apply_live(
        &mut self,
        platform: Platform,
        signal: Option<&LiveSignal>,
        dest: &Destination,
        report: &mut TickReport,
    ) {
        let Some(event) = self.tracker.observe(platform, signal) else {
            return;
        };
        match self.notifier.notify(dest, &event).await {
            Ok(()) => {
                tracing::info!(%platform, title = event.title(), "announced went-live");
                counter!("notify_events_sent_total").increment(1);
                report.sent.push(event);
            }
            Err(e) => {
                // Re-arm so the next tick that still sees the stream retries.
                self.tracker.rollback(platform);
                tracing::warn!(%platform, error = %e, "went-live delivery failed; will retry next tick");
                counter!("notify_delivery_errors_total").increment(1);
                report.notify_errors += 1;
            }
        }
    }

    async fn apply_upload(
        &mut self,
        platform: Platform,
        upload: UploadEvent,
        dest: &Destination,
        report: &mut TickReport,
    ) {
        if self.store.has(platform, &upload.id) {
            tracing::trace!(%platform, id = %upload.id, "upload already announced");
            return;
        }
        let event = NormalizedEvent::NewUpload {
            platform,
            title: upload.title,
            url: upload.watch_url,
            thumbnail_url: upload.thumbnail_url,
        };

        // Deliver first, then mark: a crash in between repeats an announcement
        // instead of losing one.
        if let Err(e) = self.notifier.notify(dest, &event).await {
            tracing::warn!(%platform, id = %upload.id, error = %e, "upload delivery failed; will retry next tick");
            counter!("notify_delivery_errors_total").increment(1);
            report.notify_errors += 1;
            return;
        }
        tracing::info!(%platform, id = %upload.id, title = event.title(), "announced new upload");
        counter!("notify_events_sent_total").increment(1);
        report.sent.push(event);

        if let Err(e) = self.store.add(platform, &upload.id).await {
            tracing::error!(
                %platform,
                id = %upload.id,
                path = %self.store.path().display(),
                error = %e,
                "could not persist seen upload; it may be re-announced after a restart"
            );
            counter!("notify_store_errors_total").increment(1);
            report.store_errors += 1;
        }
    }

    fn track_blindness(&mut self, report: &TickReport) {
        if report.is_blind() {
            self.blind_ticks = self.blind_ticks.saturating_add(1);
            tracing::error!(
                target: "scheduler",
                consecutive = self.blind_ticks,
                "every probe failed this tick; check credentials and upstream reachability"
            );
        } else {
            if self.blind_ticks > 0 {
                tracing::info!(target: "scheduler", after = self.blind_ticks, "probes recovered");
            }
            self.blind_ticks = 0;
        }
    }
}

fn probe_failed(e: &ProbeError, kind: &'static str, report: &mut TickReport) {
    tracing::warn!(platform = %e.platform(), probe = kind, error = %e, "probe failed");
    counter!("notify_probe_errors_total").increment(1);
    report.probe_errors += 1;
}

/// A configured but not yet running scheduler.
pub struct PollScheduler {
    engine: PollEngine,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(engine: PollEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Spawn the driver. It waits for the host to be ready, then ticks
    /// immediately and every `interval` after that.
    pub fn start(self) -> RunningScheduler {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive(self.engine, self.interval, cancel.clone()));
        RunningScheduler { cancel, handle }
    }
}

pub struct RunningScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<PollEngine>,
}

impl RunningScheduler {
    /// Token that stops the driver when cancelled (e.g. from a signal handler).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the driver and wait for an in-flight tick to finish.
    /// Returns the engine with its final state.
    pub async fn stop(self) -> Result<PollEngine, tokio::task::JoinError> {
        self.cancel.cancel();
        self.handle.await
    }

    /// Wait until someone cancels the token.
    pub async fn join(self) -> Result<PollEngine, tokio::task::JoinError> {
        self.handle.await
    }
}

async fn drive(mut engine: PollEngine, interval: Duration, cancel: CancellationToken) -> PollEngine {
    let host = engine.host();
    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!(target: "scheduler", "stopped before host was ready");
            return engine;
        }
        _ = host.wait_ready() => {}
    }

    tracing::info!(target: "scheduler", every = ?interval, "poll scheduler started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // Not raced against cancellation: a tick that has notified must also get to persist.
        engine.run_tick().await;
    }

    tracing::info!(target: "scheduler", "poll scheduler stopped");
    engine
}
