//! Edge detector for live signals: one "went live" per continuous stream.

use std::collections::HashMap;

use crate::notify::NormalizedEvent;
use crate::probe::{LiveSignal, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveState {
    #[default]
    Idle,
    Announced,
}

/// Per-platform `Idle`/`Announced` machine. Memory only; every platform starts
/// `Idle`, so a stream already running at process start is announced once.
#[derive(Debug, Default)]
pub struct LiveStateTracker {
    states: HashMap<Platform, LiveState>,
}

impl LiveStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, platform: Platform) -> LiveState {
        self.states.get(&platform).copied().unwrap_or_default()
    }

    /// Feed one tick's observation. Returns an event only on `Idle -> Announced`.
    /// A signal with `is_live == false` counts as absent.
    pub fn observe(&mut self, platform: Platform, signal: Option<&LiveSignal>) -> Option<NormalizedEvent> {
        let live = signal.filter(|s| s.is_live);
        let state = self.states.entry(platform).or_default();
        match (*state, live) {
            (LiveState::Idle, Some(s)) => {
                *state = LiveState::Announced;
                Some(NormalizedEvent::WentLive {
                    platform,
                    title: s.title.clone(),
                    url: s.source_url.clone(),
                })
            }
            (LiveState::Announced, None) => {
                tracing::debug!(%platform, "stream ended; re-armed");
                *state = LiveState::Idle;
                None
            }
            _ => None,
        }
    }

    /// Undo an `Idle -> Announced` whose notification could not be delivered,
    /// so the next live observation emits again.
    pub fn rollback(&mut self, platform: Platform) {
        if let Some(state) = self.states.get_mut(&platform) {
            *state = LiveState::Idle;
        }
    }
}
