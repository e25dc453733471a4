// src/probe/filters.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use super::UploadEvent;

pub const DEFAULT_FRESHNESS_MINUTES: i64 = 10;

pub fn default_excluded_substrings() -> Vec<String> {
    vec!["shorts".into(), "stream".into(), "live".into()]
}

/// Why a "latest item" was not surfaced as a new upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    Stale,
    ExcludedTitle,
}

/// Freshness window plus title denylist applied to every upload candidate.
#[derive(Debug, Clone)]
pub struct UploadFilter {
    freshness: ChronoDuration,
    excluded: Vec<String>,
}

impl Default for UploadFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS_MINUTES, default_excluded_substrings())
    }
}

impl UploadFilter {
    /// `freshness_minutes` < 0 is treated as 0. Empty/blank denylist entries are dropped.
    pub fn new(freshness_minutes: i64, excluded: Vec<String>) -> Self {
        let excluded = excluded
            .into_iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            freshness: ChronoDuration::minutes(freshness_minutes.max(0)),
            excluded,
        }
    }

    /// Inclusive window: an item exactly `freshness` old is still fresh.
    pub fn is_fresh(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(published_at) <= self.freshness
    }

    pub fn is_excluded_title(&self, title: &str) -> bool {
        let t = title.to_ascii_lowercase();
        self.excluded.iter().any(|needle| t.contains(needle.as_str()))
    }

    pub fn check(&self, ev: &UploadEvent, now: DateTime<Utc>) -> Result<(), Discard> {
        if !self.is_fresh(ev.published_at, now) {
            return Err(Discard::Stale);
        }
        if self.is_excluded_title(&ev.title) {
            return Err(Discard::ExcludedTitle);
        }
        Ok(())
    }

    /// Pass `ev` through, or log why it was dropped and return `None`.
    pub fn admit(&self, ev: UploadEvent, now: DateTime<Utc>) -> Option<UploadEvent> {
        match self.check(&ev, now) {
            Ok(()) => Some(ev),
            Err(reason) => {
                tracing::debug!(id = %ev.id, title = %ev.title, ?reason, "latest upload discarded");
                None
            }
        }
    }
}
