//! Readiness and destination lookup, supplied to the scheduler by whatever hosts it.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::notify::Destination;

#[async_trait]
pub trait Host: Send + Sync {
    /// Resolves once announcements can be delivered. May wait indefinitely;
    /// the scheduler races it against its shutdown signal.
    async fn wait_ready(&self);

    fn resolve_destination(&self, name: &str) -> Option<Destination>;
}

/// Always ready; destinations come from a fixed map.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    destinations: HashMap<String, String>,
}

impl StaticHost {
    pub fn new(destinations: HashMap<String, String>) -> Self {
        Self { destinations }
    }

    pub fn single(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let mut destinations = HashMap::new();
        destinations.insert(name.into(), endpoint.into());
        Self { destinations }
    }
}

fn lookup(map: &HashMap<String, String>, name: &str) -> Option<Destination> {
    map.get(name).map(|endpoint| Destination {
        name: name.to_string(),
        endpoint: endpoint.clone(),
    })
}

#[async_trait]
impl Host for StaticHost {
    async fn wait_ready(&self) {}

    fn resolve_destination(&self, name: &str) -> Option<Destination> {
        lookup(&self.destinations, name)
    }
}

/// Named Discord webhooks. Ready once the announcement webhook answers a GET.
pub struct WebhookHost {
    http: reqwest::Client,
    destinations: HashMap<String, String>,
    ready_target: String,
}

impl WebhookHost {
    pub fn new(destinations: HashMap<String, String>, ready_target: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            destinations,
            ready_target: ready_target.into(),
        }
    }

    async fn probe_once(&self) -> Result<(), String> {
        let url = self
            .destinations
            .get(&self.ready_target)
            .ok_or_else(|| format!("no webhook named `{}`", self.ready_target))?;
        let rsp = self.http.get(url).send().await.map_err(|e| e.to_string())?;
        rsp.error_for_status().map(|_| ()).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Host for WebhookHost {
    async fn wait_ready(&self) {
        let mut wait = Duration::from_secs(1);
        loop {
            match self.probe_once().await {
                Ok(()) => {
                    tracing::info!(destination = %self.ready_target, "announcement webhook reachable");
                    return;
                }
                Err(e) => {
                    tracing::warn!(destination = %self.ready_target, error = %e, ?wait, "webhook not ready");
                    tokio::time::sleep(wait).await;
                    wait = (wait * 2).min(Duration::from_secs(60));
                }
            }
        }
    }

    fn resolve_destination(&self, name: &str) -> Option<Destination> {
        lookup(&self.destinations, name)
    }
}
