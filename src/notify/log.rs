use async_trait::async_trait;

use super::{Destination, NormalizedEvent, Notifier};
use crate::error::NotifyError;

/// Writes events to the log instead of a chat channel. Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, destination: &Destination, ev: &NormalizedEvent) -> Result<(), NotifyError> {
        tracing::info!(
            destination = %destination.name,
            kind = ev.kind(),
            platform = %ev.platform(),
            title = ev.title(),
            url = ev.url(),
            "announcement"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
