//! Lifecycle notifications for downloads.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::media::SearchItem;

/// Error returned by a notifier. Never fatal to the engine.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Notifier unavailable: {0}")]
    Unavailable(String),
}

/// Receives "queued" and "finished" events for items.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_queued(&self, item: &SearchItem) -> Result<(), NotifyError>;

    async fn on_finish(&self, item: &SearchItem) -> Result<(), NotifyError>;
}

/// Notifier that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn on_queued(&self, _item: &SearchItem) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn on_finish(&self, _item: &SearchItem) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Notifier that writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_queued(&self, item: &SearchItem) -> Result<(), NotifyError> {
        info!(title = item.unique_title(), "Queued {}", item);
        Ok(())
    }

    async fn on_finish(&self, item: &SearchItem) -> Result<(), NotifyError> {
        info!(title = item.unique_title(), "Finished {}", item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundled_notifiers_never_fail() {
        let item = SearchItem::episode("Lost", 1, 2);
        for notifier in [&NoopNotifier as &dyn Notifier, &LogNotifier] {
            notifier.on_queued(&item).await.unwrap();
            notifier.on_finish(&item).await.unwrap();
        }
    }
}
