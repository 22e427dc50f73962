//! Mock notifier for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::media::SearchItem;
use crate::notify::{Notifier, NotifyError};

/// Records every event; can be told to fail.
#[derive(Debug, Default)]
pub struct MockNotifier {
    queued: Arc<RwLock<Vec<String>>>,
    finished: Arc<RwLock<Vec<String>>>,
    failing: Arc<RwLock<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call return an error (after recording it).
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    pub async fn queued(&self) -> Vec<String> {
        self.queued.read().await.clone()
    }

    pub async fn finished(&self) -> Vec<String> {
        self.finished.read().await.clone()
    }

    async fn result(&self) -> Result<(), NotifyError> {
        if *self.failing.read().await {
            return Err(NotifyError::Delivery("mock failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn on_queued(&self, item: &SearchItem) -> Result<(), NotifyError> {
        self.queued
            .write()
            .await
            .push(item.unique_title().to_string());
        self.result().await
    }

    async fn on_finish(&self, item: &SearchItem) -> Result<(), NotifyError> {
        self.finished
            .write()
            .await
            .push(item.unique_title().to_string());
        self.result().await
    }
}
