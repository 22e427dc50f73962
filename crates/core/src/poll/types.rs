//! Types for catalog providers.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::media::SearchItem;

/// Errors a provider can report from a poll.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// A catalog of items of interest, polled on its own interval.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Fetch the items currently wanted from this catalog.
    async fn poll(&self) -> Result<Vec<SearchItem>, ProviderError>;

    /// How long to wait between two polls.
    fn interval(&self) -> Duration;
}
