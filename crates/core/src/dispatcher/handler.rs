//! Closure adapters for stage handlers.

use async_trait::async_trait;

use super::types::{DownloadHandler, ExtractHandler, HandlerError, ScrapeHandler};
use crate::media::{Download, Magnet, SearchItem};

/// Wraps a plain closure so it can be registered as a stage handler.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> ScrapeHandler for FnHandler<F>
where
    F: Fn(&SearchItem) -> Result<Vec<Magnet>, HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn scrape(&self, item: &SearchItem) -> Result<Vec<Magnet>, HandlerError> {
        (self.f)(item)
    }
}

#[async_trait]
impl<F> ExtractHandler for FnHandler<F>
where
    F: Fn(&[Magnet]) -> Result<Vec<Download>, HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, magnets: &[Magnet]) -> Result<Vec<Download>, HandlerError> {
        (self.f)(magnets)
    }
}

#[async_trait]
impl<F> DownloadHandler for FnHandler<F>
where
    F: Fn(&[Download]) -> Result<Vec<SearchItem>, HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn download(&self, downloads: &[Download]) -> Result<Vec<SearchItem>, HandlerError> {
        (self.f)(downloads)
    }
}
