//! Handler traits and errors for the stage dispatcher.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{Download, Magnet, SearchItem};

/// A named point in the pipeline where pluggable handlers act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scrape,
    Extract,
    Download,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scrape => "scrape",
            Stage::Extract => "extract",
            Stage::Download => "download",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by an individual stage handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Nothing usable found: {0}")]
    NothingFound(String),

    #[error("{0}")]
    Failed(String),
}

/// Error of a whole stage invocation: the first handler that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} handler '{handler}' failed: {source}")]
pub struct DispatchError {
    pub stage: Stage,
    pub handler: String,
    #[source]
    pub source: HandlerError,
}

impl DispatchError {
    /// The error exactly as the failing handler returned it.
    pub fn handler_error(&self) -> &HandlerError {
        &self.source
    }
}

/// Turns a search item into candidate sources.
#[async_trait]
pub trait ScrapeHandler: Send + Sync {
    /// Handler name for logging and error reports.
    fn name(&self) -> &str;

    async fn scrape(&self, item: &SearchItem) -> Result<Vec<Magnet>, HandlerError>;
}

/// Narrows candidate sources down to concrete downloads.
#[async_trait]
pub trait ExtractHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, magnets: &[Magnet]) -> Result<Vec<Download>, HandlerError>;
}

/// Performs downloads synchronously and reports the finished items.
///
/// Distinct from the download engine, which admits and tracks transfers
/// in the background.
#[async_trait]
pub trait DownloadHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn download(&self, downloads: &[Download]) -> Result<Vec<SearchItem>, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_as_str() {
        assert_eq!(Stage::Scrape.as_str(), "scrape");
        assert_eq!(Stage::Extract.as_str(), "extract");
        assert_eq!(Stage::Download.as_str(), "download");
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError {
            stage: Stage::Extract,
            handler: "torrent".to_string(),
            source: HandlerError::NothingFound("no video files".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "extract handler 'torrent' failed: Nothing usable found: no video files"
        );
        assert_eq!(
            err.handler_error(),
            &HandlerError::NothingFound("no video files".to_string())
        );
    }
}
