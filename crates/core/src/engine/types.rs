//! Types for the download engine and its transfer backends.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::progress::format_bytes;
use crate::media::SearchItem;
use crate::storage::RepositoryError;

/// Errors that can occur when starting a transfer.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Transfer rejected: {0}")]
    Rejected(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("download engine already running")]
    AlreadyRunning,

    #[error("download engine not running")]
    NotRunning,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Snapshot of one transfer as reported by its informer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub item: SearchItem,
    /// Remote location being transferred.
    pub url: String,
    /// Local file the transfer writes to; empty until known.
    pub filepath: String,
    pub is_done: bool,
    pub error: Option<String>,
    pub downloaded_bytes: u64,
    /// Zero when the size is not known yet.
    pub total_bytes: u64,
}

impl DownloadInfo {
    pub fn new(item: SearchItem, url: impl Into<String>) -> Self {
        Self {
            item,
            url: url.into(),
            filepath: String::new(),
            is_done: false,
            error: None,
            downloaded_bytes: 0,
            total_bytes: 0,
        }
    }

    /// Completed successfully or failed.
    pub fn is_finished(&self) -> bool {
        self.is_done || self.error.is_some()
    }

    /// Fraction in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.is_done {
            return 1.0;
        }
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.downloaded_bytes as f64 / self.total_bytes as f64).min(1.0)
    }

    /// Human readable transferred/total amount.
    pub fn progress_bytes(&self) -> String {
        format!(
            "{}/{}",
            format_bytes(self.downloaded_bytes),
            format_bytes(self.total_bytes)
        )
    }
}

/// Handle describing the live state of one transfer.
#[async_trait]
pub trait Informer: Send + Sync {
    fn info(&self) -> DownloadInfo;

    /// Resolve once the transfer has finished, returning its final snapshot.
    ///
    /// The default implementation checks [`Informer::info`] every
    /// `poll_interval`. Backends that learn about completion directly should
    /// override it.
    async fn wait_done(&self, poll_interval: Duration) -> DownloadInfo {
        loop {
            let info = self.info();
            if info.is_finished() {
                return info;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Starts transfers against some file-hosting backend.
#[async_trait]
pub trait Getter: Send + Sync {
    fn name(&self) -> &str;

    async fn get(
        &self,
        item: &SearchItem,
        location: &str,
        destination: &Path,
    ) -> Result<Box<dyn Informer>, TransferError>;
}

/// Progress of one in-flight transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub destination: PathBuf,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// Percentage in `[0, 100]`.
    pub percent: f64,
}

impl DownloadProgress {
    pub(crate) fn from_info(id: u64, destination: PathBuf, info: &DownloadInfo) -> Self {
        Self {
            id,
            title: info.item.unique_title().to_string(),
            url: info.url.clone(),
            destination,
            downloaded_bytes: info.downloaded_bytes,
            total_bytes: info.total_bytes,
            percent: info.progress() * 100.0,
        }
    }
}

impl fmt::Display for DownloadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Progress of {} is {}/{} ({:.2}%)",
            self.title,
            format_bytes(self.downloaded_bytes),
            format_bytes(self.total_bytes),
            self.percent
        )
    }
}

/// Current status of the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    /// Transfers admitted and not yet finished.
    pub in_flight: usize,
    pub max_concurrent: usize,
    pub available_slots: usize,
    /// Failed transfers waiting for their backoff to elapse.
    pub queued_retries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DownloadInfo {
        DownloadInfo::new(SearchItem::movie("Batman", 2010), "http://host/batman.mkv")
    }

    #[test]
    fn test_progress_fraction() {
        let mut info = info();
        assert_eq!(info.progress(), 0.0);

        info.total_bytes = 200;
        info.downloaded_bytes = 50;
        assert_eq!(info.progress(), 0.25);

        info.is_done = true;
        assert_eq!(info.progress(), 1.0);
    }

    #[test]
    fn test_is_finished() {
        let mut info = info();
        assert!(!info.is_finished());
        info.error = Some("connection reset".to_string());
        assert!(info.is_finished());
    }

    #[test]
    fn test_progress_report_line() {
        let mut info = info();
        info.total_bytes = 2048;
        info.downloaded_bytes = 1024;
        let progress = DownloadProgress::from_info(1, PathBuf::from("/tmp/batman.mkv"), &info);
        assert_eq!(
            progress.to_string(),
            "Progress of Batman 2010 is 1.00 KiB/2.00 KiB (50.00%)"
        );
    }

    struct FlipInformer {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Informer for FlipInformer {
        fn info(&self) -> DownloadInfo {
            let n = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let mut info = info();
            info.is_done = n >= 2;
            info
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_wait_done_polls_until_finished() {
        let informer = FlipInformer {
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let done = informer.wait_done(Duration::from_secs(5)).await;
        assert!(done.is_done);
        assert_eq!(informer.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
