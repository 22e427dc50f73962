//! Plain HTTP(S) getter.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::engine::{DownloadInfo, Getter, Informer, TransferError};
use crate::media::SearchItem;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TransferState {
    Running,
    Done,
    Failed(String),
}

/// Getter that streams a GET response body into the destination file.
#[derive(Debug, Clone)]
pub struct HttpGetter {
    client: reqwest::Client,
}

impl HttpGetter {
    pub fn new() -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                TransferError::Unavailable(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }

    async fn stream_to_file(
        mut response: reqwest::Response,
        destination: &Path,
        downloaded: &AtomicU64,
    ) -> Result<(), String> {
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| format!("Failed to create {}: {}", destination.display(), e))?;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| format!("Failed to read body: {}", e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("Failed to write {}: {}", destination.display(), e))?;
            downloaded.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }

        file.flush()
            .await
            .map_err(|e| format!("Failed to flush {}: {}", destination.display(), e))
    }
}

#[async_trait]
impl Getter for HttpGetter {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(
        &self,
        item: &SearchItem,
        location: &str,
        destination: &Path,
    ) -> Result<Box<dyn Informer>, TransferError> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| TransferError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransferError::Request(format!(
                "HTTP {} for {}",
                response.status(),
                location
            )));
        }

        let downloaded = Arc::new(AtomicU64::new(0));
        let total = Arc::new(AtomicU64::new(response.content_length().unwrap_or(0)));
        let (state_tx, state_rx) = watch::channel(TransferState::Running);

        let informer = HttpInformer {
            item: item.clone(),
            url: location.to_string(),
            filepath: destination.to_path_buf(),
            downloaded: Arc::clone(&downloaded),
            total: Arc::clone(&total),
            state_rx,
        };

        let destination = destination.to_path_buf();
        let url = location.to_string();
        tokio::spawn(async move {
            let state = match Self::stream_to_file(response, &destination, &downloaded).await {
                Ok(()) => {
                    // Bodies without a content length only learn their size at the end.
                    let written = downloaded.load(Ordering::Relaxed);
                    total.fetch_max(written, Ordering::Relaxed);
                    debug!("Wrote {} bytes from {}", written, url);
                    TransferState::Done
                }
                Err(e) => {
                    warn!("Transfer of {} failed: {}", url, e);
                    TransferState::Failed(e)
                }
            };
            let _ = state_tx.send(state);
        });

        Ok(Box::new(informer))
    }
}

/// Live view of one HTTP transfer.
#[derive(Debug, Clone)]
pub struct HttpInformer {
    item: SearchItem,
    url: String,
    filepath: PathBuf,
    downloaded: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
    state_rx: watch::Receiver<TransferState>,
}

#[async_trait]
impl Informer for HttpInformer {
    fn info(&self) -> DownloadInfo {
        let state = self.state_rx.borrow().clone();
        let mut info = DownloadInfo::new(self.item.clone(), self.url.clone());
        info.filepath = self.filepath.to_string_lossy().into_owned();
        info.downloaded_bytes = self.downloaded.load(Ordering::Relaxed);
        info.total_bytes = self.total.load(Ordering::Relaxed);
        match state {
            TransferState::Running => {}
            TransferState::Done => info.is_done = true,
            TransferState::Failed(e) => info.error = Some(e),
        }
        info
    }

    /// Completion is pushed by the transfer task; `poll_interval` is unused.
    async fn wait_done(&self, _poll_interval: Duration) -> DownloadInfo {
        let mut state_rx = self.state_rx.clone();
        while *state_rx.borrow_and_update() == TransferState::Running {
            if state_rx.changed().await.is_err() {
                break;
            }
        }
        self.info()
    }
}
