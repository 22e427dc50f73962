//! Download engine implementation.
//!
//! Tasks spawned by [`DownloadEngine::start`]:
//! - Ingest loop: persists requests, drops duplicates, waits for a free slot
//!   and starts the transfer. Blocking here is the producer's backpressure.
//! - Completion loop: settles finished transfers, one at a time.
//! - Progress listener: logs a report whenever the trigger fires.
//! - One watcher per in-flight transfer, forwarding its completion.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::EngineConfig;
use super::progress::ProgressTrigger;
use super::registry::{DedupSet, InflightEntry, InflightRegistry};
use super::retry::RetryPolicy;
use super::types::{DownloadInfo, DownloadProgress, EngineError, EngineStatus, Getter, Informer};
use crate::media::{Download, SearchItem};
use crate::metrics;
use crate::notify::Notifier;
use crate::storage::MediaRepository;

/// A watcher's report that a transfer has finished.
struct Completion {
    id: u64,
    info: DownloadInfo,
}

/// Everything the engine tasks share.
#[derive(Clone)]
struct EngineContext {
    repository: Arc<dyn MediaRepository>,
    getter: Arc<dyn Getter>,
    notifier: Arc<dyn Notifier>,
    slots: Arc<Semaphore>,
    dedup: Arc<DedupSet>,
    inflight: Arc<InflightRegistry>,
    retry: Arc<RetryPolicy>,
    queued_retries: Arc<AtomicUsize>,
    progress: ProgressTrigger,
    poll_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

/// Admits, tracks and settles downloads.
pub struct DownloadEngine {
    config: EngineConfig,
    ctx: EngineContext,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadEngine {
    pub fn new(
        config: EngineConfig,
        repository: Arc<dyn MediaRepository>,
        getter: Arc<dyn Getter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let ctx = EngineContext {
            repository,
            getter,
            notifier,
            slots: Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1))),
            dedup: Arc::new(DedupSet::new()),
            inflight: Arc::new(InflightRegistry::new()),
            retry: Arc::new(RetryPolicy::new(config.retry.clone())),
            queued_retries: Arc::new(AtomicUsize::new(0)),
            progress: ProgressTrigger::new(),
            poll_interval: config.poll_interval(),
            shutdown_tx,
        };

        Self {
            config,
            ctx,
            running: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start consuming `input` and return the stream of completed items.
    pub async fn start(
        &self,
        input: mpsc::Receiver<Download>,
    ) -> Result<mpsc::Receiver<SearchItem>, EngineError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Download engine already running");
            return Err(EngineError::AlreadyRunning);
        }

        let (output_tx, output_rx) = mpsc::channel(self.config.output_buffer.max(1));
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();

        let mut tasks = self.tasks.lock().await;
        tasks.push(Self::spawn_ingest_loop(
            self.ctx.clone(),
            input,
            retry_rx,
            done_tx.clone(),
            retry_tx.clone(),
        ));
        tasks.push(Self::spawn_completion_loop(
            self.ctx.clone(),
            done_rx,
            output_tx,
            retry_tx,
        ));
        tasks.push(Self::spawn_progress_listener(self.ctx.clone()));

        info!(
            "Download engine started ({} concurrent downloads)",
            self.config.max_concurrent_downloads
        );
        Ok(output_rx)
    }

    /// Stop the engine loops.
    ///
    /// Transfers already in flight are not cancelled, but the engine stops
    /// tracking them: their slots and dedup claims are released so a
    /// restarted engine starts empty. Their records stay Downloading and are
    /// picked up again by recovery.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Download engine not running");
            return;
        }

        info!("Stopping download engine");
        let _ = self.ctx.shutdown_tx.send(());

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        futures::future::join_all(tasks).await;

        let abandoned = self.ctx.inflight.clear().await;
        if abandoned > 0 {
            warn!("Stopped tracking {} in-flight downloads", abandoned);
            metrics::DOWNLOADS_IN_FLIGHT.sub(abandoned as i64);
        }
        self.ctx.dedup.clear().await;
        self.ctx.retry.reset().await;

        info!("Download engine stopped");
    }

    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.is_running(),
            in_flight: self.ctx.inflight.len().await,
            max_concurrent: self.config.max_concurrent_downloads.max(1),
            available_slots: self.ctx.slots.available_permits(),
            queued_retries: self.ctx.queued_retries.load(Ordering::SeqCst),
        }
    }

    /// Progress of every in-flight transfer.
    pub async fn progress(&self) -> Vec<DownloadProgress> {
        self.ctx.inflight.snapshot().await
    }

    /// Handle that makes the engine log a progress report.
    pub fn progress_trigger(&self) -> ProgressTrigger {
        self.ctx.progress.clone()
    }

    fn spawn_ingest_loop(
        ctx: EngineContext,
        mut input: mpsc::Receiver<Download>,
        mut retry_rx: mpsc::UnboundedReceiver<Download>,
        done_tx: mpsc::UnboundedSender<Completion>,
        retry_tx: mpsc::UnboundedSender<Download>,
    ) -> JoinHandle<()> {
        let mut shutdown_rx = ctx.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Download ingest loop started");
            let mut input_open = true;

            loop {
                let download = tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    next = input.recv(), if input_open => match next {
                        Some(download) => {
                            if !ctx.record_request(&download).await {
                                continue;
                            }
                            download
                        }
                        None => {
                            debug!("Download input closed");
                            input_open = false;
                            continue;
                        }
                    },
                    Some(download) = retry_rx.recv() => download,
                };

                if !ctx.claim(&download).await {
                    continue;
                }

                let permit = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        ctx.dedup.remove(&download.location).await;
                        break;
                    }
                    permit = ctx.slots.clone().acquire_owned() => permit,
                };

                match permit {
                    Ok(permit) => ctx.launch(download, permit, &done_tx, &retry_tx).await,
                    Err(_) => {
                        ctx.dedup.remove(&download.location).await;
                        break;
                    }
                }
            }
            info!("Download ingest loop stopped");
        })
    }

    fn spawn_completion_loop(
        ctx: EngineContext,
        mut done_rx: mpsc::UnboundedReceiver<Completion>,
        output_tx: mpsc::Sender<SearchItem>,
        retry_tx: mpsc::UnboundedSender<Download>,
    ) -> JoinHandle<()> {
        let mut shutdown_rx = ctx.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Download completion loop started");
            loop {
                let completion = tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    completion = done_rx.recv() => match completion {
                        Some(completion) => completion,
                        None => break,
                    },
                };

                let Some(item) = ctx.settle(completion, &retry_tx).await else {
                    continue;
                };

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    sent = output_tx.send(item.clone()) => {
                        if sent.is_err() {
                            debug!("Completed output closed, dropping {}", item);
                        }
                    }
                }

                if let Err(e) = ctx.notifier.on_finish(&item).await {
                    warn!("Failed to notify finish of {}: {}", item, e);
                }
            }
            info!("Download completion loop stopped");
        })
    }

    fn spawn_progress_listener(ctx: EngineContext) -> JoinHandle<()> {
        let mut shutdown_rx = ctx.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ctx.progress.fired() => ctx.log_progress().await,
                }
            }
        })
    }
}

impl EngineContext {
    /// Persist a new request and announce it. False if it must be dropped.
    async fn record_request(&self, download: &Download) -> bool {
        if let Err(e) = self.repository.add_download(download) {
            error!(
                "Failed to persist download for {}: {}",
                download.location, e
            );
            return false;
        }

        if let Err(e) = self.notifier.on_queued(&download.item).await {
            warn!("Failed to notify queueing of {}: {}", download.item, e);
        }
        true
    }

    /// Claim the location. False if it is already admitted or in flight.
    async fn claim(&self, download: &Download) -> bool {
        if self.dedup.insert(&download.location).await {
            return true;
        }

        debug!(
            "skipped download for {}, already in progress",
            download.location
        );
        metrics::DUPLICATES_SKIPPED.inc();
        false
    }

    async fn launch(
        &self,
        download: Download,
        permit: OwnedSemaphorePermit,
        done_tx: &mpsc::UnboundedSender<Completion>,
        retry_tx: &mpsc::UnboundedSender<Download>,
    ) {
        info!("queueing download for {}", download.location);
        metrics::DOWNLOADS_STARTED.inc();

        let started = self
            .getter
            .get(&download.item, &download.location, &download.destination)
            .await;

        let informer: Arc<dyn Informer> = match started {
            Ok(informer) => Arc::from(informer),
            Err(e) => {
                drop(permit);
                self.fail(download, "", &e.to_string(), retry_tx).await;
                return;
            }
        };

        let snapshot = informer.info();
        if let Err(e) = self
            .repository
            .update_download(&download, &snapshot.filepath, false, None)
        {
            warn!(
                "Failed to persist start of download for {}: {}",
                download.location, e
            );
        }

        let id = self
            .inflight
            .insert(InflightEntry::new(download, Arc::clone(&informer), permit))
            .await;
        metrics::DOWNLOADS_IN_FLIGHT.inc();

        self.spawn_watcher(id, informer, done_tx.clone());
    }

    fn spawn_watcher(
        &self,
        id: u64,
        informer: Arc<dyn Informer>,
        done_tx: mpsc::UnboundedSender<Completion>,
    ) {
        let poll_interval = self.poll_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                info = informer.wait_done(poll_interval) => {
                    let _ = done_tx.send(Completion { id, info });
                }
            }
        });
    }

    /// Settle a finished transfer. Returns the item to emit on success.
    async fn settle(
        &self,
        completion: Completion,
        retry_tx: &mpsc::UnboundedSender<Download>,
    ) -> Option<SearchItem> {
        let Some(entry) = self.inflight.remove(completion.id).await else {
            debug!("Completion for unknown download {}", completion.id);
            return None;
        };

        let started_at = entry.started_at;
        let (download, _) = entry.release();
        metrics::DOWNLOADS_IN_FLIGHT.dec();

        let info = completion.info;
        let error = match (&info.error, info.is_done) {
            (Some(error), _) => Some(error.clone()),
            (None, false) => Some("transfer ended before completing".to_string()),
            (None, true) => None,
        };

        if let Some(error) = error {
            self.fail(download, &info.filepath, &error, retry_tx).await;
            return None;
        }

        if let Err(e) = self
            .repository
            .update_download(&download, &info.filepath, true, None)
        {
            error!(
                "Failed to persist completion of {}: {}",
                download.location, e
            );
        }
        self.dedup.remove(&download.location).await;
        self.retry.clear(&download.location).await;

        info!("completed download for {}", info.url);
        metrics::DOWNLOADS_COMPLETED.inc();
        let elapsed = (Utc::now() - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        metrics::DOWNLOAD_DURATION.observe(elapsed);

        Some(download.item)
    }

    /// Record a failed attempt and schedule a retry if the policy allows.
    ///
    /// The admission slot must already be released.
    async fn fail(
        &self,
        download: Download,
        filepath: &str,
        error: &str,
        retry_tx: &mpsc::UnboundedSender<Download>,
    ) {
        if let Err(e) = self
            .repository
            .update_download(&download, filepath, false, Some(error))
        {
            error!(
                "Failed to persist failure of {}: {}",
                download.location, e
            );
        }
        self.dedup.remove(&download.location).await;

        warn!("download of {} failed: {}", download.location, error);
        metrics::DOWNLOADS_FAILED.inc();

        let Some((attempt, delay)) = self.retry.record_failure(&download.location).await else {
            return;
        };

        info!(
            "Retrying {} in {:?} (attempt {})",
            download.location, delay, attempt
        );
        metrics::DOWNLOAD_RETRIES.inc();
        self.queued_retries.fetch_add(1, Ordering::SeqCst);

        let queued_retries = Arc::clone(&self.queued_retries);
        let retry_tx = retry_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let resubmit = tokio::select! {
                _ = shutdown_rx.recv() => false,
                _ = tokio::time::sleep(delay) => true,
            };
            queued_retries.fetch_sub(1, Ordering::SeqCst);
            if resubmit {
                let _ = retry_tx.send(download);
            }
        });
    }

    async fn log_progress(&self) {
        let progress = self.inflight.snapshot().await;
        if progress.is_empty() {
            info!("No downloads in progress");
            return;
        }
        for entry in progress {
            info!("{}", entry);
        }
    }
}
