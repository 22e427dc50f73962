//! Pipeline runner implementation.
//!
//! Drives every polled item through the stages:
//! - Search: scrape, persist sources, extract, hand downloads to the engine.
//! - Sink: log every completed item and forward it to the optional sink.
//!
//! On start, downloads that were in progress and sources that were never
//! extracted are replayed before any new item is taken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::types::{ItemOutcome, PipelineError, PipelineStatus};
use crate::dispatcher::{Dispatcher, Stage};
use crate::engine::DownloadEngine;
use crate::media::{Download, Magnet, MediaStatus, SearchItem};
use crate::metrics;
use crate::poll::{PollStage, POLL_CHANNEL_CAPACITY};
use crate::storage::MediaRepository;

/// Shared state of the search and sink tasks.
#[derive(Clone)]
struct PipelineContext {
    dispatcher: Arc<Dispatcher>,
    repository: Arc<dyn MediaRepository>,
    downloads_tx: mpsc::Sender<Download>,
    sink: Option<mpsc::Sender<SearchItem>>,
}

/// Wires the poll stage, the dispatcher and the download engine together.
pub struct Pipeline {
    dispatcher: Arc<Dispatcher>,
    repository: Arc<dyn MediaRepository>,
    poll: PollStage,
    engine: Arc<DownloadEngine>,
    sink: Option<mpsc::Sender<SearchItem>>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    pub fn new(
        dispatcher: Dispatcher,
        repository: Arc<dyn MediaRepository>,
        poll: PollStage,
        engine: Arc<DownloadEngine>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            dispatcher: Arc::new(dispatcher),
            repository,
            poll,
            engine,
            sink: None,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Forward every completed item to `sink` as well.
    pub fn with_sink(mut self, sink: mpsc::Sender<SearchItem>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn engine(&self) -> &Arc<DownloadEngine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the engine, the poll stage and the pipeline tasks.
    pub async fn start(&self) -> Result<(), PipelineError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Pipeline already running");
            return Err(PipelineError::AlreadyRunning);
        }

        info!("Starting pipeline");

        let (downloads_tx, downloads_rx) = mpsc::channel(POLL_CHANNEL_CAPACITY);
        let completed_rx = match self.engine.start(downloads_rx).await {
            Ok(rx) => rx,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let ctx = PipelineContext {
            dispatcher: Arc::clone(&self.dispatcher),
            repository: Arc::clone(&self.repository),
            downloads_tx,
            sink: self.sink.clone(),
        };

        let items_rx = self.poll.start().await;

        let mut tasks = self.tasks.lock().await;
        tasks.push(self.spawn_search_loop(ctx.clone(), items_rx));
        tasks.push(self.spawn_sink_loop(ctx, completed_rx));

        info!(
            "Pipeline started ({} providers, {} scrapers, {} extractors)",
            self.poll.provider_count(),
            self.dispatcher.handler_count(Stage::Scrape),
            self.dispatcher.handler_count(Stage::Extract)
        );
        Ok(())
    }

    /// Stop polling, the pipeline tasks and the engine.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Pipeline not running");
            return;
        }

        info!("Stopping pipeline");

        self.poll.stop().await;
        let _ = self.shutdown_tx.send(());
        self.engine.stop().await;

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        futures::future::join_all(tasks).await;

        info!("Pipeline stopped");
    }

    pub async fn status(&self) -> PipelineStatus {
        PipelineStatus {
            running: self.is_running(),
            providers: self.poll.provider_count(),
            scrape_handlers: self.dispatcher.handler_count(Stage::Scrape),
            extract_handlers: self.dispatcher.handler_count(Stage::Extract),
            download_handlers: self.dispatcher.handler_count(Stage::Download),
            engine: self.engine.status().await,
        }
    }

    fn spawn_search_loop(
        &self,
        ctx: PipelineContext,
        mut items_rx: mpsc::Receiver<SearchItem>,
    ) -> JoinHandle<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Search loop started");

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Search loop stopped during recovery");
                    return;
                }
                _ = ctx.recover() => {}
            }

            loop {
                let item = tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    item = items_rx.recv() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    result = ctx.process(&item) => match result {
                        Ok(outcome) => debug!("{} processed: {:?}", item, outcome),
                        Err(PipelineError::EngineClosed) => {
                            error!("Download engine closed, stopping search loop");
                            break;
                        }
                        Err(e) => warn!("could not process {}: {}", item, e),
                    },
                }
            }
            info!("Search loop stopped");
        })
    }

    fn spawn_sink_loop(
        &self,
        ctx: PipelineContext,
        mut completed_rx: mpsc::Receiver<SearchItem>,
    ) -> JoinHandle<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    item = completed_rx.recv() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };
                ctx.finished(item).await;
            }
            debug!("Sink loop stopped");
        })
    }
}

impl PipelineContext {
    /// Replay work interrupted by a restart.
    async fn recover(&self) {
        match self.repository.in_progress_downloads() {
            Ok(downloads) => {
                let count = downloads.len();
                for download in downloads {
                    if self.downloads_tx.send(download).await.is_err() {
                        return;
                    }
                }
                if count > 0 {
                    info!("Recovered {} in-progress downloads", count);
                }
            }
            Err(e) => error!("Failed to recover in-progress downloads: {}", e),
        }

        match self.repository.non_extracted_torrents() {
            Ok(magnets) => {
                let count = magnets.len();
                for magnet in magnets {
                    let item = magnet.item.clone();
                    if let Err(e) = self.extract_and_submit(&item, &[magnet]).await {
                        warn!("could not recover {}: {}", item, e);
                    }
                }
                if count > 0 {
                    info!("Recovered {} non-extracted sources", count);
                }
            }
            Err(e) => error!("Failed to recover non-extracted sources: {}", e),
        }
    }

    async fn process(&self, item: &SearchItem) -> Result<ItemOutcome, PipelineError> {
        let title = item.unique_title();

        match self.repository.fetch(title)? {
            Some(record) if record.status.is_claimed() => {
                debug!("Skipping {}, already {}", item, record.status);
                return Ok(ItemOutcome::Skipped);
            }
            Some(record) if record.status == MediaStatus::Error => {
                info!("Retrying {} after an earlier error", item);
                self.repository.set_status(title, MediaStatus::Pending)?;
            }
            Some(_) => {}
            None => self.repository.store_item(item)?,
        }

        let magnets = match self.dispatcher.run_scrape(item).await {
            Ok(magnets) => magnets,
            Err(e) => {
                self.mark_failed(title, Stage::Scrape);
                return Err(e.into());
            }
        };

        if magnets.is_empty() {
            debug!("No sources found for {}", item);
            return Ok(ItemOutcome::NoSources);
        }
        metrics::SOURCES_FOUND.inc_by(magnets.len() as u64);

        for magnet in &magnets {
            self.repository.add_torrent(magnet)?;
        }
        self.repository.set_status(title, MediaStatus::Scraped)?;

        self.extract_and_submit(item, &magnets).await
    }

    async fn extract_and_submit(
        &self,
        item: &SearchItem,
        magnets: &[Magnet],
    ) -> Result<ItemOutcome, PipelineError> {
        let title = item.unique_title();
        self.repository.set_status(title, MediaStatus::Extracting)?;

        let downloads = match self.dispatcher.run_extract(magnets).await {
            Ok(downloads) => downloads,
            Err(e) => {
                self.mark_failed(title, Stage::Extract);
                return Err(e.into());
            }
        };

        if downloads.is_empty() {
            warn!("Extractors produced no downloads for {}", item);
        }

        if self.dispatcher.handler_count(Stage::Download) > 0 {
            return self.download_now(item, &downloads).await;
        }

        let count = downloads.len();
        for download in downloads {
            self.downloads_tx
                .send(download)
                .await
                .map_err(|_| PipelineError::EngineClosed)?;
        }
        Ok(ItemOutcome::Submitted(count))
    }

    /// Run the registered download handlers instead of the engine.
    async fn download_now(
        &self,
        item: &SearchItem,
        downloads: &[Download],
    ) -> Result<ItemOutcome, PipelineError> {
        let title = item.unique_title();
        for download in downloads {
            self.repository.add_download(download)?;
        }
        self.repository.set_status(title, MediaStatus::Downloading)?;

        let finished = match self.dispatcher.run_download(downloads).await {
            Ok(finished) => finished,
            Err(e) => {
                self.mark_failed(title, Stage::Download);
                return Err(e.into());
            }
        };

        let count = finished.len();
        for done in finished {
            self.repository
                .set_status(done.unique_title(), MediaStatus::Downloaded)?;
            self.finished(done).await;
        }
        Ok(ItemOutcome::Downloaded(count))
    }

    fn mark_failed(&self, title: &str, stage: Stage) {
        metrics::STAGE_FAILURES
            .with_label_values(&[stage.as_str()])
            .inc();
        if let Err(e) = self.repository.set_status(title, MediaStatus::Error) {
            error!("Failed to mark {} as errored: {}", title, e);
        }
    }

    async fn finished(&self, item: SearchItem) {
        info!("{} is downloaded", item);
        if let Some(sink) = &self.sink {
            if sink.send(item).await.is_err() {
                debug!("Pipeline sink closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dispatcher::HandlerError;
    use crate::engine::EngineConfig;
    use crate::testing::{fixtures, MockGetter, MockNotifier, MockRepository};

    fn context(dispatcher: Dispatcher, repository: Arc<MockRepository>) -> (PipelineContext, mpsc::Receiver<Download>) {
        let (downloads_tx, downloads_rx) = mpsc::channel(16);
        let ctx = PipelineContext {
            dispatcher: Arc::new(dispatcher),
            repository,
            downloads_tx,
            sink: None,
        };
        (ctx, downloads_rx)
    }

    fn scraping_dispatcher() -> Dispatcher {
        let mut d = Dispatcher::new();
        d.on_scrape("fake", |item| {
            Ok(vec![fixtures::magnet(item, &format!("http://host/{}.mkv", item.unique_title()))])
        })
        .on_extract("direct", |magnets| {
            Ok(magnets
                .iter()
                .map(|m| fixtures::download(&m.item, &m.location))
                .collect())
        });
        d
    }

    #[tokio::test]
    async fn test_process_submits_downloads() {
        let repository = Arc::new(MockRepository::new());
        let (ctx, mut downloads_rx) = context(scraping_dispatcher(), repository.clone());
        let item = fixtures::movie("Batman", 2010);

        let outcome = ctx.process(&item).await.unwrap();
        assert_eq!(outcome, ItemOutcome::Submitted(1));

        let download = downloads_rx.recv().await.unwrap();
        assert_eq!(download.location, "http://host/Batman 2010.mkv");
        assert_eq!(repository.status("Batman 2010"), Some(MediaStatus::Extracting));
        assert_eq!(repository.magnets().len(), 1);
    }

    #[tokio::test]
    async fn test_claimed_items_are_skipped() {
        let repository = Arc::new(MockRepository::new());
        let (ctx, _rx) = context(scraping_dispatcher(), repository.clone());
        let item = fixtures::movie("Batman", 2010);

        repository.store_item(&item).unwrap();
        repository.set_status("Batman 2010", MediaStatus::Downloading).unwrap();

        assert_eq!(ctx.process(&item).await.unwrap(), ItemOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_errored_items_are_processed_again() {
        let repository = Arc::new(MockRepository::new());
        let (ctx, mut rx) = context(scraping_dispatcher(), repository.clone());
        let item = fixtures::movie("Batman", 2010);

        repository.store_item(&item).unwrap();
        repository.set_status("Batman 2010", MediaStatus::Error).unwrap();

        assert_eq!(ctx.process(&item).await.unwrap(), ItemOutcome::Submitted(1));
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_no_sources_leaves_item_pending() {
        let repository = Arc::new(MockRepository::new());
        let mut d = Dispatcher::new();
        d.on_scrape("empty", |_| Ok(vec![]));
        let (ctx, _rx) = context(d, repository.clone());

        let outcome = ctx.process(&fixtures::movie("Heat", 1995)).await.unwrap();
        assert_eq!(outcome, ItemOutcome::NoSources);
        assert_eq!(repository.status("Heat 1995"), Some(MediaStatus::Pending));
    }

    #[tokio::test]
    async fn test_scrape_failure_marks_error() {
        let repository = Arc::new(MockRepository::new());
        let mut d = Dispatcher::new();
        d.on_scrape("broken", |_| Err(HandlerError::Unavailable("down".to_string())));
        let (ctx, _rx) = context(d, repository.clone());

        let err = ctx.process(&fixtures::movie("Heat", 1995)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Stage(_)));
        assert_eq!(repository.status("Heat 1995"), Some(MediaStatus::Error));
    }

    #[tokio::test]
    async fn test_extract_failure_marks_error() {
        let repository = Arc::new(MockRepository::new());
        let mut d = Dispatcher::new();
        d.on_scrape("fake", |item| Ok(vec![Magnet::new(item.clone(), "magnet:?x")]))
            .on_extract("broken", |_| {
                Err(HandlerError::NothingFound("no video files".to_string()))
            });
        let (ctx, _rx) = context(d, repository.clone());

        assert!(ctx.process(&fixtures::movie("Heat", 1995)).await.is_err());
        assert_eq!(repository.status("Heat 1995"), Some(MediaStatus::Error));
    }

    #[tokio::test]
    async fn test_download_handlers_bypass_engine() {
        let repository = Arc::new(MockRepository::new());
        let mut d = scraping_dispatcher();
        d.on_download("sync", |downloads| {
            Ok(downloads.iter().map(|d| d.item.clone()).collect())
        });
        let (ctx, mut rx) = context(d, repository.clone());

        let outcome = ctx.process(&fixtures::movie("Batman", 2010)).await.unwrap();
        assert_eq!(outcome, ItemOutcome::Downloaded(1));
        assert_eq!(repository.status("Batman 2010"), Some(MediaStatus::Downloaded));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recover_replays_interrupted_work() {
        let repository = Arc::new(MockRepository::new());

        let batman = fixtures::movie("Batman", 2010);
        let interrupted = fixtures::download(&batman, "http://host/batman.mkv");
        repository.store_item(&batman).unwrap();
        repository.add_download(&interrupted).unwrap();
        repository.set_status("Batman 2010", MediaStatus::Downloading).unwrap();

        let heat = fixtures::movie("Heat", 1995);
        repository.store_item(&heat).unwrap();
        repository.add_torrent(&fixtures::magnet(&heat, "http://host/heat.mkv")).unwrap();
        repository.set_status("Heat 1995", MediaStatus::Scraped).unwrap();

        let (ctx, mut rx) = context(scraping_dispatcher(), repository.clone());
        ctx.recover().await;

        assert_eq!(rx.recv().await.unwrap(), interrupted);
        assert_eq!(rx.recv().await.unwrap().location, "http://host/heat.mkv");
        assert_eq!(repository.status("Heat 1995"), Some(MediaStatus::Extracting));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let repository = Arc::new(MockRepository::new());
        let engine = Arc::new(DownloadEngine::new(
            EngineConfig::default(),
            repository.clone(),
            Arc::new(MockGetter::new()),
            Arc::new(MockNotifier::new()),
        ));
        let pipeline = Pipeline::new(Dispatcher::new(), repository, PollStage::new(vec![]), engine);

        pipeline.start().await.unwrap();
        assert!(matches!(
            pipeline.start().await,
            Err(PipelineError::AlreadyRunning)
        ));

        tokio::time::timeout(Duration::from_secs(5), pipeline.stop())
            .await
            .unwrap();
        assert!(!pipeline.is_running());
    }
}
