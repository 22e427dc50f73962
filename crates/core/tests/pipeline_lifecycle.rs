//! Pipeline lifecycle integration tests.
//!
//! These tests run the whole pipeline against a SQLite repository:
//! - Items flow from a provider to the sink
//! - Items already claimed are not downloaded twice
//! - Interrupted work is recovered on start

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use sofa_core::{
    dispatcher::Dispatcher,
    engine::{DownloadEngine, EngineConfig},
    extract::PassthroughExtractor,
    media::{Download, Magnet, MediaStatus, SearchItem},
    pipeline::Pipeline,
    poll::{PollStage, Provider},
    storage::{MediaRepository, SqliteMediaRepository},
    testing::{MockGetter, MockNotifier, MockProvider},
};

const TIMEOUT: Duration = Duration::from_secs(5);

struct TestHarness {
    repository: Arc<SqliteMediaRepository>,
    getter: Arc<MockGetter>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repository = Arc::new(
            SqliteMediaRepository::new(&temp_dir.path().join("sofa.db"))
                .expect("Failed to create repository"),
        );

        Self {
            repository,
            getter: Arc::new(MockGetter::new()),
            _temp_dir: temp_dir,
        }
    }

    fn pipeline(&self, providers: Vec<Arc<dyn Provider>>) -> (Pipeline, mpsc::Receiver<SearchItem>) {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .on_scrape("direct", |item| {
                Ok(vec![Magnet::new(
                    item.clone(),
                    format!("http://host/{}.mkv", item.unique_title()),
                )])
            })
            .register_extract_handler(Arc::new(PassthroughExtractor::new("/downloads")));

        let engine = Arc::new(DownloadEngine::new(
            EngineConfig {
                poll_interval_ms: 5,
                ..Default::default()
            },
            Arc::clone(&self.repository) as Arc<dyn MediaRepository>,
            self.getter.clone(),
            Arc::new(MockNotifier::new()),
        ));

        let (sink_tx, sink_rx) = mpsc::channel(16);
        let pipeline = Pipeline::new(
            dispatcher,
            Arc::clone(&self.repository) as Arc<dyn MediaRepository>,
            PollStage::new(providers),
            engine,
        )
        .with_sink(sink_tx);

        (pipeline, sink_rx)
    }
}

async fn recv(rx: &mut mpsc::Receiver<SearchItem>) -> SearchItem {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for the sink")
        .expect("sink closed")
}

#[tokio::test]
async fn test_polled_item_reaches_the_sink() {
    let h = TestHarness::new();
    let provider = Arc::new(MockProvider::fixed(
        "watchlist",
        vec![SearchItem::movie("Heat", 1995)],
        Duration::from_secs(60),
    ));
    let (pipeline, mut sink) = h.pipeline(vec![provider]);

    pipeline.start().await.unwrap();
    let item = recv(&mut sink).await;
    assert_eq!(item.unique_title(), "Heat 1995");

    let record = h.repository.fetch("Heat 1995").unwrap().unwrap();
    assert_eq!(record.status, MediaStatus::Downloaded);
    assert_eq!(h.getter.calls(), vec!["http://host/Heat 1995.mkv"]);

    let status = pipeline.status().await;
    assert!(status.running);
    assert_eq!(status.providers, 1);
    assert_eq!(status.scrape_handlers, 1);
    assert_eq!(status.extract_handlers, 1);

    pipeline.stop().await;
    assert!(!pipeline.status().await.running);
}

#[tokio::test]
async fn test_repeated_polls_download_once() {
    let h = TestHarness::new();
    let provider = Arc::new(MockProvider::fixed(
        "watchlist",
        vec![SearchItem::movie("Heat", 1995)],
        Duration::from_millis(20),
    ));
    let (pipeline, mut sink) = h.pipeline(vec![provider.clone()]);

    pipeline.start().await.unwrap();
    recv(&mut sink).await;

    let polls = provider.poll_count();
    tokio::time::timeout(TIMEOUT, async {
        while provider.poll_count() < polls + 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(h.getter.call_count(), 1);
    assert!(sink.try_recv().is_err());

    pipeline.stop().await;
}

#[tokio::test]
async fn test_interrupted_work_is_recovered_on_start() {
    let h = TestHarness::new();

    // Downloading when the process died.
    let alien = SearchItem::movie("Alien", 1979);
    h.repository.store_item(&alien).unwrap();
    h.repository
        .add_download(&Download::new(alien.clone(), "http://host/alien.mkv", "/downloads/Alien 1979"))
        .unwrap();
    h.repository.set_status("Alien 1979", MediaStatus::Downloading).unwrap();

    // Scraped but never extracted.
    let brazil = SearchItem::movie("Brazil", 1985);
    h.repository.store_item(&brazil).unwrap();
    h.repository
        .add_torrent(&Magnet::new(brazil.clone(), "http://host/brazil.mkv"))
        .unwrap();
    h.repository.set_status("Brazil 1985", MediaStatus::Scraped).unwrap();

    let (pipeline, mut sink) = h.pipeline(vec![]);
    pipeline.start().await.unwrap();

    let mut titles = vec![
        recv(&mut sink).await.unique_title().to_string(),
        recv(&mut sink).await.unique_title().to_string(),
    ];
    titles.sort();
    assert_eq!(titles, vec!["Alien 1979", "Brazil 1985"]);

    for title in ["Alien 1979", "Brazil 1985"] {
        let record = h.repository.fetch(title).unwrap().unwrap();
        assert_eq!(record.status, MediaStatus::Downloaded);
    }
    assert!(h.repository.in_progress_downloads().unwrap().is_empty());
    assert!(h.repository.non_extracted_torrents().unwrap().is_empty());

    pipeline.stop().await;
}
