//! Dispatcher implementation.

use std::sync::Arc;

use tracing::debug;

use super::handler::FnHandler;
use super::types::{
    DispatchError, DownloadHandler, ExtractHandler, HandlerError, ScrapeHandler, Stage,
};
use crate::media::{Download, Magnet, SearchItem};

/// Per-stage fan-out/fan-in coordinator.
///
/// Handlers run sequentially in registration order. The result of a stage
/// invocation is either the concatenation of every handler's output or the
/// error of the first handler that failed; handlers registered after a
/// failing one are not invoked.
#[derive(Default, Clone)]
pub struct Dispatcher {
    scrapers: Vec<Arc<dyn ScrapeHandler>>,
    extractors: Vec<Arc<dyn ExtractHandler>>,
    downloaders: Vec<Arc<dyn DownloadHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_scrape_handler(&mut self, handler: Arc<dyn ScrapeHandler>) -> &mut Self {
        self.scrapers.push(handler);
        self
    }

    pub fn register_extract_handler(&mut self, handler: Arc<dyn ExtractHandler>) -> &mut Self {
        self.extractors.push(handler);
        self
    }

    pub fn register_download_handler(&mut self, handler: Arc<dyn DownloadHandler>) -> &mut Self {
        self.downloaders.push(handler);
        self
    }

    /// Register a closure as a scrape handler.
    pub fn on_scrape<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&SearchItem) -> Result<Vec<Magnet>, HandlerError> + Send + Sync + 'static,
    {
        self.register_scrape_handler(Arc::new(FnHandler::new(name, f)))
    }

    /// Register a closure as an extract handler.
    pub fn on_extract<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&[Magnet]) -> Result<Vec<Download>, HandlerError> + Send + Sync + 'static,
    {
        self.register_extract_handler(Arc::new(FnHandler::new(name, f)))
    }

    /// Register a closure as a download handler.
    pub fn on_download<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&[Download]) -> Result<Vec<SearchItem>, HandlerError> + Send + Sync + 'static,
    {
        self.register_download_handler(Arc::new(FnHandler::new(name, f)))
    }

    /// Number of handlers registered for a stage.
    pub fn handler_count(&self, stage: Stage) -> usize {
        match stage {
            Stage::Scrape => self.scrapers.len(),
            Stage::Extract => self.extractors.len(),
            Stage::Download => self.downloaders.len(),
        }
    }

    /// Run every scrape handler against the same item.
    pub async fn run_scrape(&self, item: &SearchItem) -> Result<Vec<Magnet>, DispatchError> {
        let mut magnets = Vec::new();
        for handler in &self.scrapers {
            let found = handler
                .scrape(item)
                .await
                .map_err(|source| DispatchError {
                    stage: Stage::Scrape,
                    handler: handler.name().to_string(),
                    source,
                })?;
            debug!(
                "{} found {} sources for {:?}",
                handler.name(),
                found.len(),
                item.unique_title()
            );
            magnets.extend(found);
        }
        Ok(magnets)
    }

    /// Run every extract handler against the same sources.
    pub async fn run_extract(&self, magnets: &[Magnet]) -> Result<Vec<Download>, DispatchError> {
        let mut downloads = Vec::new();
        for handler in &self.extractors {
            let extracted = handler
                .extract(magnets)
                .await
                .map_err(|source| DispatchError {
                    stage: Stage::Extract,
                    handler: handler.name().to_string(),
                    source,
                })?;
            debug!(
                "{} extracted {} downloads from {} sources",
                handler.name(),
                extracted.len(),
                magnets.len()
            );
            downloads.extend(extracted);
        }
        Ok(downloads)
    }

    /// Run every download handler against the same downloads.
    pub async fn run_download(
        &self,
        downloads: &[Download],
    ) -> Result<Vec<SearchItem>, DispatchError> {
        let mut items = Vec::new();
        for handler in &self.downloaders {
            let done = handler
                .download(downloads)
                .await
                .map_err(|source| DispatchError {
                    stage: Stage::Download,
                    handler: handler.name().to_string(),
                    source,
                })?;
            items.extend(done);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn batman() -> SearchItem {
        SearchItem::movie("Batman", 2010)
    }

    #[tokio::test]
    async fn test_empty_dispatcher_returns_empty_results() {
        let d = Dispatcher::new();
        assert!(d.run_scrape(&batman()).await.unwrap().is_empty());
        assert!(d.run_extract(&[]).await.unwrap().is_empty());
        assert!(d.run_download(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scrape_concatenates_in_registration_order() {
        let mut d = Dispatcher::new();
        d.on_scrape("first", |item| Ok(vec![Magnet::new(item.clone(), "magnet://1")]))
            .on_scrape("second", |item| {
                Ok(vec![
                    Magnet::new(item.clone(), "magnet://2"),
                    Magnet::new(item.clone(), "magnet://3"),
                ])
            });

        let magnets = d.run_scrape(&batman()).await.unwrap();
        let locations: Vec<_> = magnets.iter().map(|m| m.location.as_str()).collect();
        assert_eq!(locations, vec!["magnet://1", "magnet://2", "magnet://3"]);
    }

    #[tokio::test]
    async fn test_first_error_stops_later_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let after = Arc::clone(&calls);

        let mut d = Dispatcher::new();
        d.on_scrape("ok", |item| Ok(vec![Magnet::new(item.clone(), "magnet://1")]))
            .on_scrape("broken", |_| {
                Err(HandlerError::Failed("something bad happened".to_string()))
            })
            .on_scrape("never", move |_| {
                after.fetch_add(1, Ordering::SeqCst);
                Ok(vec![])
            });

        let err = d.run_scrape(&batman()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Scrape);
        assert_eq!(err.handler, "broken");
        assert_eq!(
            err.handler_error(),
            &HandlerError::Failed("something bad happened".to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_count() {
        let mut d = Dispatcher::new();
        d.on_extract("a", |_| Ok(vec![])).on_extract("b", |_| Ok(vec![]));
        assert_eq!(d.handler_count(Stage::Extract), 2);
        assert_eq!(d.handler_count(Stage::Scrape), 0);
    }
}
