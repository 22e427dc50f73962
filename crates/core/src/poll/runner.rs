//! Poll stage implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::Provider;
use crate::media::SearchItem;
use crate::metrics;

/// Capacity of the shared output channel. Providers wait when it is full.
pub const POLL_CHANNEL_CAPACITY: usize = 10;

/// Runs one polling loop per registered provider.
pub struct PollStage {
    providers: Vec<Arc<dyn Provider>>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PollStage {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            providers,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn the provider loops and return the shared item stream.
    ///
    /// No deduplication happens here: an item is emitted again on every poll
    /// that returns it.
    pub async fn start(&self) -> mpsc::Receiver<SearchItem> {
        let (tx, rx) = mpsc::channel(POLL_CHANNEL_CAPACITY);

        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Poll stage already running");
            return rx;
        }

        let mut tasks = self.tasks.lock().await;
        for provider in &self.providers {
            tasks.push(Self::spawn_provider_loop(
                Arc::clone(provider),
                tx.clone(),
                self.shutdown_tx.subscribe(),
            ));
        }

        info!("Poll stage started with {} providers", self.providers.len());
        rx
    }

    /// Stop every provider loop and wait for them to exit.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(());
        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        futures::future::join_all(tasks).await;

        info!("Poll stage stopped");
    }

    fn spawn_provider_loop(
        provider: Arc<dyn Provider>,
        tx: mpsc::Sender<SearchItem>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Polling loop for {} started", provider.name());
            loop {
                match provider.poll().await {
                    Ok(items) => {
                        for item in items {
                            debug!("fetched {:?} for searching", item.unique_title());
                            tokio::select! {
                                sent = tx.send(item) => {
                                    if sent.is_err() {
                                        debug!("Item stream closed, stopping {}", provider.name());
                                        return;
                                    }
                                    metrics::ITEMS_POLLED
                                        .with_label_values(&[provider.name()])
                                        .inc();
                                }
                                _ = shutdown_rx.recv() => return,
                            }
                        }
                    }
                    Err(e) => {
                        warn!("could not poll {}: {}", provider.name(), e);
                        metrics::POLL_ERRORS
                            .with_label_values(&[provider.name()])
                            .inc();
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(provider.interval()) => {}
                }
            }
            debug!("Polling loop for {} stopped", provider.name());
        })
    }
}
