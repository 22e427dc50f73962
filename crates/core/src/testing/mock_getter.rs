//! Mock getter and informer for testing.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{DownloadInfo, Getter, Informer, TransferError};
use crate::media::SearchItem;

/// Informer whose state is driven by the test.
///
/// Clones share state, so a test can keep one handle and finish the transfer
/// while the engine holds another.
#[derive(Debug, Clone)]
pub struct MockInformer {
    state: Arc<Mutex<DownloadInfo>>,
}

impl MockInformer {
    pub fn new(item: SearchItem, url: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(DownloadInfo::new(item, url))),
        }
    }

    pub fn set_progress(&self, downloaded_bytes: u64, total_bytes: u64) {
        let mut state = self.state.lock().unwrap();
        state.downloaded_bytes = downloaded_bytes;
        state.total_bytes = total_bytes;
    }

    pub fn set_filepath(&self, filepath: &str) {
        self.state.lock().unwrap().filepath = filepath.to_string();
    }

    /// Mark the transfer as completed.
    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap();
        state.downloaded_bytes = state.total_bytes;
        state.is_done = true;
    }

    /// Mark the transfer as failed.
    pub fn fail(&self, error: &str) {
        self.state.lock().unwrap().error = Some(error.to_string());
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().unwrap().is_finished()
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }
}

#[async_trait]
impl Informer for MockInformer {
    fn info(&self) -> DownloadInfo {
        self.state.lock().unwrap().clone()
    }
}

/// What the mock getter does with a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTransfer {
    /// Complete after the configured delay.
    Complete,
    /// Fail with this message after the configured delay.
    Fail(String),
    /// Stay in flight until the test finishes it.
    Hold,
    /// Refuse to start the transfer.
    Reject(String),
}

/// Mock implementation of the Getter trait.
///
/// Records every started location and the highest number of unfinished
/// transfers seen when a new one starts.
#[derive(Debug)]
pub struct MockGetter {
    default: Mutex<MockTransfer>,
    overrides: Mutex<HashMap<String, MockTransfer>>,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
    informers: Mutex<Vec<MockInformer>>,
    max_active: AtomicUsize,
}

impl Default for MockGetter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGetter {
    /// A getter whose transfers complete immediately.
    pub fn new() -> Self {
        Self {
            default: Mutex::new(MockTransfer::Complete),
            overrides: Mutex::new(HashMap::new()),
            delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            informers: Mutex::new(Vec::new()),
            max_active: AtomicUsize::new(0),
        }
    }

    /// A getter whose transfers stay in flight until released.
    pub fn holding() -> Self {
        let getter = Self::new();
        getter.set_behaviour(MockTransfer::Hold);
        getter
    }

    /// Transfers complete (or fail) this long after they start.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn set_behaviour(&self, behaviour: MockTransfer) {
        *self.default.lock().unwrap() = behaviour;
    }

    pub fn set_behaviour_for(&self, location: &str, behaviour: MockTransfer) {
        self.overrides
            .lock()
            .unwrap()
            .insert(location.to_string(), behaviour);
    }

    /// Locations passed to `get`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn informers(&self) -> Vec<MockInformer> {
        self.informers.lock().unwrap().clone()
    }

    /// Complete every transfer that has not finished yet.
    pub fn release_all(&self) {
        for informer in self.informers.lock().unwrap().iter() {
            if !informer.is_finished() {
                informer.finish();
            }
        }
    }

    /// Highest number of unfinished transfers observed, the new one included.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn behaviour_for(&self, location: &str) -> MockTransfer {
        self.overrides
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .unwrap_or_else(|| self.default.lock().unwrap().clone())
    }
}

#[async_trait]
impl Getter for MockGetter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get(
        &self,
        item: &SearchItem,
        location: &str,
        destination: &Path,
    ) -> Result<Box<dyn Informer>, TransferError> {
        self.calls.lock().unwrap().push(location.to_string());

        let behaviour = self.behaviour_for(location);
        if let MockTransfer::Reject(reason) = behaviour {
            return Err(TransferError::Rejected(reason));
        }

        let informer = MockInformer::new(item.clone(), location);
        informer.set_progress(0, 1024);
        informer.set_filepath(&destination.to_string_lossy());

        {
            let mut informers = self.informers.lock().unwrap();
            let active = informers.iter().filter(|i| !i.is_finished()).count() + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            informers.push(informer.clone());
        }

        let delay = *self.delay.lock().unwrap();
        let settle = match behaviour {
            MockTransfer::Complete => Some(None),
            MockTransfer::Fail(reason) => Some(Some(reason)),
            MockTransfer::Hold | MockTransfer::Reject(_) => None,
        };

        if let Some(outcome) = settle {
            let handle = informer.clone();
            let finish = move || match outcome {
                None => handle.finish(),
                Some(reason) => handle.fail(&reason),
            };
            if delay.is_zero() {
                finish();
            } else {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    finish();
                });
            }
        }

        Ok(Box::new(informer))
    }
}
