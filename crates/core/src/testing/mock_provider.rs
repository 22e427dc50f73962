//! Mock catalog provider for testing.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::media::SearchItem;
use crate::poll::{Provider, ProviderError};

#[derive(Debug)]
enum Mode {
    /// A new item on every poll.
    Counting,
    /// The same items on every poll.
    Fixed(Vec<SearchItem>),
    Failing,
}

/// Mock implementation of the Provider trait.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    interval: Duration,
    mode: Mode,
    polls: AtomicU16,
}

impl MockProvider {
    /// Returns one new item per poll, titled `"{name} {poll number}"`.
    pub fn counting(name: &str, interval: Duration) -> Self {
        Self::with_mode(name, interval, Mode::Counting)
    }

    /// Returns the same items on every poll.
    pub fn fixed(name: &str, items: Vec<SearchItem>, interval: Duration) -> Self {
        Self::with_mode(name, interval, Mode::Fixed(items))
    }

    /// Fails every poll.
    pub fn failing(name: &str, interval: Duration) -> Self {
        Self::with_mode(name, interval, Mode::Failing)
    }

    fn with_mode(name: &str, interval: Duration, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            interval,
            mode,
            polls: AtomicU16::new(0),
        }
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst) as usize
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self) -> Result<Vec<SearchItem>, ProviderError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.mode {
            Mode::Counting => Ok(vec![SearchItem::movie(&self.name, n)]),
            Mode::Fixed(items) => Ok(items.clone()),
            Mode::Failing => Err(ProviderError::Unavailable(format!(
                "{} is down",
                self.name
            ))),
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}
