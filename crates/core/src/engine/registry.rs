//! Shared bookkeeping for admitted transfers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock};

use super::types::{DownloadProgress, Informer};
use crate::media::Download;

/// Locations currently admitted or in flight.
#[derive(Debug, Default)]
pub struct DedupSet {
    locations: Mutex<HashSet<String>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a location. Returns false if it is already claimed.
    pub async fn insert(&self, location: &str) -> bool {
        self.locations.lock().await.insert(location.to_string())
    }

    pub async fn remove(&self, location: &str) -> bool {
        self.locations.lock().await.remove(location)
    }

    /// Forget every claim.
    pub async fn clear(&self) {
        self.locations.lock().await.clear();
    }

    pub async fn contains(&self, location: &str) -> bool {
        self.locations.lock().await.contains(location)
    }

    pub async fn len(&self) -> usize {
        self.locations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// One admitted transfer.
///
/// Holds the admission permit: the slot is released when the entry is
/// dropped.
pub struct InflightEntry {
    pub download: Download,
    pub informer: Arc<dyn Informer>,
    pub started_at: DateTime<Utc>,
    permit: OwnedSemaphorePermit,
}

impl InflightEntry {
    pub fn new(
        download: Download,
        informer: Arc<dyn Informer>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            download,
            informer,
            started_at: Utc::now(),
            permit,
        }
    }

    /// Give the admission slot back, keeping the rest of the entry.
    pub fn release(self) -> (Download, Arc<dyn Informer>) {
        drop(self.permit);
        (self.download, self.informer)
    }
}

/// In-flight transfers keyed by a monotonically assigned id.
#[derive(Default)]
pub struct InflightRegistry {
    entries: RwLock<HashMap<u64, InflightEntry>>,
    next_id: AtomicU64,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry and return the id assigned to it.
    pub async fn insert(&self, entry: InflightEntry) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries.write().await.insert(id, entry);
        id
    }

    pub async fn remove(&self, id: u64) -> Option<InflightEntry> {
        self.entries.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop every entry, releasing their slots. Returns how many there were.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current progress of every entry, ordered by id.
    pub async fn snapshot(&self) -> Vec<DownloadProgress> {
        let entries = self.entries.read().await;
        let mut progress: Vec<_> = entries
            .iter()
            .map(|(id, entry)| {
                DownloadProgress::from_info(
                    *id,
                    entry.download.destination.clone(),
                    &entry.informer.info(),
                )
            })
            .collect();
        progress.sort_by_key(|p| p.id);
        progress
    }
}
