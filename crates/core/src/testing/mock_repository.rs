//! In-memory media repository for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::media::{Download, Magnet, MediaRecord, MediaStatus, SearchItem};
use crate::storage::{MediaRepository, RepositoryError};

/// A recorded `update_download` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpdate {
    pub title: String,
    pub location: String,
    pub filepath: String,
    pub is_done: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<String, MediaRecord>,
    magnets: Vec<Magnet>,
    downloads: Vec<Download>,
    updates: Vec<RecordedUpdate>,
    fail_writes: bool,
}

/// Mock implementation of the MediaRepository trait.
///
/// Keeps everything in memory, records `update_download` calls for
/// assertions and can be told to fail every write.
#[derive(Debug, Default)]
pub struct MockRepository {
    state: Mutex<State>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.state.lock().unwrap().updates.clone()
    }

    /// Terminal updates (done or errored) recorded for a location.
    pub fn terminal_updates(&self, location: &str) -> Vec<RecordedUpdate> {
        self.updates()
            .into_iter()
            .filter(|u| u.location == location && (u.is_done || u.error.is_some()))
            .collect()
    }

    pub fn status(&self, title: &str) -> Option<MediaStatus> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(title)
            .map(|r| r.status)
    }

    pub fn magnets(&self) -> Vec<Magnet> {
        self.state.lock().unwrap().magnets.clone()
    }

    pub fn downloads(&self) -> Vec<Download> {
        self.state.lock().unwrap().downloads.clone()
    }

    fn check_writable(state: &State) -> Result<(), RepositoryError> {
        if state.fail_writes {
            return Err(RepositoryError::Database("mock write failure".to_string()));
        }
        Ok(())
    }

    fn current_status(state: &State, title: &str) -> Result<MediaStatus, RepositoryError> {
        state
            .records
            .get(title)
            .map(|r| r.status)
            .ok_or_else(|| RepositoryError::NotFound(title.to_string()))
    }

    fn set_status_locked(
        state: &mut State,
        title: &str,
        status: MediaStatus,
    ) -> Result<(), RepositoryError> {
        let record = state
            .records
            .get_mut(title)
            .ok_or_else(|| RepositoryError::NotFound(title.to_string()))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Status implied by the latest update of each of the title's downloads.
    fn status_from_downloads(state: &State, title: &str) -> MediaStatus {
        let (mut pending, mut done) = (0, 0);
        for download in state.downloads.iter().filter(|d| d.item.unique_title() == title) {
            let latest = state
                .updates
                .iter()
                .rev()
                .find(|u| u.title == title && u.location == download.location);
            match latest {
                Some(u) if u.error.is_some() => {}
                Some(u) if u.is_done => done += 1,
                _ => pending += 1,
            }
        }
        MediaStatus::from_downloads(pending, done)
    }
}

impl MediaRepository for MockRepository {
    fn store_item(&self, item: &SearchItem) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;

        let now = Utc::now();
        state
            .records
            .entry(item.unique_title().to_string())
            .or_insert_with(|| MediaRecord {
                item: item.clone(),
                status: MediaStatus::Pending,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    fn add_download(&self, download: &Download) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;

        let exists = state.downloads.iter().any(|d| {
            d.item == download.item && d.location == download.location
        });
        if !exists {
            state.downloads.push(download.clone());
        }
        Ok(())
    }

    fn add_torrent(&self, magnet: &Magnet) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;

        let exists = state
            .magnets
            .iter()
            .any(|m| m.item == magnet.item && m.location == magnet.location);
        if !exists {
            state.magnets.push(magnet.clone());
        }
        Ok(())
    }

    fn update_download(
        &self,
        download: &Download,
        filepath: &str,
        is_done: bool,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;

        state.updates.push(RecordedUpdate {
            title: download.item.unique_title().to_string(),
            location: download.location.clone(),
            filepath: filepath.to_string(),
            is_done,
            error: error.map(str::to_string),
        });

        let exists = state
            .downloads
            .iter()
            .any(|d| d.item == download.item && d.location == download.location);
        if !exists {
            state.downloads.push(download.clone());
        }

        // Downloads submitted straight to the engine may have no item record.
        let title = download.item.unique_title();
        if let Ok(current) = Self::current_status(&state, title) {
            let status = Self::status_from_downloads(&state, title);
            if current == status || current.can_transition_to(status) {
                Self::set_status_locked(&mut state, title, status)?;
            }
        }
        Ok(())
    }

    fn set_status(&self, title: &str, status: MediaStatus) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;

        let current = Self::current_status(&state, title)?;
        if current != status && !current.can_transition_to(status) {
            return Err(RepositoryError::InvalidTransition {
                title: title.to_string(),
                from: current,
                to: status,
            });
        }
        Self::set_status_locked(&mut state, title, status)
    }

    fn fetch(&self, title: &str) -> Result<Option<MediaRecord>, RepositoryError> {
        Ok(self.state.lock().unwrap().records.get(title).cloned())
    }

    fn delete(&self, title: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;

        if state.records.remove(title).is_none() {
            return Err(RepositoryError::NotFound(title.to_string()));
        }
        state.magnets.retain(|m| m.item.unique_title() != title);
        state.downloads.retain(|d| d.item.unique_title() != title);
        Ok(())
    }

    fn in_progress_downloads(&self) -> Result<Vec<Download>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .downloads
            .iter()
            .filter(|d| {
                matches!(
                    state.records.get(d.item.unique_title()).map(|r| r.status),
                    Some(MediaStatus::Extracting | MediaStatus::Downloading)
                ) && !state.updates.iter().any(|u| {
                    u.title == d.item.unique_title() && u.location == d.location && u.is_done
                })
            })
            .cloned()
            .collect())
    }

    fn non_extracted_torrents(&self) -> Result<Vec<Magnet>, RepositoryError> {
        let state = self.state.lock().unwrap();

        let mut best: HashMap<&str, &Magnet> = HashMap::new();
        for magnet in &state.magnets {
            let title = magnet.item.unique_title();
            let eligible = matches!(
                state.records.get(title).map(|r| r.status),
                Some(MediaStatus::Scraped | MediaStatus::Extracting)
            ) && !state.downloads.iter().any(|d| d.item == magnet.item);
            if !eligible {
                continue;
            }
            best.entry(title)
                .and_modify(|current| {
                    if magnet.rating < current.rating {
                        *current = magnet;
                    }
                })
                .or_insert(magnet);
        }

        let mut magnets: Vec<Magnet> = best.into_values().cloned().collect();
        magnets.sort_by(|a, b| {
            a.rating
                .cmp(&b.rating)
                .then_with(|| a.item.unique_title().cmp(b.item.unique_title()))
        });
        Ok(magnets)
    }

    fn list(&self, limit: usize) -> Result<Vec<MediaRecord>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records.truncate(limit);
        Ok(records)
    }
}
