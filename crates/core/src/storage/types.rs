//! Repository trait and errors.

use thiserror::Error;

use crate::media::{Download, Magnet, MediaRecord, MediaStatus, SearchItem};

/// Error type for repository operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record for {title}: {reason}")]
    Corrupt { title: String, reason: String },

    #[error("Cannot move {title} from {from} to {to}")]
    InvalidTransition {
        title: String,
        from: MediaStatus,
        to: MediaStatus,
    },
}

/// Durable store of pipeline state.
///
/// Every insert is idempotent: storing the same item, source or download a
/// second time is a no-op.
pub trait MediaRepository: Send + Sync {
    /// Record a newly seen item with status Pending.
    fn store_item(&self, item: &SearchItem) -> Result<(), RepositoryError>;

    /// Record a requested download.
    fn add_download(&self, download: &Download) -> Result<(), RepositoryError>;

    /// Record a candidate source.
    fn add_torrent(&self, magnet: &Magnet) -> Result<(), RepositoryError>;

    /// Record the state of a download and advance the item status.
    ///
    /// The new status is derived from all of the item's downloads with
    /// [`MediaStatus::from_downloads`]. A download with an error counts as
    /// failed even if it is marked done. Moves the status does not allow are
    /// skipped, so a Downloaded item stays Downloaded.
    fn update_download(
        &self,
        download: &Download,
        filepath: &str,
        is_done: bool,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Set the status of an item.
    ///
    /// Fails with [`RepositoryError::InvalidTransition`] when the current
    /// status cannot move to `status`. Setting the current status again is a
    /// no-op that only touches the update time.
    fn set_status(&self, title: &str, status: MediaStatus) -> Result<(), RepositoryError>;

    fn fetch(&self, title: &str) -> Result<Option<MediaRecord>, RepositoryError>;

    fn delete(&self, title: &str) -> Result<(), RepositoryError>;

    /// Unfinished downloads of items that were extracting or downloading.
    fn in_progress_downloads(&self) -> Result<Vec<Download>, RepositoryError>;

    /// One source per scraped item that never got a download, lowest rating
    /// first.
    fn non_extracted_torrents(&self) -> Result<Vec<Magnet>, RepositoryError>;

    /// Records ordered by last update, most recent first.
    fn list(&self, limit: usize) -> Result<Vec<MediaRecord>, RepositoryError>;
}
