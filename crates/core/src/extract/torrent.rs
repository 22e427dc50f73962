//! Extract handler backed by torrent metadata.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::files::{select_files, TorrentFile};
use crate::dispatcher::{ExtractHandler, HandlerError};
use crate::media::{Download, Magnet};

/// Looks up the file list of a source (torrent client, debrid service...).
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn files(&self, magnet: &Magnet) -> Result<Vec<TorrentFile>, HandlerError>;
}

/// Extract handler that downloads the video files of each source.
pub struct TorrentExtractor<R> {
    resolver: R,
    downloads_dir: PathBuf,
}

impl<R: MetadataResolver> TorrentExtractor<R> {
    pub fn new(resolver: R, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            downloads_dir: downloads_dir.into(),
        }
    }
}

#[async_trait]
impl<R: MetadataResolver> ExtractHandler for TorrentExtractor<R> {
    fn name(&self) -> &str {
        self.resolver.name()
    }

    async fn extract(&self, magnets: &[Magnet]) -> Result<Vec<Download>, HandlerError> {
        let mut downloads = Vec::new();
        for magnet in magnets {
            let files = self.resolver.files(magnet).await?;
            let selected = select_files(magnet.item.media_type(), &files).map_err(|e| match e {
                HandlerError::NothingFound(_) => HandlerError::NothingFound(format!(
                    "no video files found for {}",
                    magnet.location
                )),
                other => other,
            })?;

            debug!(
                "Selected {} of {} files for {}",
                selected.len(),
                files.len(),
                magnet.item
            );

            downloads.extend(selected.into_iter().map(|file| {
                Download::new(
                    magnet.item.clone(),
                    file.location,
                    self.downloads_dir.join(&file.path),
                )
            }));
        }
        Ok(downloads)
    }
}
