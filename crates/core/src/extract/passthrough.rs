//! Extract handler for sources that are already direct links.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::dispatcher::{ExtractHandler, HandlerError};
use crate::media::{Download, Magnet};

/// Turns the best source of each item into one download of its location,
/// written to `downloads_dir/<unique title>`.
///
/// The best source is the one with the lowest rating, the first one on ties.
/// Items keep the order in which their first source appears.
#[derive(Debug, Clone)]
pub struct PassthroughExtractor {
    downloads_dir: PathBuf,
}

impl PassthroughExtractor {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
        }
    }
}

/// Lowest-rated source per item.
fn best_sources(magnets: &[Magnet]) -> Vec<&Magnet> {
    let mut best: Vec<&Magnet> = Vec::new();
    for magnet in magnets {
        match best.iter_mut().find(|b| b.item == magnet.item) {
            Some(current) if magnet.rating < current.rating => *current = magnet,
            Some(_) => {}
            None => best.push(magnet),
        }
    }
    best
}

#[async_trait]
impl ExtractHandler for PassthroughExtractor {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn extract(&self, magnets: &[Magnet]) -> Result<Vec<Download>, HandlerError> {
        Ok(best_sources(magnets)
            .into_iter()
            .map(|magnet| {
                Download::new(
                    magnet.item.clone(),
                    magnet.location.clone(),
                    self.downloads_dir.join(magnet.item.unique_title()),
                )
            })
            .collect())
    }
}
