//! Testing utilities and mock implementations.
//!
//! Mocks for every external collaborator of the pipeline, so the engine,
//! the poll stage and the pipeline runner can be exercised without real
//! backends.
//!
//! # Example
//!
//! ```rust,ignore
//! use sofa_core::testing::{MockGetter, MockNotifier, MockRepository};
//!
//! let getter = MockGetter::holding();
//! let repository = MockRepository::new();
//!
//! // ... run the engine, then complete every transfer
//! getter.release_all();
//! ```

mod mock_getter;
mod mock_notifier;
mod mock_provider;
mod mock_repository;

pub use mock_getter::{MockGetter, MockInformer, MockTransfer};
pub use mock_notifier::MockNotifier;
pub use mock_provider::MockProvider;
pub use mock_repository::{MockRepository, RecordedUpdate};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::media::{Download, Magnet, Quality, SearchItem};

    /// A movie item.
    pub fn movie(title: &str, year: u16) -> SearchItem {
        SearchItem::movie(title, year)
    }

    /// A download of `item` from `location` into a fake downloads dir.
    pub fn download(item: &SearchItem, location: &str) -> Download {
        let file = location.rsplit('/').next().unwrap_or(location);
        Download::new(
            item.clone(),
            location,
            PathBuf::from("/downloads").join(item.unique_title()).join(file),
        )
    }

    /// A 1080p x264 source with reasonable defaults.
    pub fn magnet(item: &SearchItem, location: &str) -> Magnet {
        Magnet::new(item.clone(), location)
            .classified_from(&format!("{} 1080p BluRay x264", item.unique_title()))
            .with_size(1024 * 1024 * 1024 * 4) // 4 GB
            .with_seeders(50)
    }

    /// A source with an explicit quality and rating.
    pub fn rated_magnet(item: &SearchItem, location: &str, quality: Quality, rating: i32) -> Magnet {
        magnet(item, location).with_quality(quality).with_rating(rating)
    }
}
