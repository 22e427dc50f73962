//! Persistence gateway for media records, sources and downloads.

mod sqlite;
mod types;

pub use sqlite::SqliteMediaRepository;
pub use types::*;
