//! Media item, source and download model.
//!
//! A [`SearchItem`] is the identity of one unit of media to acquire. Scrapers
//! turn it into candidate [`Magnet`]s, extractors narrow those down to
//! concrete [`Download`]s, and the persisted [`MediaRecord`] tracks how far
//! the item has progressed.

mod classify;
mod types;

pub use types::*;
