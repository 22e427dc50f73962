//! Poll stage.
//!
//! Turns a set of independent, interval-driven catalog providers into one
//! stream of [`SearchItem`](crate::media::SearchItem)s. Each provider gets its
//! own loop; a slow or failing provider only ever delays itself.

mod runner;
mod static_provider;
mod types;

pub use runner::{PollStage, POLL_CHANNEL_CAPACITY};
pub use static_provider::StaticProvider;
pub use types::*;
