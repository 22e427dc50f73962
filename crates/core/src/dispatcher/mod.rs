//! Stage dispatcher.
//!
//! Decouples the stages of the pipeline (scrape, extract, download) from the
//! handlers implementing them. Any number of handlers can be registered per
//! stage; running a stage invokes all of them in registration order and
//! concatenates their outputs, aborting on the first handler error.

mod handler;
mod runner;
mod types;

pub use handler::FnHandler;
pub use runner::Dispatcher;
pub use types::*;
