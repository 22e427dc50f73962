//! Pipeline runner wiring poll, dispatcher stages and the download engine.

mod runner;
mod types;

pub use runner::Pipeline;
pub use types::*;
