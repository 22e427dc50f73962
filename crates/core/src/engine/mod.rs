//! Download engine: admission, tracking and completion of transfers.

mod config;
mod progress;
mod registry;
mod retry;
mod runner;
mod types;

pub use config::{EngineConfig, RetryConfig};
pub use progress::{format_bytes, ProgressTrigger};
pub use registry::{DedupSet, InflightEntry, InflightRegistry};
pub use retry::RetryPolicy;
pub use runner::DownloadEngine;
pub use types::*;
