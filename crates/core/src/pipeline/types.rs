//! Types for the pipeline runner.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatcher::DispatchError;
use crate::engine::{EngineError, EngineStatus};
use crate::storage::RepositoryError;

/// Errors that can occur while driving an item through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline already running")]
    AlreadyRunning,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("stage failed: {0}")]
    Stage(#[from] DispatchError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("download engine input closed")]
    EngineClosed,
}

/// What happened to one polled item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Already picked up by an earlier poll.
    Skipped,
    /// Scrapers found nothing; the item stays pending.
    NoSources,
    /// Downloads were handed to the engine.
    Submitted(usize),
    /// Download handlers finished the item synchronously.
    Downloaded(usize),
}

/// Current status of the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub providers: usize,
    pub scrape_handlers: usize,
    pub extract_handlers: usize,
    pub download_handlers: usize,
    pub engine: EngineStatus,
}
