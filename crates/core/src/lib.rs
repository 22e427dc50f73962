pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod extract;
pub mod media;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod poll;
pub mod storage;
pub mod testing;
pub mod transfer;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DownloadsConfig,
    LogFormat, LoggingConfig, SanitizedConfig, WatchlistEntry,
};
pub use dispatcher::{
    DispatchError, Dispatcher, DownloadHandler, ExtractHandler, HandlerError, ScrapeHandler, Stage,
};
pub use engine::{
    DownloadEngine, DownloadInfo, DownloadProgress, EngineConfig, EngineError, EngineStatus,
    Getter, Informer, ProgressTrigger, RetryConfig, TransferError,
};
pub use extract::{MetadataResolver, PassthroughExtractor, TorrentExtractor, TorrentFile};
pub use media::{Download, Magnet, MediaRecord, MediaStatus, MediaType, SearchItem};
pub use notify::{LogNotifier, NoopNotifier, Notifier, NotifyError};
pub use pipeline::{ItemOutcome, Pipeline, PipelineError, PipelineStatus};
pub use poll::{PollStage, Provider, ProviderError, StaticProvider};
pub use storage::{MediaRepository, RepositoryError, SqliteMediaRepository};
pub use transfer::{HttpGetter, HttpInformer};
