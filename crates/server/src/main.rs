use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sofa_core::{
    load_config, validate_config, Dispatcher, DownloadEngine, HttpGetter, LogFormat, LogNotifier,
    MediaRepository, PassthroughExtractor, Pipeline, PollStage, ProgressTrigger, Provider,
    SqliteMediaRepository, StaticProvider,
};
use sofa_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be initialised yet.
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("SOFA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load and validate configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_tracing(config.logging.format);

    info!("Configuration loaded from {:?}", config_path);
    info!("Database path: {:?}", config.database.path);
    info!("Downloads dir: {:?}", config.downloads.dir);

    let repository: Arc<dyn MediaRepository> = Arc::new(
        SqliteMediaRepository::new(&config.database.path)
            .context("Failed to open media repository")?,
    );

    let mut dispatcher = Dispatcher::new();
    dispatcher.register_extract_handler(Arc::new(PassthroughExtractor::new(
        config.downloads.dir.clone(),
    )));

    let providers: Vec<Arc<dyn Provider>> = StaticProvider::from_watchlist(&config.watchlist)
        .context("Invalid watchlist")?
        .into_iter()
        .map(|p| Arc::new(p) as Arc<dyn Provider>)
        .collect();
    info!("Watching {} items", config.watchlist.len());

    let getter = HttpGetter::new().context("Failed to create HTTP getter")?;
    let engine = Arc::new(DownloadEngine::new(
        config.engine.clone(),
        Arc::clone(&repository),
        Arc::new(getter),
        Arc::new(LogNotifier),
    ));

    let pipeline = Arc::new(Pipeline::new(
        dispatcher,
        Arc::clone(&repository),
        PollStage::new(providers),
        Arc::clone(&engine),
    ));
    pipeline.start().await.context("Failed to start pipeline")?;

    let report_handle = tokio::spawn(report_on_signal(engine.progress_trigger()));

    let state = Arc::new(AppState::new(
        config.clone(),
        repository,
        Arc::clone(&pipeline),
    ));
    info!("Config hash: {}", state.config_hash());

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    report_handle.abort();
    pipeline.stop().await;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Log a progress report on every SIGUSR1.
#[cfg(unix)]
async fn report_on_signal(trigger: ProgressTrigger) {
    let mut usr1 = match signal::unix::signal(signal::unix::SignalKind::user_defined1()) {
        Ok(signal) => signal,
        Err(e) => {
            warn!("Failed to install SIGUSR1 handler: {}", e);
            return;
        }
    };
    while usr1.recv().await.is_some() {
        trigger.fire();
    }
}

#[cfg(not(unix))]
async fn report_on_signal(_trigger: ProgressTrigger) {
    std::future::pending::<()>().await;
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
