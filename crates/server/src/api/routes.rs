use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::middleware::{stamp_config_hash, track_requests};
use super::{downloads, handlers, media};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        // Downloads in flight
        .route("/downloads", get(downloads::list_downloads))
        .route("/downloads/report", post(downloads::trigger_report))
        // Persisted records
        .route("/media", get(media::list_media))
        .route(
            "/media/{title}",
            get(media::get_media).delete(media::delete_media),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(track_requests))
                .layer(middleware::from_fn_with_state(
                    Arc::clone(&state),
                    stamp_config_hash,
                )),
        )
        .with_state(state)
}
