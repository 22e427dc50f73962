//! In-flight download endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use sofa_core::engine::{format_bytes, DownloadProgress};

use crate::state::AppState;

/// One in-flight transfer.
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    #[serde(flatten)]
    pub progress: DownloadProgress,
    /// Human readable `downloaded/total`.
    pub progress_bytes: String,
}

impl From<DownloadProgress> for DownloadResponse {
    fn from(progress: DownloadProgress) -> Self {
        let progress_bytes = format!(
            "{}/{}",
            format_bytes(progress.downloaded_bytes),
            format_bytes(progress.total_bytes)
        );
        Self {
            progress,
            progress_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadsResponse {
    pub downloads: Vec<DownloadResponse>,
    pub count: usize,
}

/// Progress of every in-flight download.
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> Json<DownloadsResponse> {
    let downloads: Vec<DownloadResponse> = state
        .pipeline()
        .engine()
        .progress()
        .await
        .into_iter()
        .map(DownloadResponse::from)
        .collect();

    Json(DownloadsResponse {
        count: downloads.len(),
        downloads,
    })
}

/// Ask the engine to log a progress report.
pub async fn trigger_report(State(state): State<Arc<AppState>>) -> StatusCode {
    info!("Progress report requested over HTTP");
    state.pipeline().engine().progress_trigger().fire();
    StatusCode::ACCEPTED
}
