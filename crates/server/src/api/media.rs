//! Persisted media record endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use sofa_core::{MediaRecord, RepositoryError};

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn repository_error(e: RepositoryError) -> Response {
    match e {
        RepositoryError::NotFound(title) => {
            error_response(StatusCode::NOT_FOUND, format!("Media not found: {}", title))
        }
        other => {
            error!("Repository error: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub media: Vec<MediaRecord>,
    pub count: usize,
}

/// Most recently updated records first.
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.repository().list(query.limit) {
        Ok(media) => Json(MediaListResponse {
            count: media.len(),
            media,
        })
        .into_response(),
        Err(e) => repository_error(e),
    }
}

pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Response {
    match state.repository().fetch(&title) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => repository_error(RepositoryError::NotFound(title)),
        Err(e) => repository_error(e),
    }
}

/// Forget a record with its sources and downloads, so it is searched again.
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Response {
    match state.repository().delete(&title) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => repository_error(e),
    }
}
