//! Artwork cache inspection and clearing.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use posterboard_core::{clear_cache_preserving_flags, PLACEHOLDER_POSTER};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CacheQuery {
    /// Absolute detail page URL.
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct CacheEntryResponse {
    pub detail: String,
    pub poster: String,
    pub placeholder: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: bool,
}

/// Look up the cached poster of one detail page.
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<CacheEntryResponse>, ApiError> {
    match state.resolver().cache().lookup(&query.detail) {
        Ok(Some(poster)) => Ok(Json(CacheEntryResponse {
            placeholder: poster == PLACEHOLDER_POSTER,
            detail: query.detail,
            poster,
        })),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No cached artwork for {}", query.detail),
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Drop every cached poster; feature flags are written back right away.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearCacheResponse>, ApiError> {
    clear_cache_preserving_flags(state.store(), state.features()).map_err(|e| {
        error!("Failed to clear artwork cache: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(ClearCacheResponse { cleared: true }))
}
