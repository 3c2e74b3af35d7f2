//! Settings surface: per-site feature flags.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use posterboard_core::{set_site_enabled, SiteId};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// Site name -> enabled.
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetFeatureRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct SetFeatureResponse {
    pub site: SiteId,
    pub enabled: bool,
    /// False when the flag already had the requested value.
    pub changed: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Current feature flags of every supported site.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    let features = state
        .features()
        .snapshot()
        .into_iter()
        .map(|(site, enabled)| (site.as_str().to_string(), enabled))
        .collect();
    Json(SettingsResponse { features })
}

/// Persist a site's flag and apply it immediately.
pub async fn set_feature(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    Json(request): Json<SetFeatureRequest>,
) -> Result<Json<SetFeatureResponse>, ApiError> {
    let site: SiteId = site
        .parse()
        .map_err(|e: String| api_error(StatusCode::NOT_FOUND, e))?;

    let transition = set_site_enabled(state.store(), state.features(), site, request.enabled)
        .map_err(|e| {
            error!("Failed to persist flag for {}: {}", site, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Json(SetFeatureResponse {
        site,
        enabled: request.enabled,
        changed: transition.is_some(),
    }))
}
