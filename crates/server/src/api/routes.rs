use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{augment, cache, handlers, middleware::metrics_middleware, settings};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Settings surface
        .route("/settings", get(settings::get_settings))
        .route("/settings/features/{site}", put(settings::set_feature))
        // Artwork cache
        .route("/cache", get(cache::get_entry).delete(cache::clear_cache))
        // Pipeline
        .route("/augment", post(augment::augment))
        .route("/view", get(augment::view))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
