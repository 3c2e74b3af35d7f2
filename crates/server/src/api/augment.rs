//! Run the augmentation pipeline over a listing page and return the result.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use posterboard_core::{parse_document, render_document, PageAugmenter, SharedTree, SiteId};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

/// Response header telling whether the pipeline went quiet before the
/// configured settle timeout.
pub const SETTLED_HEADER: &str = "x-posterboard-settled";

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Address the listing page was served from.
    pub url: String,
}

fn page_site(raw: &str) -> Result<(Url, SiteId), ApiError> {
    let url = Url::parse(raw)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid url: {}", e)))?;
    let site = url.host_str().and_then(SiteId::for_host).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Unsupported site: {}", url.host_str().unwrap_or_default()),
        )
    })?;
    Ok((url, site))
}

async fn augment_page(state: &AppState, url: Url, site: SiteId, html: &str) -> impl IntoResponse {
    let tree = SharedTree::new(parse_document(html, Some(url.clone())));
    let config = state.augment_config();
    let augmenter = PageAugmenter::new(
        tree.clone(),
        site,
        Arc::clone(state.features()),
        state.resolver().clone(),
        config,
    );

    augmenter.start();
    let settled = augmenter.settle(config.settle_timeout()).await;
    augmenter.shutdown();

    if settled {
        debug!("Augmented {} after {} scans", url, augmenter.scan_count());
    } else {
        warn!(
            "Pipeline for {} still busy after {:?}, returning partial result",
            url,
            config.settle_timeout()
        );
    }

    let body = {
        let tree = tree.lock();
        render_document(&tree)
    };
    (
        [(SETTLED_HEADER, if settled { "true" } else { "false" })],
        Html(body),
    )
}

/// Augment listing HTML posted by the caller.
pub async fn augment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let (url, site) = page_site(&query.url)?;
    info!("Augmenting posted {} page {}", site, url);
    Ok(augment_page(&state, url, site, &body).await)
}

/// Fetch a listing page with the configured fetcher and augment it.
pub async fn view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (url, site) = page_site(&query.url)?;
    let html = state.fetcher().fetch(url.as_str()).await.map_err(|e| {
        warn!("Failed to fetch listing {}: {}", url, e);
        api_error(StatusCode::BAD_GATEWAY, e.to_string())
    })?;
    info!("Augmenting fetched {} page {}", site, url);
    Ok(augment_page(&state, url, site, &html).await)
}
