//! Artwork resolution.
//!
//! Resolves the poster of a listing row that has no inline artwork:
//! durable cache first, then a fetch and parse of the detail page, then the
//! fixed "No Poster" placeholder (also used when the fetch fails). Whatever is
//! resolved is written back to the cache before it is returned, so a detail
//! page is fetched at most once per cache lifetime.

mod cache;
mod detail;
mod fetcher;

pub use cache::ArtworkCache;
pub use detail::{find_poster, DENYLISTED_INFIXES, MIN_DIMENSION};
pub use fetcher::{FetchError, HttpFetcher, PageFetcher};

use std::sync::Arc;

use reqwest::Url;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::{ARTWORK_FAILURES, ARTWORK_RESOLUTIONS};
use crate::store::{KvStore, StoreError};

/// Embedded placeholder: grey 200x300 card reading "No Poster".
pub const PLACEHOLDER_POSTER: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iMjAwIiBoZWlnaHQ9IjMwMCIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj48cmVjdCB3aWR0aD0iMTAwJSIgaGVpZ2h0PSIxMDAlIiBmaWxsPSIjZWVlIi8+PHRleHQgeD0iNTAlIiB5PSI1MCUiIGZvbnQtZmFtaWx5PSJBcmlhbCIgZm9udC1zaXplPSIyMCIgZmlsbD0iI2FhYSIgZG9taW5hbnQtYmFzZWxpbmU9Im1pZGRsZSIgdGV4dC1hbmNob3I9Im1pZGRsZSI+Tm8gUG9zdGVyPC90ZXh0Pjwvc3ZnPg==";

/// Where a resolved poster came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkOrigin {
    Cache,
    DetailPage,
    Placeholder,
}

impl ArtworkOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtworkOrigin::Cache => "cache",
            ArtworkOrigin::DetailPage => "detail_page",
            ArtworkOrigin::Placeholder => "placeholder",
        }
    }
}

/// A resolved poster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artwork {
    pub url: String,
    pub origin: ArtworkOrigin,
}

/// Errors that leave a row unresolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Artwork cache unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Resolves posters for detail pages.
#[derive(Clone)]
pub struct ArtworkResolver {
    cache: ArtworkCache,
    fetcher: Arc<dyn PageFetcher>,
}

impl ArtworkResolver {
    pub fn new(store: Arc<dyn KvStore>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            cache: ArtworkCache::new(store),
            fetcher,
        }
    }

    pub fn cache(&self) -> &ArtworkCache {
        &self.cache
    }

    /// Resolve the poster for `detail_link`.
    ///
    /// A cached entry is returned without network access. A failed fetch and
    /// a page without a qualifying image both resolve to
    /// [`PLACEHOLDER_POSTER`], which is cached. Only an unavailable cache is
    /// an error.
    pub async fn resolve(&self, detail_link: &str) -> Result<Artwork, ResolveError> {
        if let Some(url) = self.cache.lookup(detail_link)? {
            debug!(detail = detail_link, "Artwork cache hit");
            ARTWORK_RESOLUTIONS
                .with_label_values(&[ArtworkOrigin::Cache.as_str()])
                .inc();
            return Ok(Artwork {
                url,
                origin: ArtworkOrigin::Cache,
            });
        }

        let found = match self.fetcher.fetch(detail_link).await {
            Ok(html) => find_poster(&html),
            Err(e) => {
                warn!(detail = detail_link, "Detail page fetch failed: {}", e);
                ARTWORK_FAILURES.inc();
                None
            }
        };

        let (poster, origin) = match found {
            Some(src) => (absolutize(detail_link, &src), ArtworkOrigin::DetailPage),
            None => (PLACEHOLDER_POSTER.to_string(), ArtworkOrigin::Placeholder),
        };
        debug!(
            detail = detail_link,
            origin = origin.as_str(),
            "Artwork resolved"
        );

        let url = self.cache.remember(detail_link, &poster)?;
        ARTWORK_RESOLUTIONS
            .with_label_values(&[origin.as_str()])
            .inc();
        Ok(Artwork { url, origin })
    }
}

/// Resolve an image `src` against the page it was found on.
fn absolutize(page: &str, src: &str) -> String {
    Url::parse(page)
        .and_then(|base| base.join(src))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| src.to_string())
}
