//! Row processing and deduplication.
//!
//! Each scan hands the extracted rows to [`RowProcessor::process`]. A row is
//! skipped when it already carries a marker or is already claimed. Rows with
//! inline artwork are annotated on the spot; the rest are claimed and only
//! then handed to the artwork resolver on a spawned task. The claim is taken
//! while the caller still holds the tree lock, so a second scan can never
//! dispatch the same row twice.

mod annotate;
mod claims;

pub use annotate::{has_marker, inject, marker_src, remove_all_markers, MARKER_CLASS};
pub use claims::{ClaimSet, ClaimState};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::artwork::{Artwork, ArtworkResolver, ResolveError};
use crate::dom::{DocumentTree, SharedTree};
use crate::features::FeatureState;
use crate::metrics::{ROWS_ANNOTATED, ROWS_DISPATCHED};
use crate::site::{RowDescriptor, SiteId};

/// Called with the tree locked after a resolved row was annotated:
/// `(tree, detail_link, poster_url)`.
pub type ResolvedHook = Arc<dyn Fn(&mut DocumentTree, &str, &str) + Send + Sync>;

/// What one `process` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub annotated_inline: usize,
    pub dispatched: usize,
    pub skipped: usize,
}

struct Shared {
    tree: SharedTree,
    resolver: ArtworkResolver,
    features: Arc<FeatureState>,
    site: SiteId,
    poster_height_px: u32,
    claims: Mutex<ClaimSet>,
    in_flight: AtomicUsize,
    on_resolved: Option<ResolvedHook>,
}

impl Shared {
    fn claims(&self) -> MutexGuard<'_, ClaimSet> {
        self.claims.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn complete(&self, row: &RowDescriptor, result: Result<Artwork, ResolveError>) {
        let mut tree = self.tree.lock();
        let mut claims = self.claims();

        if !self.features.is_enabled(self.site) {
            debug!(
                "Resolution for {} completed while {} is disabled",
                row.detail_link, self.site
            );
            claims.release(row.node);
            return;
        }

        match result {
            Ok(artwork) => {
                if !tree.is_attached(row.node) {
                    claims.release(row.node);
                    return;
                }
                claims.settle(row.node);
                drop(claims);

                if inject(&mut tree, row.anchor, &artwork.url, self.poster_height_px).is_some() {
                    ROWS_ANNOTATED.with_label_values(&["resolved"]).inc();
                }
                if let Some(hook) = &self.on_resolved {
                    hook(&mut *tree, &row.detail_link, &artwork.url);
                }
            }
            Err(e) => {
                warn!("Failed to resolve artwork for {}: {}", row.detail_link, e);
                claims.settle(row.node);
            }
        }
    }
}

/// Drives annotation for one page.
#[derive(Clone)]
pub struct RowProcessor {
    shared: Arc<Shared>,
}

impl RowProcessor {
    pub fn new(
        tree: SharedTree,
        resolver: ArtworkResolver,
        features: Arc<FeatureState>,
        site: SiteId,
        poster_height_px: u32,
        on_resolved: Option<ResolvedHook>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                tree,
                resolver,
                features,
                site,
                poster_height_px,
                claims: Mutex::new(ClaimSet::new()),
                in_flight: AtomicUsize::new(0),
                on_resolved,
            }),
        }
    }

    /// Process `rows` in document order. `tree` must be the locked tree this
    /// processor was built with.
    pub fn process(&self, tree: &mut DocumentTree, rows: &[RowDescriptor]) -> ProcessOutcome {
        let mut outcome = ProcessOutcome::default();
        let mut claims = self.shared.claims();
        let pruned = claims.prune(tree);
        if pruned > 0 {
            debug!("Pruned {} claims of detached rows", pruned);
        }

        for row in rows {
            if has_marker(tree, row.node) || claims.contains(row.node) {
                outcome.skipped += 1;
                continue;
            }

            if let Some(poster) = &row.inline_poster {
                claims.claim(row.node, ClaimState::Settled);
                if inject(tree, row.anchor, poster, self.shared.poster_height_px).is_some() {
                    ROWS_ANNOTATED.with_label_values(&["inline"]).inc();
                    outcome.annotated_inline += 1;
                }
                continue;
            }

            // Header and separator rows.
            if row.title.is_empty() {
                outcome.skipped += 1;
                continue;
            }

            claims.claim(row.node, ClaimState::InFlight);
            self.dispatch(row.clone());
            outcome.dispatched += 1;
        }

        outcome
    }

    fn dispatch(&self, row: RowDescriptor) {
        ROWS_DISPATCHED.inc();
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let result = shared.resolver.resolve(&row.detail_link).await;
            shared.complete(&row, result);
            shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Resolutions spawned and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Release every settled claim so those rows are processed again.
    pub fn release_settled(&self) -> usize {
        self.shared.claims().release_settled()
    }

    pub fn claim_count(&self) -> usize {
        self.shared.claims().len()
    }
}
