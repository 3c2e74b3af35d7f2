//! Per-page wiring of the augmentation pipeline.
//!
//! A [`PageAugmenter`] owns everything attached to one live page: the change
//! scheduler, the row processor and, in gallery mode, the gallery projector.
//! It follows the page's site flag: enabling arms the scheduler (which scans
//! at once), disabling stops it, removes every marker, releases the settled
//! claims and hides the gallery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::artwork::ArtworkResolver;
use crate::config::{AugmentConfig, DisplayMode};
use crate::dom::{DocumentTree, SharedTree};
use crate::features::FeatureState;
use crate::gallery::{GalleryProjector, ProjectOutcome};
use crate::metrics::SCANS_TOTAL;
use crate::processor::{remove_all_markers, ProcessOutcome, ResolvedHook, RowProcessor};
use crate::scheduler::{ChangeScheduler, SchedulerState};
use crate::site::{self, SiteId};

/// Poll interval of [`PageAugmenter::settle`].
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What one scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub rows: usize,
    pub annotated_inline: usize,
    pub dispatched: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery: Option<ProjectOutcome>,
}

pub struct PageAugmenter {
    site: SiteId,
    tree: SharedTree,
    features: Arc<FeatureState>,
    processor: RowProcessor,
    scheduler: ChangeScheduler,
    gallery: Option<Arc<GalleryProjector>>,
    scans: AtomicUsize,
    feature_listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PageAugmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageAugmenter")
            .field("site", &self.site)
            .field("scheduler", &self.scheduler.state())
            .field("in_flight", &self.processor.in_flight())
            .field("claims", &self.processor.claim_count())
            .finish()
    }
}

impl PageAugmenter {
    pub fn new(
        tree: SharedTree,
        site: SiteId,
        features: Arc<FeatureState>,
        resolver: ArtworkResolver,
        config: &AugmentConfig,
    ) -> Arc<Self> {
        let window = config.debounce_window();
        let gallery = match config.display {
            DisplayMode::Gallery => Some(Arc::new(GalleryProjector::new(
                tree.clone(),
                site,
                Arc::clone(&features),
                window,
            ))),
            DisplayMode::Annotate => None,
        };

        let on_resolved: Option<ResolvedHook> = gallery.as_ref().map(|gallery| {
            let gallery = Arc::clone(gallery);
            let hook: ResolvedHook =
                Arc::new(move |tree: &mut DocumentTree, detail_link: &str, poster: &str| {
                    gallery.patch(tree, detail_link, poster);
                });
            hook
        });

        let processor = RowProcessor::new(
            tree.clone(),
            resolver,
            Arc::clone(&features),
            site,
            config.poster_height_px,
            on_resolved,
        );

        Arc::new_cyclic(|weak: &Weak<PageAugmenter>| {
            let weak = weak.clone();
            let scheduler = ChangeScheduler::new(window, move || {
                if let Some(augmenter) = weak.upgrade() {
                    augmenter.scan();
                }
            });

            Self {
                site,
                tree,
                features,
                processor,
                scheduler,
                gallery,
                scans: AtomicUsize::new(0),
                feature_listener: Mutex::new(None),
            }
        })
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    fn feature_listener(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.feature_listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Follow the site's feature flag and, if it is enabled, arm now.
    pub fn start(self: &Arc<Self>) {
        let mut transitions = self.features.subscribe();
        let weak = Arc::downgrade(self);
        let site = self.site;

        let handle = tokio::spawn(async move {
            loop {
                let enabled = match transitions.recv().await {
                    Ok(transition) if transition.site == site => transition.enabled,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Feature listener lagged by {} transitions", missed);
                        match weak.upgrade() {
                            Some(augmenter) => augmenter.features.is_enabled(site),
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(augmenter) = weak.upgrade() else {
                    break;
                };
                if enabled {
                    augmenter.enable();
                } else {
                    augmenter.disable();
                }
            }
        });
        if let Some(previous) = self.feature_listener().replace(handle) {
            previous.abort();
        }

        if self.features.is_enabled(self.site) {
            self.enable();
        } else {
            info!("Augmentation disabled for {}", self.site);
        }
    }

    /// Arm the scheduler; scans immediately unless already armed.
    pub fn enable(&self) {
        let mutations = self.tree.lock().subscribe();
        if self.scheduler.start(mutations) {
            info!("Augmentation enabled for {}", self.site);
        }
    }

    /// Stop scanning and tear down everything visible.
    pub fn disable(&self) {
        self.scheduler.stop();
        if let Some(gallery) = &self.gallery {
            gallery.cancel_rebuild();
        }

        let mut tree = self.tree.lock();
        let removed = remove_all_markers(&mut tree);
        let released = self.processor.release_settled();
        if let Some(gallery) = &self.gallery {
            gallery.set_visible(&mut tree, false);
        }
        info!(
            "Augmentation disabled for {}: removed {} markers, released {} claims",
            self.site, removed, released
        );
    }

    /// Extract, process and (in gallery mode) project once.
    pub fn scan(&self) -> ScanOutcome {
        if !self.features.is_enabled(self.site) {
            return ScanOutcome::default();
        }

        let mut tree = self.tree.lock();
        // A disable may have run between the check above and the lock.
        if !self.features.is_enabled(self.site) {
            return ScanOutcome::default();
        }
        let rows = site::extract(&tree, self.site);
        let ProcessOutcome {
            annotated_inline,
            dispatched,
            skipped,
        } = self.processor.process(&mut tree, &rows);
        let gallery = self
            .gallery
            .as_ref()
            .map(|gallery| gallery.project(&mut tree, &rows));

        SCANS_TOTAL.inc();
        self.scans.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Scanned {}: {} rows, {} inline, {} dispatched, {} skipped",
            self.site,
            rows.len(),
            annotated_inline,
            dispatched,
            skipped
        );

        ScanOutcome {
            rows: rows.len(),
            annotated_inline,
            dispatched,
            skipped,
            gallery,
        }
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn in_flight(&self) -> usize {
        self.processor.in_flight()
    }

    fn is_quiescent(&self) -> bool {
        self.processor.in_flight() == 0
            && self.scheduler.state() != SchedulerState::Pending
            && !self
                .gallery
                .as_ref()
                .map(|g| g.rebuild_pending())
                .unwrap_or(false)
    }

    /// Wait until no resolution is in flight and no scan or rebuild is
    /// pending, observed on two consecutive polls so that a mutation still
    /// on its way to the scheduler is not missed. Returns false if `timeout`
    /// elapsed first.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let wait = async {
            let mut quiet_polls = 0;
            while quiet_polls < 2 {
                tokio::task::yield_now().await;
                if self.is_quiescent() {
                    quiet_polls += 1;
                } else {
                    quiet_polls = 0;
                }
                tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Detach from flags and mutations. In-flight resolutions still complete.
    pub fn shutdown(&self) {
        if let Some(listener) = self.feature_listener().take() {
            listener.abort();
        }
        self.scheduler.stop();
        if let Some(gallery) = &self.gallery {
            gallery.cancel_rebuild();
        }
        debug!("Augmenter for {} shut down", self.site);
    }
}

impl Drop for PageAugmenter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::PageFetcher;
    use crate::dom::{parse_document, render_document};
    use crate::gallery::read_cards;
    use crate::processor::MARKER_CLASS;
    use crate::store::{KvStore, MemoryKvStore};
    use crate::testing::{fixtures, MockFetcher};

    fn augmenter(
        html: &str,
        display: DisplayMode,
    ) -> (Arc<PageAugmenter>, Arc<MockFetcher>, Arc<FeatureState>) {
        let tree = SharedTree::new(parse_document(html, fixtures::linkomanija_base()));
        let fetcher = Arc::new(MockFetcher::new());
        let features = Arc::new(FeatureState::uniform(true));
        let resolver = ArtworkResolver::new(
            Arc::new(MemoryKvStore::new()) as Arc<dyn KvStore>,
            Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        );
        let config = AugmentConfig {
            display,
            ..AugmentConfig::default()
        };
        let augmenter = PageAugmenter::new(
            tree,
            SiteId::Linkomanija,
            Arc::clone(&features),
            resolver,
            &config,
        );
        (augmenter, fetcher, features)
    }

    fn marker_count(augmenter: &PageAugmenter) -> usize {
        let tree = augmenter.tree().lock();
        tree.find_all(tree.root(), |el| el.has_class(MARKER_CLASS))
            .len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_scans_and_settles() {
        let (augmenter, fetcher, _) = augmenter(
            &fixtures::linkomanija_listing(&[(1, "One"), (2, "Two")]),
            DisplayMode::Annotate,
        );
        for id in [1, 2] {
            fetcher.add_page(
                &fixtures::linkomanija_detail_url(id),
                &fixtures::detail_page(&format!("/p/{}.jpg", id)),
            );
        }

        augmenter.start();
        assert_eq!(augmenter.scan_count(), 1);
        assert!(augmenter.settle(Duration::from_secs(5)).await);

        assert_eq!(marker_count(&augmenter), 2);
        assert_eq!(fetcher.fetch_count(), 2);
        assert_eq!(augmenter.scheduler_state(), SchedulerState::Armed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scan_rechecks_flag_once_tree_is_locked() {
        let (augmenter, fetcher, features) = augmenter(
            &fixtures::linkomanija_listing(&[(1, "One")]),
            DisplayMode::Annotate,
        );
        fetcher.add_page(&fixtures::linkomanija_detail_url(1), &fixtures::detail_page("/p/1.jpg"));

        let guard = augmenter.tree().lock();
        let scanning = Arc::clone(&augmenter);
        let scan = tokio::task::spawn_blocking(move || scanning.scan());
        tokio::time::sleep(Duration::from_millis(50)).await;
        features.apply_change(&crate::store::StoreChange {
            key: SiteId::Linkomanija.flag_key(),
            old_value: None,
            new_value: Some(serde_json::Value::Bool(false)),
        });
        drop(guard);

        assert_eq!(scan.await.unwrap(), ScanOutcome::default());
        assert_eq!(augmenter.scan_count(), 0);
        assert_eq!(marker_count(&augmenter), 0);
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_site_is_left_alone() {
        let html = fixtures::linkomanija_listing(&[(1, "One")]);
        let (augmenter, fetcher, features) = augmenter(&html, DisplayMode::Annotate);
        crate::features::set_site_enabled(
            &MemoryKvStore::new(),
            &features,
            SiteId::Linkomanija,
            false,
        )
        .unwrap();

        let before = render_document(&augmenter.tree().lock());
        augmenter.start();
        assert!(augmenter.settle(Duration::from_secs(1)).await);

        assert_eq!(augmenter.scan_count(), 0);
        assert_eq!(augmenter.scheduler_state(), SchedulerState::Stopped);
        assert_eq!(fetcher.fetch_count(), 0);
        assert_eq!(render_document(&augmenter.tree().lock()), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_then_enable_reannotates_from_cache() {
        let store = MemoryKvStore::new();
        let (augmenter, fetcher, features) = augmenter(
            &fixtures::linkomanija_listing(&[(1, "One")]),
            DisplayMode::Annotate,
        );
        fetcher.add_page(
            &fixtures::linkomanija_detail_url(1),
            &fixtures::detail_page("/p/1.jpg"),
        );
        augmenter.start();
        augmenter.settle(Duration::from_secs(5)).await;
        assert_eq!(marker_count(&augmenter), 1);

        crate::features::set_site_enabled(&store, &features, SiteId::Linkomanija, false).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(marker_count(&augmenter), 0);
        assert_eq!(augmenter.scheduler_state(), SchedulerState::Stopped);

        crate::features::set_site_enabled(&store, &features, SiteId::Linkomanija, true).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(augmenter.settle(Duration::from_secs(5)).await);

        assert_eq!(marker_count(&augmenter), 1);
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gallery_mode_patches_cards() {
        let (augmenter, fetcher, _) = augmenter(
            &fixtures::linkomanija_listing(&[(1, "One"), (2, "Two")]),
            DisplayMode::Gallery,
        );
        fetcher.add_page(
            &fixtures::linkomanija_detail_url(1),
            &fixtures::detail_page("/p/1.jpg"),
        );
        fetcher.add_page(
            &fixtures::linkomanija_detail_url(2),
            &fixtures::detail_page_without_poster(),
        );

        augmenter.start();
        assert!(augmenter.settle(Duration::from_secs(5)).await);

        let tree = augmenter.tree().lock();
        let cards = read_cards(&tree).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(
            cards[0].poster.as_deref(),
            Some("https://www.linkomanija.net/p/1.jpg")
        );
        assert_eq!(
            cards[1].poster.as_deref(),
            Some(crate::artwork::PLACEHOLDER_POSTER)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_detaches_from_mutations() {
        let (augmenter, _, _) = augmenter(
            &fixtures::linkomanija_listing(&[(1, "One")]),
            DisplayMode::Annotate,
        );
        augmenter.start();
        augmenter.shutdown();
        assert_eq!(augmenter.scheduler_state(), SchedulerState::Stopped);

        {
            let mut tree = augmenter.tree().lock();
            let node = tree.create_element("div", Vec::new());
            let root = tree.root();
            tree.append_child(root, node);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(augmenter.scan_count(), 1);
    }
}
