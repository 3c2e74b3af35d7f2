//! Page augmentation lifecycle integration tests.
//!
//! These tests drive a full `PageAugmenter` against a SQLite-backed store and
//! a mock fetcher:
//! - Initial scan, resolution and annotation
//! - Cache reuse across page loads
//! - Debounced rescans after page mutations
//! - Feature toggles arriving through the store's change stream
//! - Gallery mode

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use posterboard_core::{
    gallery::read_cards,
    parse_document, render_document, set_site_enabled,
    testing::{fixtures, MockFetcher},
    ArtworkResolver, AugmentConfig, DisplayMode, FeatureState, KvStore, PageAugmenter,
    PageFetcher, SharedTree, SiteId, SqliteKvStore, MARKER_CLASS, PLACEHOLDER_POSTER,
};

const SETTLE: Duration = Duration::from_secs(10);

/// Test helper owning the durable store and the mock network.
struct TestHarness {
    store: Arc<SqliteKvStore>,
    fetcher: Arc<MockFetcher>,
    features: Arc<FeatureState>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteKvStore::new(&temp_dir.path().join("test.db")).expect("Failed to create store"),
        );
        let features = Arc::new(FeatureState::load(store.as_ref()).expect("Failed to load flags"));
        Self {
            store,
            fetcher: Arc::new(MockFetcher::new()),
            features,
            _temp_dir: temp_dir,
        }
    }

    fn resolver(&self) -> ArtworkResolver {
        ArtworkResolver::new(
            Arc::clone(&self.store) as Arc<dyn KvStore>,
            Arc::clone(&self.fetcher) as Arc<dyn PageFetcher>,
        )
    }

    fn open_linkomanija(&self, html: &str, display: DisplayMode) -> Arc<PageAugmenter> {
        let tree = SharedTree::new(parse_document(html, fixtures::linkomanija_base()));
        let config = AugmentConfig {
            display,
            ..AugmentConfig::default()
        };
        PageAugmenter::new(
            tree,
            SiteId::Linkomanija,
            Arc::clone(&self.features),
            self.resolver(),
            &config,
        )
    }
}

fn marker_sources(augmenter: &PageAugmenter) -> Vec<String> {
    let tree = augmenter.tree().lock();
    tree.find_all(tree.root(), |el| el.has_class(MARKER_CLASS))
        .into_iter()
        .filter_map(|m| tree.attr(m, "src").map(str::to_string))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_row_resolved_from_detail_page_content_region() {
    let harness = TestHarness::new();
    let detail = fixtures::linkomanija_detail_url(1);
    harness.fetcher.add_page(
        &detail,
        r#"<html><body><div id="content">
            <img src="/pic/info.png" width="20" height="20">
            <img src="https://img.example/a.jpg" width="300" height="450">
        </div></body></html>"#,
    );

    let augmenter = harness.open_linkomanija(
        &fixtures::linkomanija_listing(&[(1, "A")]),
        DisplayMode::Annotate,
    );
    augmenter.start();
    assert!(augmenter.settle(SETTLE).await);

    assert_eq!(marker_sources(&augmenter), vec!["https://img.example/a.jpg"]);
    assert_eq!(
        harness.store.get_one(&detail).unwrap(),
        Some(serde_json::json!("https://img.example/a.jpg"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_page_load_is_served_from_cache() {
    let harness = TestHarness::new();
    let listing = fixtures::linkomanija_listing(&[(1, "One"), (2, "Two")]);
    for id in [1, 2] {
        harness.fetcher.add_page(
            &fixtures::linkomanija_detail_url(id),
            &fixtures::detail_page(&format!("/posters/{}.jpg", id)),
        );
    }

    let first = harness.open_linkomanija(&listing, DisplayMode::Annotate);
    first.start();
    assert!(first.settle(SETTLE).await);
    first.shutdown();
    assert_eq!(harness.fetcher.fetch_count(), 2);

    let second = harness.open_linkomanija(&listing, DisplayMode::Annotate);
    second.start();
    assert!(second.settle(SETTLE).await);

    assert_eq!(harness.fetcher.fetch_count(), 2);
    assert_eq!(marker_sources(&second), marker_sources(&first));
}

#[tokio::test(start_paused = true)]
async fn test_appended_rows_are_picked_up_by_one_debounced_scan() {
    let harness = TestHarness::new();
    for id in 1..=4 {
        harness.fetcher.add_page(
            &fixtures::linkomanija_detail_url(id),
            &fixtures::detail_page(&format!("/posters/{}.jpg", id)),
        );
    }

    let augmenter = harness.open_linkomanija(
        &fixtures::linkomanija_listing(&[(1, "One")]),
        DisplayMode::Annotate,
    );
    augmenter.start();
    assert!(augmenter.settle(SETTLE).await);
    let scans_before = augmenter.scan_count();

    // Infinite scroll: three rows arrive in quick succession.
    for id in 2..=4 {
        {
            let mut tree = augmenter.tree().lock();
            let table = tree.find_by_id("torrents").unwrap();
            let tr = tree.create_element("tr", Vec::new());
            let td = tree.create_element("td", Vec::new());
            let link = tree.create_element(
                "a",
                vec![("href".to_string(), format!("details.php?id={}", id))],
            );
            let title = tree.create_text(&format!("More {}", id));
            tree.append_child(link, title);
            tree.append_child(td, link);
            tree.append_child(tr, td);
            tree.append_child(table, tr);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert!(augmenter.settle(SETTLE).await);
    assert_eq!(harness.fetcher.fetch_count(), 4);
    assert_eq!(marker_sources(&augmenter).len(), 4);
    // One debounced scan for the burst, one for the annotations it caused.
    assert_eq!(augmenter.scan_count(), scans_before + 2);
}

#[tokio::test(start_paused = true)]
async fn test_feature_toggle_through_store_changes() {
    let harness = TestHarness::new();
    let _watcher = harness.features.watch(harness.store.subscribe());
    harness.fetcher.add_page(
        &fixtures::linkomanija_detail_url(1),
        &fixtures::detail_page("/posters/1.jpg"),
    );

    let augmenter = harness.open_linkomanija(
        &fixtures::linkomanija_listing(&[(1, "One")]),
        DisplayMode::Annotate,
    );
    let pristine = render_document(&augmenter.tree().lock());
    augmenter.start();
    assert!(augmenter.settle(SETTLE).await);
    assert_eq!(marker_sources(&augmenter).len(), 1);

    harness
        .store
        .set_one(&SiteId::Linkomanija.flag_key(), serde_json::json!(false))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!harness.features.is_enabled(SiteId::Linkomanija));
    assert_eq!(render_document(&augmenter.tree().lock()), pristine);

    set_site_enabled(
        harness.store.as_ref(),
        &harness.features,
        SiteId::Linkomanija,
        true,
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(augmenter.settle(SETTLE).await);

    assert_eq!(marker_sources(&augmenter).len(), 1);
    assert_eq!(harness.fetcher.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gallery_mode_end_to_end() {
    let harness = TestHarness::new();
    harness.fetcher.add_page(
        &fixtures::linkomanija_detail_url(1),
        &fixtures::detail_page("/posters/1.jpg"),
    );
    harness
        .fetcher
        .add_failure(&fixtures::linkomanija_detail_url(2), 502);

    let augmenter = harness.open_linkomanija(
        &fixtures::linkomanija_listing(&[(1, "One"), (2, "Two")]),
        DisplayMode::Gallery,
    );
    augmenter.start();
    assert!(augmenter.settle(SETTLE).await);

    let tree = augmenter.tree().lock();
    let cards = read_cards(&tree).unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(
        cards[0].poster.as_deref(),
        Some("https://www.linkomanija.net/posters/1.jpg")
    );
    assert_eq!(cards[1].poster.as_deref(), Some(PLACEHOLDER_POSTER));
    assert_eq!(
        cards[1].download_link.as_deref(),
        Some("https://www.linkomanija.net/download.php?id=2")
    );
}
