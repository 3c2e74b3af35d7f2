//! Gallery projection.
//!
//! In gallery mode the listing is shown as a grid of poster cards inside a
//! single container (`#posterboard-gallery`) inserted right before the
//! primary listing table, which is hidden while the gallery is visible.
//!
//! Projection is idempotent: when the cards already in the tree equal the
//! cards the current rows call for, nothing is touched, so the mutations a
//! rebuild causes settle after one extra scan. Newly resolved artwork is
//! patched into its card in place; when the card cannot be found a full
//! rebuild is debounced instead.

mod cards;

pub use cards::{build_card, desired_cards, read_card, CardSpec, BADGE_CLASS, CARD_CLASS};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::debounce::DebouncedTrigger;
use crate::dom::{DocumentTree, NodeId, SharedTree};
use crate::features::FeatureState;
use crate::metrics::GALLERY_UPDATES;
use crate::site::{self, RowDescriptor, SiteId};

use cards::{card_link, is_card, is_poster, set_poster, DOWNLOAD_ATTR};

/// Well-known id of the gallery container.
pub const GALLERY_ID: &str = "posterboard-gallery";

/// Marks the listing table the gallery stands in for.
const LISTING_ATTR: &str = "data-posterboard-listing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectOutcome {
    Unchanged,
    Rebuilt,
    /// No listing table to anchor a gallery to.
    NoListing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOutcome {
    Patched,
    RebuildScheduled,
    /// No gallery in the tree.
    Inactive,
}

/// The gallery container, if present.
pub fn gallery_node(tree: &DocumentTree) -> Option<NodeId> {
    tree.find_by_id(GALLERY_ID)
}

/// Cards currently rendered, in order.
pub fn read_cards(tree: &DocumentTree) -> Option<Vec<CardSpec>> {
    let gallery = gallery_node(tree)?;
    Some(
        tree.element_children(gallery)
            .into_iter()
            .filter_map(|card| read_card(tree, card))
            .collect(),
    )
}

fn listing_table(tree: &DocumentTree, rows: &[RowDescriptor]) -> Option<NodeId> {
    tree.find_first(tree.root(), |el| el.attr(LISTING_ATTR).is_some())
        .or_else(|| {
            rows.first()
                .and_then(|row| tree.closest(row.node, |el| el.name == "table"))
        })
}

/// Render `rows` as the gallery, replacing any stale one.
pub fn project(tree: &mut DocumentTree, rows: &[RowDescriptor]) -> ProjectOutcome {
    let cards = desired_cards(tree, rows);
    let existing = gallery_node(tree);

    if existing.is_some() && read_cards(tree).as_ref() == Some(&cards) {
        set_visible(tree, true);
        return ProjectOutcome::Unchanged;
    }

    let Some(listing) = listing_table(tree, rows) else {
        return ProjectOutcome::NoListing;
    };

    if let Some(stale) = existing {
        tree.remove(stale);
    }

    let gallery = tree.create_element(
        "div",
        vec![
            ("id".to_string(), GALLERY_ID.to_string()),
            ("class".to_string(), "posterboard-gallery".to_string()),
        ],
    );
    for card in &cards {
        let node = build_card(tree, card);
        tree.append_quiet(gallery, node);
    }
    tree.insert_before(listing, gallery);
    tree.set_attr(listing, LISTING_ATTR, "");
    set_visible(tree, true);

    debug!("Gallery rebuilt with {} cards", cards.len());
    ProjectOutcome::Rebuilt
}

/// Show the gallery and hide the listing, or the other way round.
pub fn set_visible(tree: &mut DocumentTree, visible: bool) {
    let Some(gallery) = gallery_node(tree) else {
        return;
    };
    let listing = tree.find_first(tree.root(), |el| el.attr(LISTING_ATTR).is_some());

    if visible {
        tree.remove_attr(gallery, "hidden");
        if let Some(listing) = listing {
            tree.set_attr(listing, "hidden", "");
        }
    } else {
        tree.set_attr(gallery, "hidden", "");
        if let Some(listing) = listing {
            tree.remove_attr(listing, "hidden");
        }
    }
}

/// Download target of a click on `node`, if it is (inside) a badge.
pub fn activate(tree: &DocumentTree, node: NodeId) -> Option<String> {
    let is_badge = |el: &crate::dom::ElementData| el.has_class(BADGE_CLASS);
    let badge = if tree.element(node).map(is_badge).unwrap_or(false) {
        Some(node)
    } else {
        tree.closest(node, is_badge)
    }?;
    tree.attr(badge, DOWNLOAD_ATTR).map(str::to_string)
}

/// Gallery projector for one page, with its own rebuild timer.
pub struct GalleryProjector {
    rebuild: DebouncedTrigger,
}

impl std::fmt::Debug for GalleryProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryProjector")
            .field("rebuild", &self.rebuild)
            .finish()
    }
}

impl GalleryProjector {
    pub fn new(
        tree: SharedTree,
        site: SiteId,
        features: Arc<FeatureState>,
        window: Duration,
    ) -> Self {
        let rebuild = DebouncedTrigger::new(window, move || {
            if !features.is_enabled(site) {
                return;
            }
            let mut tree = tree.lock();
            let rows = site::extract(&tree, site);
            if project(&mut tree, &rows) == ProjectOutcome::Rebuilt {
                GALLERY_UPDATES.with_label_values(&["rebuilt"]).inc();
                info!("Gallery rebuilt after drift");
            }
        });
        Self { rebuild }
    }

    /// Project after a scan.
    pub fn project(&self, tree: &mut DocumentTree, rows: &[RowDescriptor]) -> ProjectOutcome {
        let outcome = project(tree, rows);
        if outcome == ProjectOutcome::Rebuilt {
            GALLERY_UPDATES.with_label_values(&["rebuilt"]).inc();
        }
        outcome
    }

    /// Put freshly resolved artwork into the card for `detail_link`.
    pub fn patch(&self, tree: &mut DocumentTree, detail_link: &str, poster: &str) -> PatchOutcome {
        let Some(gallery) = gallery_node(tree) else {
            return PatchOutcome::Inactive;
        };

        let posters: Vec<NodeId> = tree
            .find_all(gallery, is_card)
            .into_iter()
            .filter(|card| card_link(tree, *card) == Some(detail_link))
            .filter_map(|card| tree.find_first(card, is_poster))
            .collect();

        if posters.is_empty() {
            debug!("No card for {}, scheduling gallery rebuild", detail_link);
            self.rebuild.arm();
            GALLERY_UPDATES
                .with_label_values(&["rebuild_scheduled"])
                .inc();
            return PatchOutcome::RebuildScheduled;
        }

        for img in posters {
            set_poster(tree, img, poster);
        }
        GALLERY_UPDATES.with_label_values(&["patched"]).inc();
        PatchOutcome::Patched
    }

    pub fn set_visible(&self, tree: &mut DocumentTree, visible: bool) {
        set_visible(tree, visible);
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild.is_pending()
    }

    pub fn cancel_rebuild(&self) {
        self.rebuild.cancel();
    }
}

impl Drop for GalleryProjector {
    fn drop(&mut self) {
        self.rebuild.cancel();
    }
}
