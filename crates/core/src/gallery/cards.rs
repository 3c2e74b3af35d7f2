//! Card model and its DOM form.

use serde::Serialize;

use crate::artwork::PLACEHOLDER_POSTER;
use crate::dom::{DocumentTree, ElementData, NodeId};
use crate::processor::marker_src;
use crate::site::{clean_text, RowDescriptor};

pub const CARD_CLASS: &str = "posterboard-card";
pub const POSTER_CLASS: &str = "posterboard-card-poster";
pub const NO_IMAGE_CLASS: &str = "no-image";
pub const TITLE_CLASS: &str = "posterboard-card-title";
pub const BADGE_CLASS: &str = "posterboard-badge";

const DETAIL_ATTR: &str = "data-detail-link";
pub(super) const DOWNLOAD_ATTR: &str = "data-download-url";
const BADGE_KIND_ATTR: &str = "data-badge";

/// Everything a card shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardSpec {
    pub detail_link: String,
    pub title: String,
    /// `None` renders the "no image" placeholder.
    pub poster: Option<String>,
    pub size: Option<String>,
    pub seeds: Option<String>,
    pub leeches: Option<String>,
    pub download_link: Option<String>,
}

impl CardSpec {
    fn badges(&self) -> Vec<(&'static str, &str)> {
        [
            ("size", self.size.as_deref()),
            ("seeds", self.seeds.as_deref()),
            ("leeches", self.leeches.as_deref()),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.map(|v| (kind, v)))
        .collect()
    }
}

/// Cards for the current rows. A row's poster is its inline artwork or,
/// failing that, the annotation it already carries.
pub fn desired_cards(tree: &DocumentTree, rows: &[RowDescriptor]) -> Vec<CardSpec> {
    rows.iter()
        .filter(|row| !row.title.is_empty())
        .map(|row| CardSpec {
            detail_link: row.detail_link.clone(),
            title: row.title.clone(),
            poster: row
                .inline_poster
                .clone()
                .or_else(|| marker_src(tree, row.node)),
            size: row.size.clone(),
            seeds: row.seeds.clone(),
            leeches: row.leeches.clone(),
            download_link: row.download_link.clone(),
        })
        .collect()
}

fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn poster_attrs(poster: Option<&str>) -> Vec<(String, String)> {
    match poster {
        Some(src) => attrs(&[("class", POSTER_CLASS), ("src", src), ("alt", "")]),
        None => attrs(&[
            ("class", format!("{} {}", POSTER_CLASS, NO_IMAGE_CLASS).as_str()),
            ("src", PLACEHOLDER_POSTER),
            ("alt", "No image"),
        ]),
    }
}

/// Point an existing poster image at `src`.
pub(super) fn set_poster(tree: &mut DocumentTree, img: NodeId, src: &str) {
    tree.set_attr(img, "src", src);
    tree.set_attr(img, "class", POSTER_CLASS);
    tree.set_attr(img, "alt", "");
}

/// Build a detached card.
pub fn build_card(tree: &mut DocumentTree, card: &CardSpec) -> NodeId {
    let mut card_attrs = attrs(&[("class", CARD_CLASS), (DETAIL_ATTR, card.detail_link.as_str())]);
    if let Some(download) = &card.download_link {
        card_attrs.push((DOWNLOAD_ATTR.to_string(), download.clone()));
    }
    let root = tree.create_element("div", card_attrs);

    let link = tree.create_element(
        "a",
        attrs(&[("class", "posterboard-card-link"), ("href", card.detail_link.as_str())]),
    );
    let img = tree.create_element("img", poster_attrs(card.poster.as_deref()));
    tree.append_quiet(link, img);
    tree.append_quiet(root, link);

    let title = tree.create_element("div", attrs(&[("class", TITLE_CLASS)]));
    let title_text = tree.create_text(&card.title);
    tree.append_quiet(title, title_text);
    tree.append_quiet(root, title);

    let badges = card.badges();
    if !badges.is_empty() {
        let container = tree.create_element("div", attrs(&[("class", "posterboard-card-badges")]));
        for (kind, value) in badges {
            let badge = match &card.download_link {
                Some(download) => tree.create_element(
                    "a",
                    attrs(&[
                        ("class", BADGE_CLASS),
                        (BADGE_KIND_ATTR, kind),
                        ("href", download.as_str()),
                        (DOWNLOAD_ATTR, download.as_str()),
                    ]),
                ),
                None => tree.create_element(
                    "span",
                    attrs(&[("class", BADGE_CLASS), (BADGE_KIND_ATTR, kind)]),
                ),
            };
            let text = tree.create_text(value);
            tree.append_quiet(badge, text);
            tree.append_quiet(container, badge);
        }
        tree.append_quiet(root, container);
    }

    root
}

pub(super) fn is_card(el: &ElementData) -> bool {
    el.name == "div" && el.has_class(CARD_CLASS)
}

pub(super) fn is_poster(el: &ElementData) -> bool {
    el.name == "img" && el.has_class(POSTER_CLASS)
}

pub(super) fn card_link(tree: &DocumentTree, card: NodeId) -> Option<&str> {
    tree.attr(card, DETAIL_ATTR)
}

/// Read one rendered card back.
pub fn read_card(tree: &DocumentTree, card: NodeId) -> Option<CardSpec> {
    let detail_link = card_link(tree, card)?.to_string();
    let poster = tree.find_first(card, is_poster).and_then(|img| {
        if tree.has_class(img, NO_IMAGE_CLASS) {
            None
        } else {
            tree.attr(img, "src").map(str::to_string)
        }
    });
    let title = tree
        .find_first(card, |el| el.has_class(TITLE_CLASS))
        .map(|t| clean_text(tree, t))
        .unwrap_or_default();
    let badge = |kind: &str| {
        tree.find_first(card, |el| {
            el.has_class(BADGE_CLASS) && el.attr(BADGE_KIND_ATTR) == Some(kind)
        })
        .map(|b| clean_text(tree, b))
    };

    Some(CardSpec {
        detail_link,
        title,
        poster,
        size: badge("size"),
        seeds: badge("seeds"),
        leeches: badge("leeches"),
        download_link: tree.attr(card, DOWNLOAD_ATTR).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::render_node_html;

    fn spec() -> CardSpec {
        CardSpec {
            detail_link: "https://x/details.php?id=1".to_string(),
            title: "Some Movie".to_string(),
            poster: None,
            size: Some("1.4 GB".to_string()),
            seeds: Some("12".to_string()),
            leeches: None,
            download_link: Some("https://x/download.php?id=1".to_string()),
        }
    }

    #[test]
    fn test_card_reads_back_equal() {
        let mut tree = DocumentTree::new(None);
        let root = tree.root();
        let card = build_card(&mut tree, &spec());
        tree.append_child(root, card);

        assert_eq!(read_card(&tree, card), Some(spec()));

        let with_poster = CardSpec {
            poster: Some("https://img/p.jpg".to_string()),
            download_link: None,
            ..spec()
        };
        let other = build_card(&mut tree, &with_poster);
        assert_eq!(read_card(&tree, other), Some(with_poster));
    }

    #[test]
    fn test_badges_carry_download_target() {
        let mut tree = DocumentTree::new(None);
        let card = build_card(&mut tree, &spec());
        let html = render_node_html(&tree, card);

        assert!(html.contains(r#"data-badge="size""#));
        assert!(html.contains(r#"data-badge="seeds""#));
        assert!(!html.contains(r#"data-badge="leeches""#));
        assert!(html.contains(r#"data-download-url="https://x/download.php?id=1""#));
        assert!(html.contains(NO_IMAGE_CLASS));
    }
}
