//! Site adapters.
//!
//! Each supported index site gets a pure extraction function that reads the
//! current document tree and produces one [`RowDescriptor`] per listing row.
//! Extraction never mutates the tree. Rows that lack a required link are
//! skipped silently.

mod columns;
mod linkomanija;
mod torrent_lt;

pub use columns::{is_size_text, read_columns, ColumnMetadata, COLUMN_CANDIDATES};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dom::{DocumentTree, NodeId};

/// The fixed set of supported sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteId {
    TorrentLt,
    Linkomanija,
}

impl SiteId {
    pub const ALL: [SiteId; 2] = [SiteId::TorrentLt, SiteId::Linkomanija];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteId::TorrentLt => "torrent_lt",
            SiteId::Linkomanija => "linkomanija",
        }
    }

    /// Durable store key of this site's feature flag.
    pub fn flag_key(&self) -> String {
        format!("feature.{}", self.as_str())
    }

    /// Site serving the given host name, if supported.
    pub fn for_host(host: &str) -> Option<SiteId> {
        let host = host.to_ascii_lowercase();
        if host.contains("torrent.lt") {
            Some(SiteId::TorrentLt)
        } else if host.contains("linkomanija.net") {
            Some(SiteId::Linkomanija)
        } else {
            None
        }
    }

    /// Inverse of [`SiteId::flag_key`].
    pub fn from_flag_key(key: &str) -> Option<SiteId> {
        key.strip_prefix("feature.").and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "torrent_lt" => Ok(SiteId::TorrentLt),
            "linkomanija" => Ok(SiteId::Linkomanija),
            other => Err(format!("Unknown site: {}", other)),
        }
    }
}

/// One torrent listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDescriptor {
    /// Row identity: the node claims and markers are tracked against.
    pub node: NodeId,
    /// Where the annotation image is appended.
    pub anchor: NodeId,
    pub title: String,
    /// Absolute detail page URL; the artwork cache key.
    pub detail_link: String,
    pub inline_poster: Option<String>,
    pub size: Option<String>,
    pub seeds: Option<String>,
    pub leeches: Option<String>,
    pub download_link: Option<String>,
}

/// Extract listing rows for `site`, in document order.
pub fn extract(tree: &DocumentTree, site: SiteId) -> Vec<RowDescriptor> {
    match site {
        SiteId::TorrentLt => torrent_lt::extract(tree),
        SiteId::Linkomanija => linkomanija::extract(tree),
    }
}

/// First link under `scope` whose `href` contains `needle`, resolved.
pub(crate) fn link_containing(tree: &DocumentTree, scope: NodeId, needle: &str) -> Option<String> {
    tree.find_first(scope, |el| {
        el.name == "a" && el.attr("href").map(|h| h.contains(needle)).unwrap_or(false)
    })
    .and_then(|a| tree.attr(a, "href"))
    .map(|href| tree.resolve_url(href))
}

/// Normalized visible text of a node.
pub(crate) fn clean_text(tree: &DocumentTree, node: NodeId) -> String {
    tree.text(node).split_whitespace().collect::<Vec<_>>().join(" ")
}
