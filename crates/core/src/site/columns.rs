//! Column-position heuristic for size / seeds / leeches.
//!
//! Listing layouts shift their columns when an optional column is present,
//! so the metadata columns are tried in a fixed priority order and the first
//! candidate whose size cell looks like a size wins.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::dom::{DocumentTree, NodeId};

use super::clean_text;

/// Candidate `(size, seeds, leeches)` cell indices, in priority order.
pub const COLUMN_CANDIDATES: [(usize, usize, usize); 2] = [(5, 6, 7), (4, 5, 6)];

static SIZE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d+(\.\d+)?\s*[KMGT]B$").unwrap());

/// Metadata read from a row's cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub size: Option<String>,
    pub seeds: Option<String>,
    pub leeches: Option<String>,
}

/// Whether `text` reads like `1.4 GB`.
pub fn is_size_text(text: &str) -> bool {
    SIZE_PATTERN.is_match(text.trim())
}

/// Read a row's `td` cells. Every field is `None` when no candidate matches.
pub fn read_columns(tree: &DocumentTree, row: NodeId) -> ColumnMetadata {
    let cells: Vec<String> = tree
        .element_children(row)
        .into_iter()
        .filter(|c| tree.is_tag(*c, "td"))
        .map(|c| clean_text(tree, c))
        .collect();

    let field = |i: usize| cells.get(i).filter(|t| !t.is_empty()).cloned();

    COLUMN_CANDIDATES
        .iter()
        .find(|(size, _, _)| cells.get(*size).map(|t| is_size_text(t)).unwrap_or(false))
        .map(|&(size, seeds, leeches)| ColumnMetadata {
            size: field(size),
            seeds: field(seeds),
            leeches: field(leeches),
        })
        .unwrap_or_default()
}
