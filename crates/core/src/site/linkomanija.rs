//! linkomanija.net: artwork lives on the detail page.

use crate::dom::{DocumentTree, NodeId};

use super::{clean_text, link_containing, read_columns, RowDescriptor};

/// Listing rows: `#content form[action="browse.php"] > table tr`, falling
/// back to every `#content table tr`.
fn listing_rows(tree: &DocumentTree) -> Vec<NodeId> {
    let Some(content) = tree.find_by_id("content") else {
        return Vec::new();
    };

    let is_row = |el: &crate::dom::ElementData| el.name == "tr";

    let browse_rows: Vec<NodeId> = tree
        .find_all(content, |el| el.name == "form" && el.attr("action") == Some("browse.php"))
        .into_iter()
        .flat_map(|form| {
            tree.element_children(form)
                .into_iter()
                .filter(|c| tree.is_tag(*c, "table"))
                .collect::<Vec<_>>()
        })
        .flat_map(|table| tree.find_all(table, is_row))
        .collect();
    if !browse_rows.is_empty() {
        return browse_rows;
    }

    let mut rows: Vec<NodeId> = tree
        .find_all(content, |el| el.name == "table")
        .into_iter()
        .flat_map(|table| tree.find_all(table, is_row))
        .collect();
    // Nested tables visit inner rows twice.
    let mut seen = std::collections::HashSet::new();
    rows.retain(|r| seen.insert(*r));
    rows
}

pub(super) fn extract(tree: &DocumentTree) -> Vec<RowDescriptor> {
    listing_rows(tree)
        .into_iter()
        .filter_map(|row| {
            let link = tree.find_first(row, |el| {
                el.name == "a" && el.attr("href").map(|h| h.contains("details")).unwrap_or(false)
            })?;
            let href = tree.attr(link, "href")?;
            let meta = read_columns(tree, row);

            Some(RowDescriptor {
                node: row,
                anchor: link,
                title: clean_text(tree, link),
                detail_link: tree.resolve_url(href),
                inline_poster: None,
                size: meta.size,
                seeds: meta.seeds,
                leeches: meta.leeches,
                download_link: link_containing(tree, row, "download"),
            })
        })
        .collect()
}
