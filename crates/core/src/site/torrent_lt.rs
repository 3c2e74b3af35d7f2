//! torrent.lt: artwork is inline on the row link (`data-poster-preview`).

use crate::dom::DocumentTree;

use super::{clean_text, link_containing, read_columns, RowDescriptor};

const NAME_CELL_CLASS: &str = "torrent-name_cell";
const POSTER_ATTR: &str = "data-poster-preview";

pub(super) fn extract(tree: &DocumentTree) -> Vec<RowDescriptor> {
    tree.find_all(tree.root(), |el| el.has_class(NAME_CELL_CLASS))
        .into_iter()
        .filter_map(|cell| {
            let link = tree.find_first(cell, |el| el.name == "a" && el.attr(POSTER_ATTR).is_some())?;
            let href = tree.attr(link, "href")?;

            let inline_poster = tree
                .attr(link, POSTER_ATTR)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| tree.resolve_url(p));

            let row = tree.closest(cell, |el| el.name == "tr");
            let meta = row.map(|r| read_columns(tree, r)).unwrap_or_default();
            let download_link = link_containing(tree, row.unwrap_or(cell), "download");

            Some(RowDescriptor {
                node: cell,
                anchor: cell,
                title: clean_text(tree, link),
                detail_link: tree.resolve_url(href),
                inline_poster,
                size: meta.size,
                seeds: meta.seeds,
                leeches: meta.leeches,
                download_link,
            })
        })
        .collect()
}
