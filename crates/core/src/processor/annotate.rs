//! In-place row annotation.

use crate::dom::{DocumentTree, NodeId};

/// Class carried by every injected poster image.
pub const MARKER_CLASS: &str = "preview-image";

fn is_marker(el: &crate::dom::ElementData) -> bool {
    el.name == "img" && el.has_class(MARKER_CLASS)
}

/// Whether `node` or any descendant is an annotation marker.
pub fn has_marker(tree: &DocumentTree, node: NodeId) -> bool {
    tree.find_first(node, is_marker).is_some()
}

/// Poster URL of the first marker under `node`.
pub fn marker_src(tree: &DocumentTree, node: NodeId) -> Option<String> {
    tree.find_first(node, is_marker)
        .and_then(|img| tree.attr(img, "src"))
        .map(str::to_string)
}

/// Append a poster image to `anchor`. Does nothing if `anchor` already holds
/// a marker.
pub fn inject(
    tree: &mut DocumentTree,
    anchor: NodeId,
    poster: &str,
    height_px: u32,
) -> Option<NodeId> {
    if has_marker(tree, anchor) || !tree.contains(anchor) {
        return None;
    }
    let img = tree.create_element(
        "img",
        vec![
            ("src".to_string(), poster.to_string()),
            ("class".to_string(), MARKER_CLASS.to_string()),
            (
                "style".to_string(),
                format!("height: {}px; display: block; margin-top: 10px;", height_px),
            ),
        ],
    );
    tree.append_child(anchor, img).then_some(img)
}

/// Remove every marker from the tree.
pub fn remove_all_markers(tree: &mut DocumentTree) -> usize {
    let markers = tree.find_all(tree.root(), is_marker);
    markers.into_iter().filter(|m| tree.remove(*m)).count()
}
