//! [`DocumentTree`] -> HTML serialization.

use super::{DocumentTree, NodeId, NodeKind};

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Serialize the whole document, with an HTML5 doctype.
pub fn render_document(tree: &DocumentTree) -> String {
    let mut out = String::from("<!DOCTYPE html>");
    for child in tree.children(tree.root()) {
        render_node(tree, *child, false, &mut out);
    }
    out
}

/// Serialize one node and its subtree.
pub fn render_node_html(tree: &DocumentTree, id: NodeId) -> String {
    let mut out = String::new();
    render_node(tree, id, false, &mut out);
    out
}

fn render_node(tree: &DocumentTree, id: NodeId, raw_text: bool, out: &mut String) {
    match tree.kind(id) {
        Some(NodeKind::Document) => {
            for child in tree.children(id) {
                render_node(tree, *child, false, out);
            }
        }
        Some(NodeKind::Element(el)) => {
            out.push('<');
            out.push_str(&el.name);
            for (k, v) in &el.attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                escape_into(v, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.name.as_str()) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&el.name.as_str());
            for child in tree.children(id) {
                render_node(tree, *child, raw, out);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
        Some(NodeKind::Text(text)) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        Some(NodeKind::Comment(text)) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        None => {}
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
