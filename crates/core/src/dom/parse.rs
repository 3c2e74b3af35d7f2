//! HTML -> [`DocumentTree`] conversion.

use reqwest::Url;
use scraper::{Html, Node};

use super::DocumentTree;

/// Parse an HTML document into a live tree.
///
/// Doctype and processing-instruction nodes are dropped. Building the tree
/// publishes no mutations.
pub fn parse_document(html: &str, url: Option<Url>) -> DocumentTree {
    let parsed = Html::parse_document(html);
    let mut tree = DocumentTree::new(url);

    let mut stack = vec![(parsed.tree.root(), tree.root())];
    while let Some((node, parent)) = stack.pop() {
        for child in node.children() {
            let id = match child.value() {
                Node::Element(el) => tree.create_element(
                    el.name(),
                    el.attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                Node::Text(text) => tree.create_text(text),
                Node::Comment(comment) => tree.create_comment(comment),
                _ => continue,
            };
            tree.append_quiet(parent, id);
            stack.push((child, id));
        }
    }

    tree
}
