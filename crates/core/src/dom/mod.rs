//! Live document tree.
//!
//! The augmentation pipeline works against a mutable, continuously changing
//! page. `DocumentTree` models that page as an arena of nodes addressed by
//! stable [`NodeId`] handles. A handle never owns its node: once a node is
//! removed its slot is freed and every lookup through the handle fails, which
//! is what lets claim bookkeeping key on node identity without pinning removed
//! nodes in memory.
//!
//! Child-list mutations (append, insert-before, remove) are published on a
//! broadcast channel as [`MutationBatch`]es. Attribute changes are not
//! published.

mod parse;
mod render;

pub use parse::parse_document;
pub use render::{render_document, render_node_html};

use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Url;
use tokio::sync::broadcast;

/// Capacity of the mutation notification channel.
const MUTATION_CHANNEL_CAPACITY: usize = 256;

/// Non-owning handle to a node in a [`DocumentTree`].
///
/// Slots of removed nodes are reused; the generation keeps a handle to a
/// removed node from ever resolving to the node that took its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Element name and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct NodeSlot {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct ArenaEntry {
    generation: u32,
    node: Option<NodeSlot>,
}

/// One child-list change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Mutable document tree with mutation notifications.
#[derive(Debug)]
pub struct DocumentTree {
    nodes: Vec<ArenaEntry>,
    /// Indices of vacant entries, reused before the arena grows.
    free: Vec<usize>,
    root: NodeId,
    url: Option<Url>,
    mutations: broadcast::Sender<MutationBatch>,
}

impl DocumentTree {
    /// Create an empty document, optionally anchored at the page URL.
    pub fn new(url: Option<Url>) -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        Self {
            nodes: vec![ArenaEntry {
                generation: 0,
                node: Some(NodeSlot {
                    kind: NodeKind::Document,
                    parent: None,
                    children: Vec::new(),
                }),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            url,
            mutations,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// URL of the page this tree was loaded from.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Resolve an attribute URL against the page URL. Unresolvable values are
    /// returned unchanged.
    pub fn resolve_url(&self, href: &str) -> String {
        match &self.url {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }

    /// Subscribe to child-list mutations of this tree.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationBatch> {
        self.mutations.subscribe()
    }

    fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        self.nodes
            .get(id.index)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.node.as_ref())
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.nodes
            .get_mut(id.index)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.node.as_mut())
    }

    /// Whether the node still exists (it may be detached).
    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    /// Whether the node exists and is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.slot(node).and_then(|s| s.parent);
        }
        false
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.slot(id).map(|s| &s.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.slot_mut(id).map(|s| &mut s.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    /// Lowercase tag name, `None` for non-elements.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id).map(|t| t.eq_ignore_ascii_case(tag)).unwrap_or(false)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).map(|el| el.has_class(class)).unwrap_or(false)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).and_then(|s| s.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot(id).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    /// Element children only, in order.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    /// All descendants in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Element descendants matching `pred`, in document order.
    pub fn find_all<F>(&self, id: NodeId, pred: F) -> Vec<NodeId>
    where
        F: Fn(&ElementData) -> bool,
    {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.element(*n).map(&pred).unwrap_or(false))
            .collect()
    }

    /// First element descendant matching `pred`.
    pub fn find_first<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&ElementData) -> bool,
    {
        self.descendants(id)
            .into_iter()
            .find(|n| self.element(*n).map(&pred).unwrap_or(false))
    }

    /// Element with the given `id` attribute.
    pub fn find_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.find_first(self.root, |el| el.attr("id") == Some(element_id))
    }

    /// Nearest ancestor (excluding `id`) that matches `pred`.
    pub fn closest<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&ElementData) -> bool,
    {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.element(node).map(&pred).unwrap_or(false) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Concatenated text content of the node and its descendants.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeKind::Text(t)) = self.kind(id) {
            out.push_str(t);
        }
        for node in self.descendants(id) {
            if let Some(NodeKind::Text(t)) = self.kind(node) {
                out.push_str(t);
            }
        }
        out
    }

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let node = Some(NodeSlot {
            kind,
            parent: None,
            children: Vec::new(),
        });
        if let Some(index) = self.free.pop() {
            let entry = &mut self.nodes[index];
            entry.node = node;
            return NodeId {
                index,
                generation: entry.generation,
            };
        }
        self.nodes.push(ArenaEntry {
            generation: 0,
            node,
        });
        NodeId {
            index: self.nodes.len() - 1,
            generation: 0,
        }
    }

    /// Create a detached element. Attribute names are lowercased.
    pub fn create_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> NodeId {
        let attrs = attrs
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        self.allocate(NodeKind::Element(ElementData {
            name: name.to_ascii_lowercase(),
            attrs,
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.allocate(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.allocate(NodeKind::Comment(text.to_string()))
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let Some(slot) = self.slot_mut(parent) {
                slot.children.retain(|c| *c != id);
            }
        }
        if let Some(slot) = self.slot_mut(id) {
            slot.parent = None;
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) -> bool {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return false;
        }
        self.detach(child);
        let Some(slot) = self.slot_mut(parent) else {
            return false;
        };
        match index {
            Some(i) if i <= slot.children.len() => slot.children.insert(i, child),
            _ => slot.children.push(child),
        }
        if let Some(slot) = self.slot_mut(child) {
            slot.parent = Some(parent);
        }
        true
    }

    fn publish(&self, batch: MutationBatch) {
        // Err only means nobody is listening.
        let _ = self.mutations.send(batch);
    }

    /// Append without publishing a mutation. Used while building a tree.
    pub(crate) fn append_quiet(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.link(parent, child, None)
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let linked = self.link(parent, child, None);
        if linked {
            self.publish(MutationBatch {
                added: vec![child],
                removed: Vec::new(),
            });
        }
        linked
    }

    /// Insert `child` immediately before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        self.detach(child);
        let index = self.children(parent).iter().position(|c| *c == reference);
        let linked = self.link(parent, child, index);
        if linked {
            self.publish(MutationBatch {
                added: vec![child],
                removed: Vec::new(),
            });
        }
        linked
    }

    /// Remove a node and free its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        let was_attached = self.parent(id).is_some();
        self.detach(id);
        let mut freed = self.descendants(id);
        freed.push(id);
        for node in freed {
            if let Some(entry) = self.nodes.get_mut(node.index) {
                if entry.generation == node.generation && entry.node.is_some() {
                    entry.node = None;
                    entry.generation = entry.generation.wrapping_add(1);
                    self.free.push(node.index);
                }
            }
        }
        if was_attached {
            self.publish(MutationBatch {
                added: Vec::new(),
                removed: vec![id],
            });
        }
        true
    }

    /// Set (or replace) an attribute.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            let name = name.to_ascii_lowercase();
            match el.attrs.iter_mut().find(|(k, _)| *k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attrs.push((name, value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }
}

/// A document tree shared between the scanner and in-flight resolutions.
#[derive(Debug, Clone)]
pub struct SharedTree(Arc<Mutex<DocumentTree>>);

impl SharedTree {
    pub fn new(tree: DocumentTree) -> Self {
        Self(Arc::new(Mutex::new(tree)))
    }

    /// Lock the tree. A poisoned lock is recovered; the tree holds no
    /// invariants that a panicking reader could break.
    pub fn lock(&self) -> MutexGuard<'_, DocumentTree> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}
