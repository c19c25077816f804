//! # Surface - The Live Editable Tree
//!
//! An in-memory stand-in for a host's editable element tree. Nodes live in
//! an arena and are addressed by [`SurfaceId`]; removed nodes stay in the
//! arena but are detached from the root, which is how the reconciler tells
//! live content from stale content.
//!
//! Offsets inside text nodes count `char`s, offsets inside elements count
//! child nodes, matching the positions a host reports for its native
//! selection.

use std::collections::BTreeMap;

use crate::markup;

/// Index of a node in a [`Surface`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceData {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct SurfaceNode {
    data: SurfaceData,
    parent: Option<SurfaceId>,
    children: Vec<SurfaceId>,
}

/// A point inside the surface: a node and an offset into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePoint {
    pub node: SurfaceId,
    pub offset: usize,
}

/// The host's native selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSelection {
    pub anchor: SurfacePoint,
    pub head: SurfacePoint,
}

impl SurfaceSelection {
    pub fn caret(point: SurfacePoint) -> Self {
        Self {
            anchor: point,
            head: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }
}

#[derive(Debug, Clone)]
pub struct Surface {
    nodes: Vec<SurfaceNode>,
    root: SurfaceId,
    selection: Option<SurfaceSelection>,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    /// An empty surface with a `div` root.
    pub fn new() -> Self {
        let mut surface = Self {
            nodes: Vec::new(),
            root: SurfaceId(0),
            selection: None,
        };
        surface.root = surface.create_element("div", BTreeMap::new());
        surface
    }

    /// Builds a surface whose root holds the parsed `markup`.
    pub fn from_markup(markup: &str) -> Self {
        let mut surface = Self::new();
        let root = surface.root;
        surface.set_inner_markup(root, markup);
        surface
    }

    pub fn root(&self) -> SurfaceId {
        self.root
    }

    pub fn create_element(&mut self, tag: &str, attrs: BTreeMap<String, String>) -> SurfaceId {
        self.push(SurfaceData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs,
        })
    }

    pub fn create_text(&mut self, text: &str) -> SurfaceId {
        self.push(SurfaceData::Text(text.to_string()))
    }

    fn push(&mut self, data: SurfaceData) -> SurfaceId {
        let id = SurfaceId(self.nodes.len());
        self.nodes.push(SurfaceNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn data(&self, id: SurfaceId) -> &SurfaceData {
        &self.nodes[id.0].data
    }

    pub fn tag(&self, id: SurfaceId) -> Option<&str> {
        match self.data(id) {
            SurfaceData::Element { tag, .. } => Some(tag),
            SurfaceData::Text(_) => None,
        }
    }

    pub fn attr(&self, id: SurfaceId, name: &str) -> Option<&str> {
        match self.data(id) {
            SurfaceData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            SurfaceData::Text(_) => None,
        }
    }

    pub fn text(&self, id: SurfaceId) -> Option<&str> {
        match self.data(id) {
            SurfaceData::Text(text) => Some(text),
            SurfaceData::Element { .. } => None,
        }
    }

    pub fn is_text(&self, id: SurfaceId) -> bool {
        self.text(id).is_some()
    }

    pub fn parent(&self, id: SurfaceId) -> Option<SurfaceId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: SurfaceId) -> &[SurfaceId] {
        &self.nodes[id.0].children
    }

    /// Number of offsets inside a node: chars for text, children for elements.
    pub fn max_offset(&self, id: SurfaceId) -> usize {
        match self.data(id) {
            SurfaceData::Text(text) => text.chars().count(),
            SurfaceData::Element { .. } => self.children(id).len(),
        }
    }

    pub fn index_in_parent(&self, id: SurfaceId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Whether `id` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: SurfaceId, id: SurfaceId) -> bool {
        let mut cur = Some(id);
        while let Some(node) = cur {
            if node == ancestor {
                return true;
            }
            cur = self.parent(node);
        }
        false
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self, id: SurfaceId) -> bool {
        self.contains(self.root, id)
    }

    pub fn append(&mut self, parent: SurfaceId, child: SurfaceId) {
        let index = self.children(parent).len();
        self.insert(parent, index, child);
    }

    /// Inserts `child` at `index` among `parent`'s children, detaching it from
    /// any previous parent first.
    pub fn insert(&mut self, parent: SurfaceId, index: usize, child: SurfaceId) {
        self.remove(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Detaches a node from its parent. The node and its subtree stay
    /// addressable.
    pub fn remove(&mut self, id: SurfaceId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != id);
        }
    }

    pub fn replace(&mut self, old: SurfaceId, new: SurfaceId) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        let index = self.index_in_parent(old).unwrap_or(0);
        self.remove(old);
        self.insert(parent, index, new);
    }

    /// Replaces the value of a text node. Elements are left alone.
    pub fn set_text(&mut self, id: SurfaceId, value: &str) {
        if let SurfaceData::Text(text) = &mut self.nodes[id.0].data {
            *text = value.to_string();
        }
    }

    /// Replaces all children of `id` with nodes parsed from `markup`.
    pub fn set_inner_markup(&mut self, id: SurfaceId, markup: &str) {
        for child in self.children(id).to_vec() {
            self.remove(child);
        }
        markup::load_into(self, id, markup);
    }

    /// Serializes the children of `id` back to markup.
    pub fn inner_markup(&self, id: SurfaceId) -> String {
        markup::serialize_children(self, id)
    }

    pub fn to_markup(&self) -> String {
        self.inner_markup(self.root)
    }

    /// Concatenated text of all text nodes under `id`.
    pub fn text_content(&self, id: SurfaceId) -> String {
        match self.data(id) {
            SurfaceData::Text(text) => text.clone(),
            SurfaceData::Element { .. } => self
                .children(id)
                .iter()
                .map(|&child| self.text_content(child))
                .collect(),
        }
    }

    /// Attached text nodes under `id`, in document order.
    pub fn text_nodes(&self, id: SurfaceId) -> Vec<SurfaceId> {
        let mut out = Vec::new();
        self.collect_text_nodes(id, &mut out);
        out
    }

    fn collect_text_nodes(&self, id: SurfaceId, out: &mut Vec<SurfaceId>) {
        if self.is_text(id) {
            out.push(id);
        }
        for &child in self.children(id) {
            self.collect_text_nodes(child, out);
        }
    }

    /// Finds the first attached text node containing `needle` and returns the
    /// point where the match starts.
    pub fn find_text(&self, needle: &str) -> Option<SurfacePoint> {
        self.text_nodes(self.root).into_iter().find_map(|node| {
            let text = self.text(node)?;
            let byte = text.find(needle)?;
            Some(SurfacePoint {
                node,
                offset: text[..byte].chars().count(),
            })
        })
    }

    pub fn selection(&self) -> Option<SurfaceSelection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<SurfaceSelection>) {
        self.selection = selection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_and_serialize() {
        let surface = Surface::from_markup("<p>a<em>b</em></p><p><br></p>");
        assert_eq!(surface.to_markup(), "<p>a<em>b</em></p><p><br></p>");
        assert_eq!(surface.children(surface.root()).len(), 2);
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut surface = Surface::from_markup("<p>hello</p>");
        let p = surface.children(surface.root())[0];
        let text = surface.children(p)[0];
        assert!(surface.is_attached(text));
        surface.remove(p);
        assert!(!surface.is_attached(text));
        assert_eq!(surface.text(text), Some("hello"));
    }

    #[test]
    fn test_insert_moves_node() {
        let mut surface = Surface::from_markup("<p>a</p><p>b</p>");
        let root = surface.root();
        let first = surface.children(root)[0];
        surface.append(root, first);
        assert_eq!(surface.to_markup(), "<p>b</p><p>a</p>");
    }

    #[test]
    fn test_find_text_counts_chars() {
        let surface = Surface::from_markup("<p>héllo</p>");
        let point = surface.find_text("llo").unwrap();
        assert_eq!(point.offset, 2);
    }

    #[test]
    fn test_replace_and_set_text() {
        let mut surface = Surface::from_markup("<p>abc</p>");
        let p = surface.children(surface.root())[0];
        let text = surface.children(p)[0];
        surface.set_text(text, "xyz");
        let b = surface.create_element("b", BTreeMap::new());
        let inner = surface.create_text("!");
        surface.append(b, inner);
        surface.replace(p, b);
        assert_eq!(surface.to_markup(), "<b>!</b>");
        assert_eq!(surface.text_content(p), "xyz");
    }
}
