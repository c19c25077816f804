use std::collections::BTreeMap;
use std::fmt;

use crate::fragment::Fragment;
use crate::mark::MarkSet;
use crate::resolved::{PositionError, ResolvedPos};
use crate::schema::NodeKind;
use crate::slice::Slice;

/// Node attributes (image `src`/`alt` and similar).
pub type Attrs = BTreeMap<String, String>;

/// An immutable document tree node.
///
/// Non-leaf nodes span `content.size() + 2` positions (one for each boundary
/// token), text nodes span one position per `char`, other leaves span one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    kind: NodeKind,
    attrs: Attrs,
    content: Fragment,
    text: Option<String>,
    marks: MarkSet,
    size: usize,
}

impl Node {
    /// A non-leaf node holding `content`.
    pub fn new(kind: NodeKind, attrs: Attrs, content: Fragment) -> Self {
        let size = if kind.is_leaf() {
            1
        } else {
            content.size() + 2
        };
        Self {
            kind,
            attrs,
            content,
            text: None,
            marks: MarkSet::none(),
            size,
        }
    }

    pub fn text(text: impl Into<String>, marks: MarkSet) -> Self {
        let text = text.into();
        let size = text.chars().count();
        Self {
            kind: NodeKind::Text,
            attrs: Attrs::new(),
            content: Fragment::empty(),
            text: Some(text),
            marks,
            size,
        }
    }

    /// An inline leaf such as a hard break or an image.
    pub fn leaf(kind: NodeKind, attrs: Attrs, marks: MarkSet) -> Self {
        Self {
            kind,
            attrs,
            content: Fragment::empty(),
            text: None,
            marks,
            size: 1,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn text_value(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn marks(&self) -> &MarkSet {
        &self.marks
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    pub fn is_inline(&self) -> bool {
        self.kind.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.kind.is_block()
    }

    pub fn is_textblock(&self) -> bool {
        self.kind.is_textblock()
    }

    /// Number of positions this node spans inside its parent.
    pub fn node_size(&self) -> usize {
        self.size
    }

    pub fn content_size(&self) -> usize {
        self.content.size()
    }

    pub fn child_count(&self) -> usize {
        self.content.child_count()
    }

    pub fn child(&self, index: usize) -> &Node {
        self.content.child(index)
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.content.maybe_child(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.content.first_child()
    }

    /// Same kind, attributes and marks.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.kind == other.kind && self.attrs == other.attrs && self.marks == other.marks
    }

    pub fn with_marks(&self, marks: MarkSet) -> Node {
        Node {
            marks,
            ..self.clone()
        }
    }

    /// Same markup, different content.
    pub fn copy(&self, content: Fragment) -> Node {
        let mut node = Node::new(self.kind, self.attrs.clone(), content);
        node.marks = self.marks.clone();
        node
    }

    pub fn with_text(&self, text: impl Into<String>) -> Node {
        Node::text(text, self.marks.clone())
    }

    /// The part of this node between two content offsets.
    pub fn cut(&self, from: usize, to: usize) -> Node {
        match &self.text {
            Some(text) => {
                if from == 0 && to >= self.size {
                    self.clone()
                } else {
                    self.with_text(char_slice(text, from, to))
                }
            }
            None if self.is_leaf() => self.clone(),
            None => self.copy(self.content.cut(from, to)),
        }
    }

    /// All text inside the node, block boundaries ignored.
    pub fn text_content(&self) -> String {
        match &self.text {
            Some(text) => text.clone(),
            None => self.content.text_between(0, self.content.size(), None),
        }
    }

    pub fn text_between(&self, from: usize, to: usize, block_separator: Option<&str>) -> String {
        self.content.text_between(from, to, block_separator)
    }

    /// Calls `f` for each node overlapping `[from, to)` with its absolute start
    /// position. Returning `false` skips the node's children.
    pub fn nodes_between(&self, from: usize, to: usize, f: &mut dyn FnMut(&Node, usize) -> bool) {
        self.content.nodes_between(from, to, f, 0);
    }

    /// The union of marks carried by inline nodes overlapping `[from, to)`.
    pub fn marks_between(&self, from: usize, to: usize) -> MarkSet {
        let mut marks = MarkSet::none();
        self.nodes_between(from, to, &mut |node, _| {
            if node.is_inline() {
                marks = marks.union(node.marks());
            }
            true
        });
        marks
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos<'_>, PositionError> {
        ResolvedPos::resolve(self, pos)
    }

    /// The content between two positions, with the open depths needed to
    /// reinsert it.
    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, PositionError> {
        if from == to {
            return Ok(Slice::empty());
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(from - start, to - start);
        Ok(Slice::new(content, rfrom.depth() - depth, rto.depth() - depth))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut inner = match &self.text {
            Some(text) => format!("{text:?}"),
            None if self.is_leaf() => self.kind.to_string(),
            None if self.content.child_count() == 0 => format!("{}()", self.kind),
            None => format!("{}({})", self.kind, self.content),
        };
        for mark in self.marks.iter().rev() {
            inner = format!("{mark}({inner})");
        }
        f.write_str(&inner)
    }
}

/// Slices a string by `char` offsets, clamping out-of-range bounds.
pub(crate) fn char_slice(text: &str, from: usize, to: usize) -> &str {
    let byte_at = |index: usize| {
        text.char_indices()
            .nth(index)
            .map(|(byte, _)| byte)
            .unwrap_or(text.len())
    };
    let start = byte_at(from);
    let end = byte_at(to.max(from));
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sizes() {
        let d = doc([p([t("abc")]), p([])]);
        assert_eq!(d.content_size(), 7);
        assert_eq!(d.child(0).node_size(), 5);
        assert_eq!(d.child(1).node_size(), 2);
    }

    #[test]
    fn test_text_sizes_count_chars() {
        assert_eq!(t("héllo").node_size(), 5);
    }

    #[test]
    fn test_cut_text_node() {
        let node = em(t("hello"));
        assert_eq!(node.cut(1, 3), em(t("el")));
    }

    #[test]
    fn test_display() {
        let d = doc([p([t("a"), em(t("b")), br()])]);
        assert_eq!(
            d.to_string(),
            r#"doc(paragraph("a", em("b"), hard_break))"#
        );
    }

    #[test]
    fn test_slice_open_depths() {
        let d = doc([p([t("abc")]), p([t("def")])]);
        let slice = d.slice(2, 7).unwrap();
        assert_eq!(slice.open_start(), 1);
        assert_eq!(slice.open_end(), 1);
        assert_eq!(slice.content().to_string(), r#"paragraph("bc"), paragraph("d")"#);
    }

    #[test]
    fn test_marks_between_is_union() {
        let d = doc([p([t("a"), em(t("b")), strong(t("c"))])]);
        let marks = d.marks_between(1, 4);
        assert_eq!(marks.len(), 2);
    }

    #[test]
    fn test_text_between_with_separator() {
        let d = doc([p([t("ab")]), p([t("cd")])]);
        assert_eq!(d.text_between(0, d.content_size(), Some("\n")), "ab\ncd");
        assert_eq!(d.text_between(2, 7, None), "bcd");
    }

    #[test]
    fn test_char_slice_clamps() {
        assert_eq!(char_slice("abc", 1, 10), "bc");
        assert_eq!(char_slice("abc", 5, 2), "");
    }
}
