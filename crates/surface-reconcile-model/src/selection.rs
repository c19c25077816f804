use std::fmt;

use crate::node::Node;

/// A text selection as an anchor/head pair of document positions.
///
/// `anchor` is the fixed side, `head` the side that moves when the selection
/// is extended. Both may lie in either order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn caret(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Both ends point inside the document and into inline content.
    pub fn is_valid_in(&self, doc: &Node) -> bool {
        [self.anchor, self.head].into_iter().all(|pos| {
            doc.resolve(pos)
                .is_ok_and(|resolved| resolved.parent().is_textblock())
        })
    }

    /// Caret at the first position inside a textblock, or at 0 when the
    /// document has none.
    pub fn at_start(doc: &Node) -> Self {
        Self::caret(first_textblock_pos(doc, 0).unwrap_or(0))
    }
}

/// The first position at or after `from` whose parent is a textblock.
pub fn first_textblock_pos(doc: &Node, from: usize) -> Option<usize> {
    if doc.resolve(from).ok()?.parent().is_textblock() {
        return Some(from);
    }
    let mut found = None;
    doc.nodes_between(from, doc.content_size(), &mut |node, pos| {
        if found.is_some() {
            return false;
        }
        if node.is_textblock() && pos + 1 >= from {
            found = Some(pos + 1);
            return false;
        }
        true
    });
    found
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "caret({})", self.head)
        } else {
            write!(f, "text({}, {})", self.anchor, self.head)
        }
    }
}
