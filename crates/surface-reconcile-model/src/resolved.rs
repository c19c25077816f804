use thiserror::Error;

use crate::mark::MarkSet;
use crate::node::Node;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("position {pos} outside of document content (size {size})")]
    OutOfRange { pos: usize, size: usize },
}

#[derive(Debug, Clone, Copy)]
struct Step<'a> {
    node: &'a Node,
    index: usize,
    /// Absolute position where the child at `index` starts.
    offset: usize,
}

/// A position resolved against one immutable document snapshot.
///
/// Holds the full ancestor path as `(node, index, offset)` triples borrowed
/// from the snapshot, so depth-based queries are plain index lookups.
#[derive(Debug, Clone)]
pub struct ResolvedPos<'a> {
    pos: usize,
    path: Vec<Step<'a>>,
    parent_offset: usize,
}

impl<'a> ResolvedPos<'a> {
    pub(crate) fn resolve(doc: &'a Node, pos: usize) -> Result<Self, PositionError> {
        if pos > doc.content_size() {
            return Err(PositionError::OutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc;
        loop {
            let (index, offset) = node.content().find_index(parent_offset);
            let rem = parent_offset - offset;
            path.push(Step {
                node,
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            node = node.child(index);
            if node.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
        }
        Ok(Self {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// The ancestor node at `depth` (0 is the document).
    pub fn node(&self, depth: usize) -> &'a Node {
        self.path[depth].node
    }

    pub fn parent(&self) -> &'a Node {
        self.node(self.depth())
    }

    pub fn doc(&self) -> &'a Node {
        self.node(0)
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    /// Index pointing after this position in the ancestor at `depth`.
    pub fn index_after(&self, depth: usize) -> usize {
        let index = self.index(depth);
        if depth == self.depth() && self.text_offset() == 0 {
            index
        } else {
            index + 1
        }
    }

    /// Offset into the parent node's content.
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// Absolute position where the content of the ancestor at `depth` starts.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position directly before the ancestor at `depth`. Depths past the
    /// parent collapse onto the position itself.
    pub fn before(&self, depth: usize) -> usize {
        if depth == 0 {
            return 0;
        }
        if depth > self.depth() {
            self.pos
        } else {
            self.path[depth - 1].offset
        }
    }

    /// Position directly after the ancestor at `depth`.
    pub fn after(&self, depth: usize) -> usize {
        if depth == 0 {
            return self.doc().content_size();
        }
        if depth > self.depth() {
            self.pos
        } else {
            self.path[depth - 1].offset + self.node(depth).node_size()
        }
    }

    /// Offset into the text node the position points into, 0 when it sits
    /// between nodes.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.maybe_child(index)?;
        let offset = self.text_offset();
        if offset > 0 {
            Some(child.cut(offset, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let offset = self.text_offset();
        if offset > 0 {
            return Some(parent.child(index).cut(0, offset));
        }
        if index == 0 {
            None
        } else {
            parent.maybe_child(index - 1).cloned()
        }
    }

    /// Deepest depth whose node contains both this position and `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|&depth| self.start(depth) <= pos && self.end(depth) >= pos)
            .unwrap_or(0)
    }

    pub fn same_parent(&self, other: &ResolvedPos<'_>) -> bool {
        self.pos - self.parent_offset == other.pos - other.parent_offset
    }

    /// Marks that text inserted at this position would inherit.
    pub fn marks(&self) -> MarkSet {
        let parent = self.parent();
        let index = self.index(self.depth());
        if parent.content_size() == 0 {
            return MarkSet::none();
        }
        if self.text_offset() > 0 {
            return parent.child(index).marks().clone();
        }
        let before = index.checked_sub(1).and_then(|i| parent.maybe_child(i));
        let after = parent.maybe_child(index);
        let (main, other) = match before {
            Some(before) => (Some(before), after),
            None => (after, None),
        };
        let Some(main) = main else {
            return MarkSet::none();
        };
        drop_non_inclusive(main.marks(), other.map(Node::marks))
    }

    /// Marks of the node after this position that survive up to `end`.
    pub fn marks_across(&self, end: &ResolvedPos<'_>) -> Option<MarkSet> {
        let after = self.parent().maybe_child(self.index(self.depth()))?;
        if !after.is_inline() {
            return None;
        }
        let next = end.parent().maybe_child(end.index(end.depth()));
        Some(drop_non_inclusive(after.marks(), next.map(Node::marks)))
    }
}

/// Drops non-inclusive marks that do not continue into `next`.
pub(crate) fn drop_non_inclusive(marks: &MarkSet, next: Option<&MarkSet>) -> MarkSet {
    MarkSet::from_marks(
        marks
            .iter()
            .filter(|mark| mark.inclusive() || next.is_some_and(|next| mark.is_in(next)))
            .cloned(),
    )
}
