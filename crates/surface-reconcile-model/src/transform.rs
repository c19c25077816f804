//! Edit operations and the transaction that applies them.
//!
//! A [`Transaction`] works on its own copy of the document. Each applied
//! [`EditOp`] either succeeds and records a [`StepMap`] for selection mapping,
//! or fails and leaves the working document as it was before that op. Callers
//! that need all-or-nothing semantics drop the transaction on the first
//! error; the source snapshot is never touched.

use std::fmt;

use thiserror::Error;

use crate::fragment::Fragment;
use crate::mark::{Mark, MarkSet};
use crate::node::Node;
use crate::replace::ReplaceError;
use crate::resolved::PositionError;
use crate::selection::{Selection, first_textblock_pos};
use crate::slice::Slice;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("invalid range {from}..{to}")]
    InvalidRange { from: usize, to: usize },
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error("replace failed: {0}")]
    Replace(#[from] ReplaceError),
}

/// One document edit in model coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    ReplaceRange { from: usize, to: usize, slice: Slice },
    InsertText { text: String, from: usize, to: usize },
    AddMark { from: usize, to: usize, mark: Mark },
    RemoveMark { from: usize, to: usize, mark: Mark },
    SetSelection(Selection),
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOp::ReplaceRange { from, to, slice } => {
                write!(f, "replace({from}, {to}, {slice})")
            }
            EditOp::InsertText { text, from, to } => {
                write!(f, "insert_text({text:?}, {from}, {to})")
            }
            EditOp::AddMark { from, to, mark } => write!(f, "add_mark({from}, {to}, {mark})"),
            EditOp::RemoveMark { from, to, mark } => {
                write!(f, "remove_mark({from}, {to}, {mark})")
            }
            EditOp::SetSelection(selection) => write!(f, "set_selection({selection})"),
        }
    }
}

/// Position mapping for one applied step: `old_size` positions starting at
/// `start` were replaced by `new_size` positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMap {
    start: usize,
    old_size: usize,
    new_size: usize,
}

/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

impl StepMap {
    pub fn new(start: usize, old_size: usize, new_size: usize) -> Self {
        Self {
            start,
            old_size,
            new_size,
        }
    }

    pub fn identity() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        let end = self.start + self.old_size;
        if pos < self.start {
            return pos;
        }
        if pos > end {
            return pos + self.new_size - self.old_size;
        }
        let side = if self.old_size == 0 {
            assoc
        } else if pos == self.start {
            Assoc::Before
        } else if pos == end {
            Assoc::After
        } else {
            assoc
        };
        match side {
            Assoc::Before => self.start,
            Assoc::After => self.start + self.new_size,
        }
    }
}

/// A sequence of edits applied to a working copy of one document version.
#[derive(Debug, Clone)]
pub struct Transaction {
    base_version: u64,
    doc: Node,
    selection: Selection,
    selection_set: bool,
    stored_marks: Option<MarkSet>,
    stored_marks_set: bool,
    scroll_into_view: bool,
    ops: Vec<EditOp>,
    maps: Vec<StepMap>,
}

impl Transaction {
    pub fn new(
        doc: &Node,
        selection: Selection,
        stored_marks: Option<MarkSet>,
        base_version: u64,
    ) -> Self {
        Self {
            base_version,
            doc: doc.clone(),
            selection,
            selection_set: false,
            stored_marks,
            stored_marks_set: false,
            scroll_into_view: false,
            ops: Vec::new(),
            maps: Vec::new(),
        }
    }

    /// Applies `op`; on error nothing changes.
    pub fn apply(&mut self, op: EditOp) -> Result<&mut Self, TransformError> {
        match &op {
            EditOp::ReplaceRange { from, to, slice } => self.replace(*from, *to, slice)?,
            EditOp::InsertText { text, from, to } => self.insert_text(text, *from, *to)?,
            EditOp::AddMark { from, to, mark } => {
                self.map_marks(*from, *to, |marks| mark.add_to(marks))?
            }
            EditOp::RemoveMark { from, to, mark } => {
                self.map_marks(*from, *to, |marks| mark.remove_from(marks))?
            }
            EditOp::SetSelection(selection) => {
                self.doc.resolve(selection.anchor)?;
                self.doc.resolve(selection.head)?;
                self.selection = *selection;
                self.selection_set = true;
            }
        }
        self.ops.push(op);
        Ok(self)
    }

    fn replace(&mut self, from: usize, to: usize, slice: &Slice) -> Result<(), TransformError> {
        if from > to {
            return Err(TransformError::InvalidRange { from, to });
        }
        let doc = self.doc.replace(from, to, slice)?;
        self.commit(doc, StepMap::new(from, to - from, slice.size()));
        Ok(())
    }

    fn insert_text(&mut self, text: &str, from: usize, to: usize) -> Result<(), TransformError> {
        if text.is_empty() {
            return self.replace(from, to, &Slice::empty());
        }
        let rfrom = self.doc.resolve(from)?;
        let marks = if !rfrom.parent().kind().allows_marks() {
            MarkSet::none()
        } else if let Some(stored) = &self.stored_marks {
            stored.clone()
        } else if from == to {
            rfrom.marks()
        } else {
            let rto = self.doc.resolve(to)?;
            rfrom.marks_across(&rto).unwrap_or_default()
        };
        let slice = Slice::closed(Fragment::from_nodes([Node::text(text, marks)]));
        let was_range = !self.selection.is_empty();
        self.replace(from, to, &slice)?;
        if was_range {
            self.selection = Selection::caret(self.selection.to());
        }
        Ok(())
    }

    fn map_marks(
        &mut self,
        from: usize,
        to: usize,
        f: impl Fn(&MarkSet) -> MarkSet,
    ) -> Result<(), TransformError> {
        if from > to || to > self.doc.content_size() {
            return Err(TransformError::InvalidRange { from, to });
        }
        let content = map_inline_marks(
            self.doc.content(),
            from,
            to,
            self.doc.kind().allows_marks(),
            &f,
        );
        let doc = self.doc.copy(content);
        self.commit(doc, StepMap::identity());
        Ok(())
    }

    fn commit(&mut self, doc: Node, map: StepMap) {
        self.doc = doc;
        if !self.selection_set {
            self.selection = self.map_selection(map);
        }
        self.maps.push(map);
    }

    fn map_selection(&self, map: StepMap) -> Selection {
        let anchor = map.map(self.selection.anchor, Assoc::After);
        let head = map.map(self.selection.head, Assoc::After);
        let mapped = Selection::new(anchor, head);
        if mapped.is_valid_in(&self.doc) {
            mapped
        } else {
            Selection::caret(
                first_textblock_pos(&self.doc, head.min(self.doc.content_size()))
                    .unwrap_or_else(|| Selection::at_start(&self.doc).head),
            )
        }
    }

    /// Maps a pre-transaction position through every applied step.
    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }

    pub fn set_stored_marks(&mut self, marks: Option<MarkSet>) -> &mut Self {
        self.stored_marks = marks;
        self.stored_marks_set = true;
        self
    }

    /// Sets `marks` as stored marks unless they already match the marks the
    /// selection start would pick up anyway.
    pub fn ensure_marks(&mut self, marks: MarkSet) -> &mut Self {
        let current = match &self.stored_marks {
            Some(stored) => Some(stored.clone()),
            None => self
                .doc
                .resolve(self.selection.from())
                .ok()
                .map(|pos| pos.marks()),
        };
        if current.as_ref() != Some(&marks) {
            self.set_stored_marks(Some(marks));
        }
        self
    }

    pub fn scroll_into_view(&mut self) -> &mut Self {
        self.scroll_into_view = true;
        self
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    pub fn doc_changed(&self) -> bool {
        !self.maps.is_empty()
    }

    pub fn scrolls_into_view(&self) -> bool {
        self.scroll_into_view
    }

    /// Stored marks to keep after this transaction. Explicitly set marks win;
    /// otherwise any document or selection change clears them.
    pub fn stored_marks_after(&self, previous: Option<&MarkSet>) -> Option<MarkSet> {
        if self.stored_marks_set {
            self.stored_marks.clone()
        } else if self.doc_changed() || self.selection_set {
            None
        } else {
            previous.cloned()
        }
    }
}

/// Rebuilds `content` with `f` applied to the marks of every inline node
/// overlapping `[from, to)`. Text nodes are split at the range edges.
fn map_inline_marks(
    content: &Fragment,
    from: usize,
    to: usize,
    marks_allowed: bool,
    f: &impl Fn(&MarkSet) -> MarkSet,
) -> Fragment {
    let mut nodes = Vec::with_capacity(content.child_count());
    let mut pos = 0;
    for child in content {
        let end = pos + child.node_size();
        if end <= from || pos >= to {
            nodes.push(child.clone());
        } else if child.is_text() && marks_allowed {
            let (cut_from, cut_to) = (from.max(pos) - pos, to.min(end) - pos);
            nodes.push(child.cut(0, cut_from));
            let inner = child.cut(cut_from, cut_to);
            nodes.push(inner.with_marks(f(inner.marks())));
            nodes.push(child.cut(cut_to, child.node_size()));
        } else if child.is_inline() && marks_allowed {
            nodes.push(child.with_marks(f(child.marks())));
        } else if !child.is_leaf() {
            let inner = map_inline_marks(
                child.content(),
                from.saturating_sub(pos + 1),
                to.saturating_sub(pos + 1),
                child.kind().allows_marks(),
                f,
            );
            nodes.push(child.copy(inner));
        } else {
            nodes.push(child.clone());
        }
        pos = end;
    }
    Fragment::from_nodes(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn tr(doc: &Node, sel: Selection) -> Transaction {
        Transaction::new(doc, sel, None, 0)
    }

    #[rstest]
    #[case(2, Assoc::After, 2)]
    #[case(3, Assoc::After, 3)]
    #[case(4, Assoc::Before, 3)]
    #[case(5, Assoc::After, 4)]
    #[case(9, Assoc::After, 8)]
    fn test_step_map_deletion(#[case] pos: usize, #[case] assoc: Assoc, #[case] expected: usize) {
        let map = StepMap::new(3, 2, 1);
        assert_eq!(map.map(pos, assoc), expected);
    }

    #[test]
    fn test_step_map_insertion_assoc() {
        let map = StepMap::new(4, 0, 3);
        assert_eq!(map.map(4, Assoc::After), 7);
        assert_eq!(map.map(4, Assoc::Before), 4);
    }

    #[test]
    fn test_insert_text_maps_selection() {
        let d = doc([p([t("helo")])]);
        let mut tr = tr(&d, Selection::caret(4));
        tr.apply(EditOp::InsertText {
            text: "l".into(),
            from: 4,
            to: 4,
        })
        .unwrap();
        assert_eq!(tr.doc(), &doc([p([t("hello")])]));
        assert_eq!(tr.selection(), Selection::caret(5));
        assert!(tr.doc_changed());
    }

    #[test]
    fn test_insert_text_inherits_marks() {
        let d = doc([p([em(t("ab"))])]);
        let mut tr = tr(&d, Selection::caret(3));
        tr.apply(EditOp::InsertText {
            text: "c".into(),
            from: 3,
            to: 3,
        })
        .unwrap();
        assert_eq!(tr.doc(), &doc([p([em(t("abc"))])]));
    }

    #[test]
    fn test_insert_text_uses_stored_marks() {
        let d = doc([p([t("ab")])]);
        let stored = Some(MarkSet::from_marks([Mark::Strong]));
        let mut tr = Transaction::new(&d, Selection::caret(3), stored, 0);
        tr.apply(EditOp::InsertText {
            text: "c".into(),
            from: 3,
            to: 3,
        })
        .unwrap();
        assert_eq!(tr.doc(), &doc([p([t("ab"), strong(t("c"))])]));
    }

    #[test]
    fn test_add_and_remove_mark_split_text() {
        let d = doc([p([t("hello")])]);
        let mut tr = tr(&d, Selection::caret(1));
        tr.apply(EditOp::AddMark {
            from: 2,
            to: 4,
            mark: Mark::Em,
        })
        .unwrap();
        assert_eq!(tr.doc(), &doc([p([t("h"), em(t("el")), t("lo")])]));
        tr.apply(EditOp::RemoveMark {
            from: 1,
            to: 6,
            mark: Mark::Em,
        })
        .unwrap();
        assert_eq!(tr.doc(), &d);
    }

    #[test]
    fn test_failed_op_leaves_doc_untouched() {
        let d = doc([p([t("ab")]), pre("cd")]);
        let mut tr = tr(&d, Selection::caret(1));
        let err = tr
            .apply(EditOp::ReplaceRange {
                from: 2,
                to: 6,
                slice: Slice::empty(),
            })
            .unwrap_err();
        assert!(matches!(err, TransformError::Replace(_)));
        assert_eq!(tr.doc(), &d);
        assert!(tr.ops().is_empty());
    }

    #[test]
    fn test_ensure_marks_only_when_different() {
        let d = doc([p([em(t("ab"))])]);
        let mut tr = tr(&d, Selection::caret(2));
        tr.ensure_marks(MarkSet::from_marks([Mark::Em]));
        assert_eq!(tr.stored_marks_after(None), None);
        tr.ensure_marks(MarkSet::none());
        assert_eq!(tr.stored_marks_after(None), Some(MarkSet::none()));
    }

    #[test]
    fn test_op_display() {
        let op = EditOp::InsertText {
            text: "l".into(),
            from: 4,
            to: 4,
        };
        assert_eq!(op.to_string(), r#"insert_text("l", 4, 4)"#);
        let op = EditOp::SetSelection(Selection::new(1, 3));
        assert_eq!(op.to_string(), "set_selection(text(1, 3))");
    }
}
