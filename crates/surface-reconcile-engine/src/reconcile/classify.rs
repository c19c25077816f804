//! # Change Classifier
//!
//! Turns a diff window into the most specific edit that explains it. Rules
//! are plain predicates tried in priority order; the first match wins, except
//! that split and join are only offered to the command hooks and fall
//! through when no hook takes them.

use std::fmt;

use surface_reconcile_model::{Fragment, Mark, MarkSet, Node, ResolvedPos, Selection, Slice, first_textblock_pos};

use crate::reconcile::adapter::ParsedSpan;
use crate::reconcile::diff::Change;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A textblock was split in two, as by Enter.
    Split,
    /// Two textblocks were joined, as by Backspace.
    Join,
    Deletion {
        from: usize,
        to: usize,
        stored_marks: Option<MarkSet>,
    },
    MarkToggle {
        from: usize,
        to: usize,
        mark: Mark,
        toggle: Toggle,
    },
    TextInput {
        from: usize,
        to: usize,
        text: String,
    },
    Replace {
        from: usize,
        to: usize,
        slice: Slice,
    },
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Split => f.write_str("split"),
            Classification::Join => f.write_str("join"),
            Classification::Deletion { from, to, .. } => write!(f, "deletion({from}, {to})"),
            Classification::MarkToggle {
                from,
                to,
                mark,
                toggle,
            } => write!(f, "mark_toggle({from}, {to}, {mark}, {toggle:?})"),
            Classification::TextInput { from, to, text } => {
                write!(f, "text_input({text:?}, {from}, {to})")
            }
            Classification::Replace { from, to, slice } => {
                write!(f, "replace({from}, {to}, {slice})")
            }
        }
    }
}

/// Everything a rule may look at.
pub struct ClassifyContext<'a> {
    /// The document before the change.
    pub doc: &'a Node,
    pub selection: Selection,
    pub parsed: &'a ParsedSpan,
    pub change: Change,
    /// Change start, resolved in the parsed node.
    pub new_start: ResolvedPos<'a>,
    /// Change end on the new side, resolved in the parsed node.
    pub new_end: ResolvedPos<'a>,
}

impl<'a> ClassifyContext<'a> {
    /// Resolves the change against the parsed node. `None` when the change
    /// lies outside what was parsed.
    pub fn new(doc: &'a Node, selection: Selection, parsed: &'a ParsedSpan, change: Change) -> Option<Self> {
        let new_start = parsed.doc.resolve(change.start.checked_sub(parsed.from)?).ok()?;
        let new_end = parsed.doc.resolve(change.end_b.checked_sub(parsed.from)?).ok()?;
        Some(Self {
            doc,
            selection,
            parsed,
            change,
            new_start,
            new_end,
        })
    }

    fn inline_same_parent(&self) -> bool {
        self.new_start.same_parent(&self.new_end) && self.new_start.parent().is_textblock()
    }
}

type Rule = fn(&ClassifyContext<'_>) -> Option<Classification>;

/// Rules in priority order. `replace` always matches.
static RULES: [Rule; 6] = [split, join, deletion, mark_toggle, text_input, replace];

/// Every matching classification, most specific first.
pub fn classify<'c>(cx: &'c ClassifyContext<'_>) -> impl Iterator<Item = Classification> + 'c {
    RULES.iter().filter_map(move |rule| rule(cx))
}

/// The new side ends exactly where the next textblock starts after the
/// change start.
fn split(cx: &ClassifyContext<'_>) -> Option<Classification> {
    let (start, end) = (&cx.new_start, &cx.new_end);
    let matches = !start.same_parent(end)
        && start.pos() < cx.parsed.doc.content_size()
        && first_textblock_pos(&cx.parsed.doc, start.pos() + 1) == Some(end.pos());
    matches.then_some(Classification::Split)
}

fn join(cx: &ClassifyContext<'_>) -> Option<Classification> {
    let matches = cx.selection.anchor > cx.change.start
        && looks_like_join(cx.doc, cx.change.start, cx.change.end_a, &cx.new_start, &cx.new_end);
    matches.then_some(Classification::Join)
}

fn deletion(cx: &ClassifyContext<'_>) -> Option<Classification> {
    if !cx.inline_same_parent() || cx.new_start.pos() != cx.new_end.pos() {
        return None;
    }
    let (from, to) = (cx.change.start, cx.change.end_a);
    Some(Classification::Deletion {
        from,
        to,
        stored_marks: deleted_marks(cx.doc, from, to),
    })
}

/// Marks to keep typing with after deleting `[from, to)`: everything the
/// deleted inline content carried, minus non-inclusive marks that do not
/// continue into the content after the deletion.
fn deleted_marks(doc: &Node, from: usize, to: usize) -> Option<MarkSet> {
    let start = doc.resolve(from).ok()?;
    let end = doc.resolve(to).ok()?;
    if !start.parent().maybe_child(start.index(start.depth()))?.is_inline() {
        return None;
    }
    let deleted = doc.marks_between(from, to);
    let next = end.node_after().map(|node| node.marks().clone());
    let kept = deleted
        .iter()
        .filter(|mark| mark.inclusive() || next.as_ref().is_some_and(|next| mark.is_in(next)))
        .cloned();
    Some(MarkSet::from_marks(kept))
}

fn mark_toggle(cx: &ClassifyContext<'_>) -> Option<Classification> {
    if !cx.inline_same_parent() || cx.change.end_a != cx.change.end_b {
        return None;
    }
    let (start, end) = (&cx.new_start, &cx.new_end);
    let current = start.parent().content().cut(start.parent_offset(), end.parent_offset());
    let old_start = cx.doc.resolve(cx.change.start).ok()?;
    let previous = old_start.parent().content().cut(
        old_start.parent_offset(),
        cx.change.end_a.checked_sub(old_start.start(old_start.depth()))?,
    );
    let (mark, toggle) = is_mark_change(&current, &previous)?;
    Some(Classification::MarkToggle {
        from: cx.change.start,
        to: cx.change.end_a,
        mark,
        toggle,
    })
}

/// Whether `current` is `previous` with exactly one mark added to or removed
/// from every node.
pub fn is_mark_change(current: &Fragment, previous: &Fragment) -> Option<(Mark, Toggle)> {
    let current_marks = current.first_child()?.marks();
    let previous_marks = previous.first_child()?.marks();
    let added: Vec<&Mark> = current_marks.iter().filter(|m| !m.is_in(previous_marks)).collect();
    let removed: Vec<&Mark> = previous_marks.iter().filter(|m| !m.is_in(current_marks)).collect();
    let (mark, toggle) = match (added.as_slice(), removed.as_slice()) {
        ([mark], []) => ((*mark).clone(), Toggle::Add),
        ([], [mark]) => ((*mark).clone(), Toggle::Remove),
        _ => return None,
    };
    let updated = Fragment::from_nodes(previous.iter().map(|node| {
        let marks = match toggle {
            Toggle::Add => mark.add_to(node.marks()),
            Toggle::Remove => mark.remove_from(node.marks()),
        };
        node.with_marks(marks)
    }));
    (updated == *current).then_some((mark, toggle))
}

/// Both new-side ends lie in the same text node.
fn text_input(cx: &ClassifyContext<'_>) -> Option<Classification> {
    if !cx.inline_same_parent() {
        return None;
    }
    let (start, end) = (&cx.new_start, &cx.new_end);
    let index = start.index(start.depth());
    let in_text = start.parent().maybe_child(index).is_some_and(Node::is_text);
    let same_node = index + usize::from(end.text_offset() == 0) == end.index(end.depth());
    if !in_text || !same_node {
        return None;
    }
    let text = start
        .parent()
        .text_between(start.parent_offset(), end.parent_offset(), None);
    Some(Classification::TextInput {
        from: cx.change.start,
        to: cx.change.end_a,
        text,
    })
}

fn replace(cx: &ClassifyContext<'_>) -> Option<Classification> {
    let slice = cx.parsed.doc.slice(cx.new_start.pos(), cx.new_end.pos()).ok()?;
    Some(Classification::Replace {
        from: cx.change.start,
        to: cx.change.end_a,
        slice,
    })
}

/// Whether replacing `[start, end)` of `old` with the new side looks like
/// the join of two adjacent textblocks.
pub fn looks_like_join(
    old: &Node,
    start: usize,
    end: usize,
    new_start: &ResolvedPos<'_>,
    new_end: &ResolvedPos<'_>,
) -> bool {
    // The content must have shrunk, and the new end must sit at or after the
    // end of the block the new start points into.
    if !new_start.parent().is_textblock()
        || end - start <= new_end.pos() - new_start.pos()
        || skip_closing_and_opening(new_start, true, false) < new_end.pos()
    {
        return false;
    }
    let Ok(old_start) = old.resolve(start) else {
        return false;
    };
    if old_start.parent_offset() < old_start.parent().content_size() || !old_start.parent().is_textblock() {
        return false;
    }
    let Ok(next) = old.resolve(skip_closing_and_opening(&old_start, true, true)) else {
        return false;
    };
    if !next.parent().is_textblock() || next.pos() > end || skip_closing_and_opening(&next, true, false) < end {
        return false;
    }
    let parent = new_start.parent();
    parent.content().cut(new_start.parent_offset(), parent.content_size()) == *next.parent().content()
}

/// Position reached by walking out of the closing tokens after `pos` (from
/// the end of its parent when `from_end`) and, with `may_open`, into the
/// opening tokens of the following node.
pub fn skip_closing_and_opening(pos: &ResolvedPos<'_>, from_end: bool, may_open: bool) -> usize {
    let mut depth = pos.depth();
    let mut end = if from_end { pos.end(depth) } else { pos.pos() };
    let mut from_end = from_end;
    while depth > 0 && (from_end || pos.index_after(depth) == pos.node(depth).child_count()) {
        depth -= 1;
        end += 1;
        from_end = false;
    }
    if may_open {
        let mut next = pos.node(depth).maybe_child(pos.index_after(depth));
        while let Some(node) = next
            && !node.is_leaf()
        {
            next = node.first_child();
            end += 1;
        }
    }
    end
}

/// Corrects a change that is smaller than the selection it overwrote.
///
/// Typing over a selection whose edge matches the typed text yields a diff
/// that starts (or ends) just inside the selection; within `tolerance`
/// positions the window snaps to the selection edge.
pub fn correct_selection_edges(change: Change, selection: Selection, tolerance: usize) -> Change {
    let (from, to) = (selection.from(), selection.to());
    if from >= to || change.start != change.end_b {
        return change;
    }
    let mut change = change;
    if change.start > from && change.start <= from + tolerance {
        change.start = from;
    } else if change.end_a < to && change.end_a + tolerance >= to {
        change.end_b += to - change.end_a;
        change.end_a = to;
    }
    change
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use surface_reconcile_model::builders::*;

    fn parsed(doc: Node, from: usize, to: usize) -> ParsedSpan {
        ParsedSpan {
            doc,
            hint: None,
            from,
            to,
        }
    }

    fn first(old: &Node, selection: Selection, parsed: &ParsedSpan, change: Change) -> Classification {
        let cx = ClassifyContext::new(old, selection, parsed, change).unwrap();
        classify(&cx).next().unwrap()
    }

    #[test]
    fn test_typing_is_text_input() {
        let old = doc([p([t("helo")])]);
        let new = parsed(p([t("hello")]), 1, 5);
        let change = Change { start: 4, end_a: 4, end_b: 5 };
        assert_eq!(
            first(&old, Selection::caret(4), &new, change),
            Classification::TextInput {
                from: 4,
                to: 4,
                text: "l".into()
            }
        );
    }

    #[test]
    fn test_deletion_keeps_marks() {
        let old = doc([p([t("ab"), em(t("cd")), t("ef")])]);
        let new = parsed(p([t("ab"), t("ef")]), 1, 7);
        let change = Change { start: 3, end_a: 5, end_b: 3 };
        assert_eq!(
            first(&old, Selection::caret(5), &new, change),
            Classification::Deletion {
                from: 3,
                to: 5,
                stored_marks: Some(MarkSet::from_marks([Mark::Em])),
            }
        );
    }

    #[test]
    fn test_deleted_link_is_not_kept() {
        let old = doc([p([t("a"), link("u", t("b")), t("c")])]);
        assert_eq!(deleted_marks(&old, 2, 3), Some(MarkSet::none()));
        let linked = doc([p([link("u", t("ab"))])]);
        assert_eq!(
            deleted_marks(&linked, 1, 2),
            Some(MarkSet::from_marks([Mark::Link { href: "u".into() }]))
        );
    }

    #[test]
    fn test_mark_toggle() {
        let old = doc([p([t("abc")])]);
        let new = parsed(p([t("a"), em(t("b")), t("c")]), 1, 4);
        let change = Change { start: 2, end_a: 3, end_b: 3 };
        assert_eq!(
            first(&old, Selection::new(2, 3), &new, change),
            Classification::MarkToggle {
                from: 2,
                to: 3,
                mark: Mark::Em,
                toggle: Toggle::Add
            }
        );
    }

    #[rstest]
    #[case(Fragment::from_nodes([strong(t("x"))]), Fragment::from_nodes([t("x")]), Some((Mark::Strong, Toggle::Add)))]
    #[case(Fragment::from_nodes([t("x")]), Fragment::from_nodes([em(t("x"))]), Some((Mark::Em, Toggle::Remove)))]
    #[case(Fragment::from_nodes([em(t("y"))]), Fragment::from_nodes([t("x")]), None)]
    #[case(Fragment::from_nodes([em(strong(t("x")))]), Fragment::from_nodes([t("x")]), None)]
    fn test_is_mark_change(
        #[case] current: Fragment,
        #[case] previous: Fragment,
        #[case] expected: Option<(Mark, Toggle)>,
    ) {
        assert_eq!(is_mark_change(&current, &previous), expected);
    }

    #[test]
    fn test_split_then_replace() {
        // p(hello) split after "hel".
        let old = doc([p([t("hello")])]);
        let new = parsed(doc([p([t("hel")]), p([t("lo")])]), 0, 7);
        let change = Change { start: 4, end_a: 4, end_b: 6 };
        let cx = ClassifyContext::new(&old, Selection::caret(4), &new, change).unwrap();
        let all: Vec<String> = classify(&cx).map(|c| c.to_string()).collect();
        assert_eq!(all, vec!["split", "replace(4, 4, <paragraph(), paragraph()>(1,1))"]);
    }

    #[test]
    fn test_join_then_deletion() {
        let old = doc([p([t("ab")]), p([t("cd")])]);
        let new = parsed(doc([p([t("abcd")])]), 0, 8);
        let change = Change { start: 3, end_a: 5, end_b: 3 };
        let cx = ClassifyContext::new(&old, Selection::caret(5), &new, change).unwrap();
        let all: Vec<String> = classify(&cx).map(|c| c.to_string()).collect();
        assert_eq!(all[..2], ["join".to_string(), "deletion(3, 5)".to_string()]);
    }

    #[test]
    fn test_join_needs_anchor_after_start() {
        let old = doc([p([t("ab")]), p([t("cd")])]);
        let new = parsed(doc([p([t("abcd")])]), 0, 8);
        let change = Change { start: 3, end_a: 5, end_b: 3 };
        let cx = ClassifyContext::new(&old, Selection::caret(3), &new, change).unwrap();
        assert!(!classify(&cx).any(|c| c == Classification::Join));
    }

    #[test]
    fn test_paste_across_blocks_is_replace() {
        let old = doc([p([t("ab")])]);
        let new = parsed(doc([p([t("a")]), blockquote([p([t("x")])]), p([t("b")])]), 0, 4);
        let change = Change { start: 2, end_a: 2, end_b: 9 };
        let result = first(&old, Selection::caret(2), &new, change);
        assert!(matches!(result, Classification::Replace { from: 2, to: 2, .. }), "{result}");
    }

    #[rstest]
    #[case(Change { start: 3, end_a: 5, end_b: 3 }, Selection::new(2, 6), Change { start: 2, end_a: 5, end_b: 3 })]
    #[case(Change { start: 6, end_a: 8, end_b: 6 }, Selection::new(2, 9), Change { start: 6, end_a: 9, end_b: 7 })]
    #[case(Change { start: 7, end_a: 7, end_b: 7 }, Selection::new(2, 9), Change { start: 7, end_a: 9, end_b: 9 })]
    #[case(Change { start: 5, end_a: 6, end_b: 5 }, Selection::new(2, 9), Change { start: 5, end_a: 6, end_b: 5 })]
    #[case(Change { start: 3, end_a: 5, end_b: 3 }, Selection::caret(3), Change { start: 3, end_a: 5, end_b: 3 })]
    #[case(Change { start: 3, end_a: 5, end_b: 4 }, Selection::new(2, 6), Change { start: 3, end_a: 5, end_b: 4 })]
    fn test_correct_selection_edges(#[case] change: Change, #[case] selection: Selection, #[case] expected: Change) {
        assert_eq!(correct_selection_edges(change, selection, 2), expected);
    }
}
