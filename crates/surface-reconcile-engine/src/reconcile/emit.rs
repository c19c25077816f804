//! # Edit Emitter
//!
//! Turns a classification into the ops of one transaction, resolves the
//! parsed selection hint against the resulting document, and validates the
//! whole edit before handing it out.

use std::fmt;

use log::{debug, warn};
use surface_reconcile_model::{EditOp, MarkSet, Selection, Slice, Transaction, TransformError};

use crate::reconcile::adapter::ParsedSpan;
use crate::reconcile::classify::{Classification, Toggle};
use crate::reconcile::diff::Change;
use crate::reconcile::selection::resolve_hint;
use crate::state::EditorState;

/// A validated edit, ready to be applied as one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub ops: Vec<EditOp>,
    /// The selection the edit leaves behind, when the surface reported one.
    pub selection: Option<Selection>,
    pub stored_marks: Option<MarkSet>,
    pub scroll_into_view: bool,
    /// The diff window the edit explains. `None` when the surface showed no
    /// content difference.
    pub change: Option<Change>,
}

impl Edit {
    /// An edit that only moves the selection.
    pub fn selection_only(selection: Selection) -> Self {
        Self {
            ops: vec![EditOp::SetSelection(selection)],
            selection: Some(selection),
            stored_marks: None,
            scroll_into_view: false,
            change: None,
        }
    }

    /// Replays the edit on top of `state`.
    pub fn apply_to(&self, state: &EditorState) -> Result<Transaction, TransformError> {
        let mut tr = state.transaction();
        for op in &self.ops {
            tr.apply(op.clone())?;
        }
        if let Some(marks) = &self.stored_marks {
            tr.ensure_marks(marks.clone());
        }
        if self.scroll_into_view {
            tr.scroll_into_view();
        }
        Ok(tr)
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            writeln!(f, "{op}")?;
        }
        if let Some(marks) = &self.stored_marks {
            let names: Vec<String> = marks.iter().map(ToString::to_string).collect();
            writeln!(f, "stored_marks([{}])", names.join(", "))?;
        }
        if self.scroll_into_view {
            writeln!(f, "scroll_into_view")?;
        }
        Ok(())
    }
}

/// The op a classification stands for, with the stored marks it leaves.
/// Split and join have none; they only exist to be offered to the command
/// hooks.
pub fn edit_op(classification: Classification) -> Option<(EditOp, Option<MarkSet>)> {
    let op = match classification {
        Classification::Split | Classification::Join => return None,
        Classification::Deletion { from, to, stored_marks } => {
            return Some((
                EditOp::ReplaceRange {
                    from,
                    to,
                    slice: Slice::empty(),
                },
                stored_marks,
            ));
        }
        Classification::MarkToggle {
            from,
            to,
            mark,
            toggle: Toggle::Add,
        } => EditOp::AddMark { from, to, mark },
        Classification::MarkToggle {
            from,
            to,
            mark,
            toggle: Toggle::Remove,
        } => EditOp::RemoveMark { from, to, mark },
        Classification::TextInput { from, to, text } => EditOp::InsertText { text, from, to },
        Classification::Replace { from, to, slice } => EditOp::ReplaceRange { from, to, slice },
    };
    Some((op, None))
}

/// Builds the edit explaining `change` with `op`.
///
/// When the op cannot be fitted into the document, the whole parsed span is
/// replaced with the parsed content instead. `None` only when even that
/// fails.
pub fn emit(
    state: &EditorState,
    parsed: &ParsedSpan,
    change: Change,
    op: EditOp,
    stored_marks: Option<MarkSet>,
) -> Option<Edit> {
    match build(state, parsed, change, op, stored_marks) {
        Ok(edit) => Some(edit),
        Err(err) => {
            debug!("edit for {change} does not fit ({err}), replacing {}..{}", parsed.from, parsed.to);
            let whole = EditOp::ReplaceRange {
                from: parsed.from,
                to: parsed.to,
                slice: Slice::closed(parsed.doc.content().clone()),
            };
            build(state, parsed, change, whole, None)
                .inspect_err(|err| warn!("dropping surface change {change}: {err}"))
                .ok()
        }
    }
}

/// Rewrites the selected text with itself. Used for a type-over that
/// reproduced the selection, which leaves no diff to explain.
pub fn retype_selection(state: &EditorState) -> Option<Edit> {
    let (from, to) = (state.selection.from(), state.selection.to());
    let op = EditOp::InsertText {
        text: state.doc.text_between(from, to, None),
        from,
        to,
    };
    state
        .transaction()
        .apply(op.clone())
        .inspect_err(|err| warn!("cannot retype selection {from}..{to}: {err}"))
        .ok()?;
    Some(Edit {
        ops: vec![op],
        selection: None,
        stored_marks: None,
        scroll_into_view: true,
        change: None,
    })
}

fn build(
    state: &EditorState,
    parsed: &ParsedSpan,
    change: Change,
    op: EditOp,
    stored_marks: Option<MarkSet>,
) -> Result<Edit, TransformError> {
    let mut tr = state.transaction();
    tr.apply(op.clone())?;
    let mut ops = vec![op];
    let selection = parsed.hint.and_then(|hint| resolve_hint(tr.doc(), hint));
    if let Some(selection) = selection {
        tr.apply(EditOp::SetSelection(selection))?;
        ops.push(EditOp::SetSelection(selection));
    }
    Ok(Edit {
        ops,
        selection,
        stored_marks,
        scroll_into_view: true,
        change: Some(change),
    })
}
