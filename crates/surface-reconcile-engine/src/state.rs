use surface_reconcile_model::{MarkSet, Node, Selection, Transaction, TransformError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("transaction built on version {base} but the document is at version {current}")]
    StaleTransaction { base: u64, current: u64 },
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// One immutable version of the edited document with its selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    pub doc: Node,
    pub selection: Selection,
    pub stored_marks: Option<MarkSet>,
    pub version: u64,
}

impl EditorState {
    pub fn new(doc: Node) -> Self {
        let selection = Selection::at_start(&doc);
        Self {
            doc,
            selection,
            stored_marks: None,
            version: 0,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// A fresh transaction on top of this version.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(&self.doc, self.selection, self.stored_marks.clone(), self.version)
    }

    /// Moves to the version produced by `tr`.
    pub fn apply(&mut self, tr: &Transaction) -> Result<(), SessionError> {
        if tr.base_version() != self.version {
            return Err(SessionError::StaleTransaction {
                base: tr.base_version(),
                current: self.version,
            });
        }
        self.stored_marks = tr.stored_marks_after(self.stored_marks.as_ref());
        self.doc = tr.doc().clone();
        self.selection = tr.selection();
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use surface_reconcile_model::EditOp;
    use surface_reconcile_model::builders::*;

    #[test]
    fn test_new_places_caret_in_first_textblock() {
        let state = EditorState::new(doc([blockquote([p([t("a")])])]));
        assert_eq!(state.selection, Selection::caret(2));
        assert_eq!(state.version, 0);
    }

    #[test]
    fn test_apply_advances_version() {
        let mut state = EditorState::new(doc([p([t("ab")])]));
        let mut tr = state.transaction();
        tr.apply(EditOp::InsertText {
            text: "x".into(),
            from: 1,
            to: 1,
        })
        .unwrap();
        state.apply(&tr).unwrap();
        assert_eq!(state.doc, doc([p([t("xab")])]));
        assert_eq!(state.selection, Selection::caret(2));
        assert_eq!(state.version, 1);
    }

    #[test]
    fn test_stale_transaction_is_rejected() {
        let mut state = EditorState::new(doc([p([t("ab")])]));
        let stale = state.transaction();
        let fresh = state.transaction();
        state.apply(&fresh).unwrap();
        assert_eq!(
            state.apply(&stale),
            Err(SessionError::StaleTransaction { base: 0, current: 1 })
        );
        assert_eq!(state.version, 1);
    }
}
