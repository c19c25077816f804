//! An editing session: the current document version, the view projecting
//! it and the bookkeeping that spans reconciliation cycles.

use std::time::{Duration, Instant};

use log::debug;
use surface_reconcile_model::{EditOp, Transaction};

use crate::hooks::{CommandHooks, Key, NoHooks};
use crate::reconcile::selection::selection_from_surface;
use crate::reconcile::{ChangeFlags, KeyPress, Reconciler, Reconciliation, Request};
use crate::state::{EditorState, SessionError};
use crate::view::Projection;

/// How recently a selection change must have happened for its origin to
/// matter.
const SELECTION_ORIGIN_WINDOW: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    Pointer,
    Key,
}

#[derive(Debug, Clone, Copy)]
struct Stamped<T> {
    value: T,
    at: Instant,
}

impl<T: Copy> Stamped<T> {
    fn now(value: T) -> Self {
        Self {
            value,
            at: Instant::now(),
        }
    }

    fn within(self, window: Duration) -> Option<T> {
        (self.at.elapsed() <= window).then_some(self.value)
    }
}

pub struct Session<V: Projection, H: CommandHooks = NoHooks> {
    state: EditorState,
    view: V,
    hooks: H,
    reconciler: Reconciler,
    last_key: Option<Stamped<Key>>,
    selection_origin: Option<Stamped<SelectionOrigin>>,
    reconcile_count: u64,
}

impl<V: Projection> Session<V, NoHooks> {
    pub fn new(state: EditorState, view: V, reconciler: Reconciler) -> Self {
        Self::with_hooks(state, view, NoHooks, reconciler)
    }
}

impl<V: Projection, H: CommandHooks> Session<V, H> {
    pub fn with_hooks(state: EditorState, view: V, hooks: H, reconciler: Reconciler) -> Self {
        Self {
            state,
            view,
            hooks,
            reconciler,
            last_key: None,
            selection_origin: None,
            reconcile_count: 0,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Host access to the view, used to make native edits on its surface.
    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Number of cycles that found a content difference.
    pub fn reconcile_count(&self) -> u64 {
        self.reconcile_count
    }

    pub fn key_pressed(&mut self, key: Key) {
        self.last_key = Some(Stamped::now(key));
    }

    pub fn selection_changed(&mut self, origin: SelectionOrigin) {
        self.selection_origin = Some(Stamped::now(origin));
    }

    /// Copies the host's native selection into the document state. Returns
    /// the applied transaction when the selection moved.
    pub fn sync_selection(&mut self) -> Result<Option<Transaction>, SessionError> {
        let Some(selection) = selection_from_surface(&self.view, &self.state.doc) else {
            return Ok(None);
        };
        if selection == self.state.selection {
            return Ok(None);
        }
        let mut tr = self.state.transaction();
        tr.apply(EditOp::SetSelection(selection))?;
        let by_key = self
            .selection_origin
            .take()
            .and_then(|origin| origin.within(SELECTION_ORIGIN_WINDOW))
            == Some(SelectionOrigin::Key);
        if by_key {
            tr.scroll_into_view();
        }
        debug!("synced selection to {selection}");
        self.state.apply(&tr)?;
        Ok(Some(tr))
    }

    pub fn reconcile(&mut self, from: usize, to: usize) -> Result<Reconciliation, SessionError> {
        self.reconcile_with(from, to, ChangeFlags::default())
    }

    /// Runs one cycle over the reported span and applies its edit. The state
    /// only changes when the whole edit applies.
    pub fn reconcile_with(&mut self, from: usize, to: usize, flags: ChangeFlags) -> Result<Reconciliation, SessionError> {
        let last_key = self.last_key.take().map(|stamped| KeyPress {
            key: stamped.value,
            age: stamped.at.elapsed(),
        });
        let request = Request {
            from,
            to,
            flags,
            last_key,
        };
        let result = self
            .reconciler
            .reconcile(&self.state, &self.view, &mut self.hooks, request);
        if result.found_change() {
            self.reconcile_count += 1;
        }
        match &result {
            Reconciliation::Apply(edit) => {
                let tr = edit.apply_to(&self.state)?;
                self.apply_transaction(&tr)?;
            }
            Reconciliation::Handled => {
                self.view.project(&self.state.doc, Some(self.state.selection));
            }
            Reconciliation::NoChange => {}
        }
        Ok(result)
    }

    /// Applies a transaction built on the current version and re-projects
    /// the result.
    pub fn apply_transaction(&mut self, tr: &Transaction) -> Result<(), SessionError> {
        self.state.apply(tr)?;
        self.view.project(&self.state.doc, Some(self.state.selection));
        Ok(())
    }
}
