//! The reconciliation pipeline.
//!
//! One cycle takes a reported change span, widens it to whole nodes, parses
//! the surface content rendering it, diffs that against the document,
//! classifies the difference and emits a single edit explaining it.

pub mod adapter;
pub mod classify;
pub mod diff;
pub mod emit;
pub mod normalize;
pub mod selection;

use std::time::Duration;

use log::{debug, warn};
use surface_reconcile_config::Config;

use crate::hooks::{CommandHooks, Key};
use crate::quirks::{QuirkPolicy, UnknownQuirk};
use crate::state::EditorState;
use crate::view::SurfaceView;
use adapter::{ParsedSpan, parse_between};
use classify::{Classification, ClassifyContext, classify, correct_selection_edges};
use diff::{PreferredSide, find_diff};
use emit::{Edit, edit_op, emit, retype_selection};
use normalize::normalize_span;
use selection::resolve_hint;

/// Default distance inside a selection edge at which a diff still counts as
/// overwriting the whole selection.
pub const SELECTION_EDGE_TOLERANCE: usize = 2;

/// Default time after a Backspace during which changes prefer the caret's
/// end side.
pub const BACKSPACE_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub selection_edge_tolerance: usize,
    pub backspace_window: Duration,
    pub quirks: QuirkPolicy,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            selection_edge_tolerance: SELECTION_EDGE_TOLERANCE,
            backspace_window: BACKSPACE_WINDOW,
            quirks: QuirkPolicy::none(),
        }
    }
}

impl TryFrom<&Config> for ReconcilerSettings {
    type Error = UnknownQuirk;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        Ok(Self {
            selection_edge_tolerance: config.selection_edge_tolerance,
            backspace_window: Duration::from_millis(config.backspace_window_ms),
            quirks: QuirkPolicy::parse(&config.quirks)?,
        })
    }
}

/// What the host reported alongside a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFlags {
    /// The host typed over the selection.
    pub type_over: bool,
    /// An input method composition is in progress.
    pub composing: bool,
}

/// The last key pressed before a change and how long ago.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub age: Duration,
}

/// One reported surface change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub from: usize,
    pub to: usize,
    pub flags: ChangeFlags,
    pub last_key: Option<KeyPress>,
}

impl Request {
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            flags: ChangeFlags::default(),
            last_key: None,
        }
    }

    /// The last key was Backspace, however long ago.
    pub fn after_backspace(&self) -> bool {
        self.last_key.is_some_and(|press| press.key == Key::Backspace)
    }

    /// The last key was Backspace and it was pressed within `window`.
    pub fn prefers_end(&self, window: Duration) -> bool {
        self.after_backspace() && self.last_key.is_some_and(|press| press.age <= window)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The surface matches the document; nothing to do.
    NoChange,
    /// A command hook took care of the change.
    Handled,
    Apply(Edit),
}

impl Reconciliation {
    /// Whether the cycle found a content difference.
    pub fn found_change(&self) -> bool {
        match self {
            Reconciliation::NoChange => false,
            Reconciliation::Handled => true,
            Reconciliation::Apply(edit) => edit.change.is_some(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(settings: ReconcilerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Runs one cycle against `state`. Never mutates the state; the result
    /// says what, if anything, to apply.
    pub fn reconcile(
        &self,
        state: &EditorState,
        view: &dyn SurfaceView,
        hooks: &mut dyn CommandHooks,
        request: Request,
    ) -> Reconciliation {
        let doc = &state.doc;
        let span = match normalize_span(doc, request.from, request.to) {
            Ok(span) => span,
            Err(err) => {
                warn!("ignoring change {}..{}: {err}", request.from, request.to);
                return Reconciliation::NoChange;
            }
        };
        debug!("normalized {}..{} to {span}", request.from, request.to);

        let Some(parsed) = parse_between(view, doc, &self.settings.quirks, span, request.after_backspace()) else {
            debug!("no surface range renders {span}");
            return Reconciliation::NoChange;
        };
        let compare = match doc.slice(parsed.from, parsed.to) {
            Ok(slice) => slice,
            Err(err) => {
                warn!("parsed range {}..{} is outside the document: {err}", parsed.from, parsed.to);
                return Reconciliation::NoChange;
            }
        };

        let selection = state.selection;
        let (preferred_pos, side) = if request.prefers_end(self.settings.backspace_window) {
            (selection.to(), PreferredSide::End)
        } else {
            (selection.from(), PreferredSide::Start)
        };
        let Some(change) = find_diff(compare.content(), parsed.doc.content(), parsed.from, preferred_pos, side)
        else {
            if self.is_type_over(state, &parsed, request) {
                return retype_selection(state).map_or(Reconciliation::NoChange, Reconciliation::Apply);
            }
            return self.selection_only(state, &parsed);
        };
        debug!("diff window {change}");

        let change = if selection.from() >= parsed.from && selection.to() <= parsed.to {
            correct_selection_edges(change, selection, self.settings.selection_edge_tolerance)
        } else {
            change
        };

        let Some(cx) = ClassifyContext::new(doc, selection, &parsed, change) else {
            warn!("diff window {change} lies outside the parsed range {}..{}", parsed.from, parsed.to);
            return Reconciliation::NoChange;
        };
        for classification in classify(&cx) {
            debug!("classified {change} as {classification}");
            let handled = match &classification {
                Classification::Split => hooks.handle_key(state, Key::Enter),
                Classification::Join => hooks.handle_key(state, Key::Backspace),
                Classification::TextInput { from, to, text } => hooks.handle_text_input(state, *from, *to, text),
                _ => false,
            };
            if handled {
                debug!("{classification} handled by command hooks");
                return Reconciliation::Handled;
            }
            let Some((op, stored_marks)) = edit_op(classification) else {
                continue;
            };
            return match emit(state, &parsed, change, op, stored_marks) {
                Some(edit) => Reconciliation::Apply(edit),
                None => Reconciliation::NoChange,
            };
        }
        Reconciliation::NoChange
    }

    /// A type-over that reproduced the selected text leaves no diff. The
    /// selection is then rewritten with its own text so the host and the
    /// document agree on what happened.
    fn is_type_over(&self, state: &EditorState, parsed: &ParsedSpan, request: Request) -> bool {
        let selection = state.selection;
        let same_parent = match (state.doc.resolve(selection.anchor), state.doc.resolve(selection.head)) {
            (Ok(anchor), Ok(head)) => anchor.same_parent(&head),
            _ => false,
        };
        let hint_is_range = parsed.hint.is_some_and(|hint| !hint.is_empty());
        let applies = request.flags.type_over
            && !selection.is_empty()
            && same_parent
            && !request.flags.composing
            && !hint_is_range;
        if applies {
            debug!("type-over of {}..{} reproduced the selected text", selection.from(), selection.to());
        }
        applies
    }

    fn selection_only(&self, state: &EditorState, parsed: &ParsedSpan) -> Reconciliation {
        match parsed.hint.and_then(|hint| resolve_hint(&state.doc, hint)) {
            Some(selection) if selection != state.selection => {
                debug!("no content change, moving selection to {selection}");
                Reconciliation::Apply(Edit::selection_only(selection))
            }
            _ => Reconciliation::NoChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use surface_reconcile_model::Selection;
    use surface_reconcile_model::builders::*;

    use crate::hooks::NoHooks;
    use crate::mirror::MirrorView;
    use crate::quirks::Quirk;

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            selection_edge_tolerance: 4,
            backspace_window_ms: 50,
            quirks: vec!["stray-break-on-backspace".to_string()],
        };
        let settings = ReconcilerSettings::try_from(&config).unwrap();
        assert_eq!(settings.selection_edge_tolerance, 4);
        assert_eq!(settings.backspace_window, Duration::from_millis(50));
        assert!(settings.quirks.has(Quirk::StrayBreakOnBackspace));
        assert!(!settings.quirks.has(Quirk::MarkPlaceholderImage));
    }

    #[test]
    fn test_settings_reject_unknown_quirk() {
        let config = Config {
            quirks: vec!["flaky-caret".to_string()],
            ..Config::default()
        };
        assert_eq!(
            ReconcilerSettings::try_from(&config),
            Err(UnknownQuirk("flaky-caret".to_string()))
        );
    }

    #[test]
    fn test_default_config_matches_default_settings() {
        assert_eq!(
            ReconcilerSettings::try_from(&Config::default()),
            Ok(ReconcilerSettings::default())
        );
    }

    #[rstest]
    #[case(Key::Backspace, 20, true, true)]
    #[case(Key::Backspace, 5_000, true, false)]
    #[case(Key::Enter, 20, false, false)]
    fn test_last_key_flags(
        #[case] key: Key,
        #[case] age_ms: u64,
        #[case] after_backspace: bool,
        #[case] prefers_end: bool,
    ) {
        let mut request = Request::new(0, 2);
        request.last_key = Some(KeyPress {
            key,
            age: Duration::from_millis(age_ms),
        });
        assert_eq!(request.after_backspace(), after_backspace);
        assert_eq!(request.prefers_end(BACKSPACE_WINDOW), prefers_end);
        assert!(!Request::new(0, 2).after_backspace());
    }

    #[test]
    fn test_untouched_surface_is_no_change() {
        let state = EditorState::new(doc([p([t("ab")]), p([t("cd")])]));
        let view = MirrorView::new(&state.doc, QuirkPolicy::none());
        let result = Reconciler::default().reconcile(&state, &view, &mut NoHooks, Request::new(0, 8));
        assert_eq!(result, Reconciliation::NoChange);
        assert!(!result.found_change());
    }

    #[test]
    fn test_out_of_range_request_is_no_change() {
        let state = EditorState::new(doc([p([t("ab")])]));
        let view = MirrorView::new(&state.doc, QuirkPolicy::none());
        let result = Reconciler::default().reconcile(&state, &view, &mut NoHooks, Request::new(0, 90));
        assert_eq!(result, Reconciliation::NoChange);
    }

    #[test]
    fn test_type_over_with_identical_text() {
        let state = EditorState::new(doc([p([t("abc")])])).with_selection(Selection::new(1, 3));
        let view = MirrorView::new(&state.doc, QuirkPolicy::none());
        let mut request = Request::new(1, 4);
        request.flags.type_over = true;
        let Reconciliation::Apply(edit) = Reconciler::default().reconcile(&state, &view, &mut NoHooks, request)
        else {
            panic!("type-over should produce an edit");
        };
        insta::assert_snapshot!(edit, @r#"
        insert_text("ab", 1, 3)
        scroll_into_view
        "#);
        assert!(!Reconciliation::Apply(edit).found_change());
    }

    #[test]
    fn test_type_over_while_composing_is_ignored() {
        let state = EditorState::new(doc([p([t("abc")])])).with_selection(Selection::new(1, 3));
        let view = MirrorView::new(&state.doc, QuirkPolicy::none());
        let mut request = Request::new(1, 4);
        request.flags = ChangeFlags {
            type_over: true,
            composing: true,
        };
        let result = Reconciler::default().reconcile(&state, &view, &mut NoHooks, request);
        assert_eq!(result, Reconciliation::NoChange);
    }
}
