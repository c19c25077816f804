//! Command hooks offered a change before the reconciler edits the document.
//!
//! Hooks let the embedding editor treat a surface change as a key press or
//! typed text, for example to run input rules on typed text or its own
//! split and join commands on Enter and Backspace.

use crate::state::EditorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Delete,
    Other,
}

impl Key {
    pub fn name(self) -> &'static str {
        match self {
            Key::Enter => "Enter",
            Key::Backspace => "Backspace",
            Key::Delete => "Delete",
            Key::Other => "Other",
        }
    }
}

/// Returning `true` from a hook means the hook took care of the change and
/// the reconciler emits nothing for it.
pub trait CommandHooks {
    fn handle_text_input(&mut self, state: &EditorState, from: usize, to: usize, text: &str) -> bool {
        let _ = (state, from, to, text);
        false
    }

    fn handle_key(&mut self, state: &EditorState, key: Key) -> bool {
        let _ = (state, key);
        false
    }
}

/// Hooks that never handle anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl CommandHooks for NoHooks {}
