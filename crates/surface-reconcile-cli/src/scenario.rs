//! Reconciliation scenarios: a document, the surface the host left behind
//! after editing it, and the change span the host reported.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use surface_reconcile_engine::parse::parse_document;
use surface_reconcile_engine::{
    ChangeFlags, EditorState, Key, MirrorView, Reconciler, ReconcilerSettings, Reconciliation, Session, Surface,
    SurfacePoint, SurfaceSelection,
};
use surface_reconcile_model::{Node, Selection};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Document markup before the host edit.
    pub document: String,
    /// Surface markup after the host edit.
    pub surface: String,
    /// Reported change span, `[from, to]`.
    pub span: [usize; 2],
    /// Model selection as `[anchor, head]`. Defaults to the document start.
    #[serde(default)]
    pub selection: Option<[usize; 2]>,
    #[serde(default)]
    pub native_selection: Option<NativeSelection>,
    /// Name of the key pressed just before the edit, e.g. `"Backspace"`.
    #[serde(default)]
    pub last_key: Option<String>,
    #[serde(default)]
    pub type_over: bool,
    #[serde(default)]
    pub composing: bool,
}

/// A surface point given as a text search: `offset` characters after the
/// start of the first occurrence of `text`.
#[derive(Debug, Clone, Deserialize)]
pub struct TextPoint {
    pub text: String,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NativeSelection {
    pub anchor: TextPoint,
    #[serde(default)]
    pub head: Option<TextPoint>,
}

/// What one replayed cycle did.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub result: Reconciliation,
    pub doc: Node,
    pub selection: Selection,
    pub reconcile_count: u64,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Reconciliation::NoChange => writeln!(f, "result: no change")?,
            Reconciliation::Handled => writeln!(f, "result: handled")?,
            Reconciliation::Apply(edit) => {
                writeln!(f, "result: apply")?;
                for line in edit.to_string().lines() {
                    writeln!(f, "  {line}")?;
                }
            }
        }
        writeln!(f, "document: {}", self.doc)?;
        writeln!(f, "selection: {}", self.selection)?;
        writeln!(f, "reconciliations: {}", self.reconcile_count)
    }
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file at {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse scenario file at {}", path.display()))
    }

    pub fn run(&self, settings: ReconcilerSettings) -> Result<Outcome> {
        let doc = parse_document(&self.document);
        let mut state = EditorState::new(doc.clone());
        if let Some([anchor, head]) = self.selection {
            state = state.with_selection(Selection::new(anchor, head));
        }
        let view = MirrorView::new(&doc, settings.quirks.clone());
        let mut session = Session::new(state, view, Reconciler::new(settings));

        let surface = session.view_mut().surface_mut();
        // Keep the rendered nodes when the host left the surface alone.
        if surface.to_markup() != self.surface {
            let root = surface.root();
            surface.set_inner_markup(root, &self.surface);
        }
        if let Some(native) = &self.native_selection {
            let anchor = locate(surface, &native.anchor)?;
            let head = match &native.head {
                Some(head) => locate(surface, head)?,
                None => anchor,
            };
            surface.set_selection(Some(SurfaceSelection { anchor, head }));
        }
        if let Some(name) = &self.last_key {
            session.key_pressed(key_named(name));
        }

        let flags = ChangeFlags {
            type_over: self.type_over,
            composing: self.composing,
        };
        let [from, to] = self.span;
        let result = session.reconcile_with(from, to, flags)?;
        log::info!("Reconciled {from}..{to} at document version {}", session.state().version);
        Ok(Outcome {
            result,
            doc: session.state().doc.clone(),
            selection: session.state().selection,
            reconcile_count: session.reconcile_count(),
        })
    }
}

fn locate(surface: &Surface, point: &TextPoint) -> Result<SurfacePoint> {
    let found = surface
        .find_text(&point.text)
        .ok_or_else(|| anyhow!("Native selection text {:?} is not on the surface", point.text))?;
    Ok(SurfacePoint {
        node: found.node,
        offset: found.offset + point.offset,
    })
}

fn key_named(name: &str) -> Key {
    [Key::Enter, Key::Backspace, Key::Delete]
        .into_iter()
        .find(|key| key.name().eq_ignore_ascii_case(name.trim()))
        .unwrap_or(Key::Other)
}
