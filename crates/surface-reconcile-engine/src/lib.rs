//! Folds out-of-band edits made on a live editable surface back into the
//! document model as minimal structural edits.
//!
//! [`Session`] is the usual entry point: it owns the current
//! [`EditorState`], a [`Projection`] of it onto a [`Surface`] and the
//! [`Reconciler`] that turns reported change spans into edits.

pub mod hooks;
mod markup;
pub mod mirror;
pub mod parse;
pub mod quirks;
pub mod reconcile;
pub mod session;
pub mod state;
pub mod surface;
pub mod view;

// Re-export key types for easier usage
pub use hooks::{CommandHooks, Key, NoHooks};
pub use mirror::MirrorView;
pub use quirks::{Quirk, QuirkPolicy, UnknownQuirk};
pub use reconcile::emit::Edit;
pub use reconcile::{ChangeFlags, KeyPress, Reconciler, ReconcilerSettings, Reconciliation, Request};
pub use session::{SelectionOrigin, Session};
pub use state::{EditorState, SessionError};
pub use surface::{Surface, SurfaceId, SurfacePoint, SurfaceSelection};
pub use view::{NodeOverride, ParseRange, Projection, SurfaceView};
