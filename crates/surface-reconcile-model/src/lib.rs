//! Immutable document model used by the reconciliation engine.
//!
//! Documents are trees of [`Node`]s addressed by flat integer positions:
//! every non-leaf node contributes an opening and a closing token, text
//! contributes one position per character and other leaves one position.

pub mod builders;
pub mod fragment;
pub mod mark;
pub mod node;
pub mod replace;
pub mod resolved;
pub mod schema;
pub mod selection;
pub mod slice;
pub mod transform;

pub use fragment::Fragment;
pub use mark::{Mark, MarkSet};
pub use node::{Attrs, Node};
pub use replace::ReplaceError;
pub use resolved::{PositionError, ResolvedPos};
pub use schema::{ContentRule, NodeKind};
pub use selection::{Selection, first_textblock_pos};
pub use slice::Slice;
pub use transform::{Assoc, EditOp, StepMap, TransformError, Transaction};
