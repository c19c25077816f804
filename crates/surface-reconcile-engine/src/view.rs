use surface_reconcile_model::{Node, Selection};

use crate::surface::{Surface, SurfaceId, SurfacePoint, SurfaceSelection};

/// The surface region that corresponds to a span of document positions.
///
/// Children `[from_offset, to_offset)` of `parent` render exactly the
/// document content between `from` and `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseRange {
    pub parent: SurfaceId,
    pub from_offset: usize,
    pub to_offset: usize,
    pub from: usize,
    pub to: usize,
}

/// Per-node parse override supplied by the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOverride {
    /// The surface node renders this known document node; take it verbatim.
    UseKnown(Node),
    /// A host artifact; skip it and its subtree.
    Ignore,
    /// No override, parse the node by its tag.
    Parse,
}

/// What the reconciler needs from the layer that projects the document onto
/// the surface.
pub trait SurfaceView {
    fn surface(&self) -> &Surface;

    /// Maps a document span to the surface children rendering it. The
    /// returned span may be wider than the requested one.
    fn parse_range(&self, from: usize, to: usize) -> Option<ParseRange>;

    fn node_override(&self, id: SurfaceId) -> NodeOverride;

    /// Document size covered by the view descriptor of a surface node, `None`
    /// when the node was not produced by the view.
    fn descriptor_size(&self, id: SurfaceId) -> Option<usize>;

    /// Whether the surface node was produced by the view.
    fn is_descriptor_node(&self, id: SurfaceId) -> bool {
        self.descriptor_size(id).is_some()
    }

    /// Document position of a surface point, when the point lies inside
    /// rendered content.
    fn pos_from_point(&self, point: SurfacePoint) -> Option<usize>;

    /// The host's native selection, when it lies inside the surface.
    fn native_selection(&self) -> Option<SurfaceSelection> {
        let surface = self.surface();
        surface
            .selection()
            .filter(|sel| surface.is_attached(sel.anchor.node) && surface.is_attached(sel.head.node))
    }
}

/// A view that can re-project a document version onto its surface.
pub trait Projection: SurfaceView {
    fn project(&mut self, doc: &Node, selection: Option<Selection>);
}
