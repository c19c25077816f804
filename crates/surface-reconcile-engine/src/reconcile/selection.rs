use surface_reconcile_model::{Node, Selection, first_textblock_pos};

use crate::view::SurfaceView;

/// Resolves a parsed selection hint against `doc`.
///
/// A hint pointing past the end of the document is discarded. Ends that do
/// not land in a textblock move forward to the next one.
pub fn resolve_hint(doc: &Node, hint: Selection) -> Option<Selection> {
    if hint.anchor.max(hint.head) > doc.content_size() {
        return None;
    }
    let snap = |pos: usize| first_textblock_pos(doc, pos).unwrap_or(pos);
    Some(Selection::new(snap(hint.anchor), snap(hint.head)))
}

/// Reads the host's native selection as a document selection.
pub fn selection_from_surface(view: &dyn SurfaceView, doc: &Node) -> Option<Selection> {
    let native = view.native_selection()?;
    let head = view.pos_from_point(native.head)?;
    let anchor = if native.is_collapsed() {
        head
    } else {
        view.pos_from_point(native.anchor)?
    };
    resolve_hint(doc, Selection::new(anchor, head))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MirrorView;
    use crate::quirks::QuirkPolicy;
    use crate::surface::{SurfacePoint, SurfaceSelection};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use surface_reconcile_model::builders::*;

    #[rstest]
    #[case(Selection::caret(2), Some(Selection::caret(2)))]
    #[case(Selection::new(1, 8), Some(Selection::new(1, 8)))]
    #[case(Selection::caret(4), Some(Selection::caret(5)))]
    #[case(Selection::caret(9), None)]
    #[case(Selection::new(2, 500), None)]
    fn test_resolve_hint(#[case] hint: Selection, #[case] expected: Option<Selection>) {
        let doc = doc([p([t("ab")]), p([t("cd")])]);
        assert_eq!(resolve_hint(&doc, hint), expected);
    }

    #[test]
    fn test_selection_from_surface() {
        let doc = doc([p([t("ab")]), p([t("cd")])]);
        let mut view = MirrorView::new(&doc, QuirkPolicy::none());
        let ab = view.surface().find_text("ab").unwrap().node;
        let cd = view.surface().find_text("cd").unwrap().node;
        view.surface_mut().set_selection(Some(SurfaceSelection {
            anchor: SurfacePoint { node: ab, offset: 1 },
            head: SurfacePoint { node: cd, offset: 2 },
        }));
        assert_eq!(selection_from_surface(&view, &doc), Some(Selection::new(2, 7)));
    }

    #[test]
    fn test_no_native_selection() {
        let doc = doc([p([t("ab")])]);
        let view = MirrorView::new(&doc, QuirkPolicy::none());
        assert_eq!(selection_from_surface(&view, &doc), None);
    }
}
