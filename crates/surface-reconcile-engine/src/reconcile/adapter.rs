use log::debug;
use surface_reconcile_model::{Node, Selection};

use crate::parse::{ParseOptions, Whitespace, parse};
use crate::quirks::{Quirk, QuirkPolicy};
use crate::reconcile::normalize::Span;
use crate::surface::SurfaceId;
use crate::view::SurfaceView;

/// The current surface content of a document span, parsed back into a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSpan {
    /// Node of the same kind as the span's parent, holding the parsed
    /// content. Its content starts at document position `from`.
    pub doc: Node,
    /// Native selection translated into document positions.
    pub hint: Option<Selection>,
    pub from: usize,
    pub to: usize,
}

/// Parses the surface region rendering `span`. The region may be wider than
/// the span; `from`/`to` of the result describe what was actually parsed.
pub fn parse_between(
    view: &dyn SurfaceView,
    doc: &Node,
    quirks: &QuirkPolicy,
    span: Span,
    after_backspace: bool,
) -> Option<ParsedSpan> {
    let range = view.parse_range(span.from, span.to)?;
    let surface = view.surface();

    let find = match view.native_selection() {
        Some(sel) if sel.is_collapsed() => vec![sel.anchor],
        Some(sel) => vec![sel.anchor, sel.head],
        None => Vec::new(),
    };

    let mut to_offset = range.to_offset;
    if after_backspace && quirks.has(Quirk::StrayBreakOnBackspace) {
        to_offset = exclude_stray_break(view, range.parent, range.from_offset, to_offset);
    }

    let start = doc.resolve(range.from).ok()?;
    let top = start.parent();
    let overrides = |id: SurfaceId| view.node_override(id);
    let mut options = ParseOptions::new(top.kind());
    options.top_attrs = top.attrs().clone();
    options.top_open = true;
    options.from = range.from_offset;
    options.to = Some(to_offset);
    options.whitespace = if top.kind().is_code() {
        Whitespace::Full
    } else {
        Whitespace::Preserve
    };
    options.find = find;
    options.overrides = Some(&overrides);
    let parsed = parse(surface, range.parent, options);

    let hint = match parsed.found.as_slice() {
        [Some(anchor), rest @ ..] => {
            let head = rest.first().copied().flatten().unwrap_or(*anchor);
            Some(Selection::new(range.from + anchor, range.from + head))
        }
        _ => None,
    };
    debug!(
        "parsed surface children {}..{} as {} for {}..{}",
        range.from_offset, to_offset, parsed.node, range.from, range.to
    );
    Some(ParsedSpan {
        doc: parsed.node,
        hint,
        from: range.from,
        to: range.to,
    })
}

/// Drops a trailing `<br>` the host left behind after Backspace. Zero-size
/// view nodes before it are skipped over.
fn exclude_stray_break(view: &dyn SurfaceView, parent: SurfaceId, from_offset: usize, to_offset: usize) -> usize {
    let surface = view.surface();
    for offset in (from_offset + 1..=to_offset).rev() {
        let Some(&node) = surface.children(parent).get(offset - 1) else {
            break;
        };
        let size = view.descriptor_size(node);
        if surface.tag(node) == Some("br") && size.is_none() {
            debug!("excluding stray break at surface offset {}", offset - 1);
            return offset - 1;
        }
        if size.is_none_or(|size| size > 0) {
            break;
        }
    }
    to_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MirrorView;
    use crate::surface::{SurfacePoint, SurfaceSelection};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use surface_reconcile_model::builders::*;

    #[test]
    fn test_parse_inside_textblock_with_hint() {
        let old = doc([p([t("hello")])]);
        let mut view = MirrorView::new(&old, QuirkPolicy::all());
        let text = view.surface().find_text("hello").unwrap().node;
        let surface = view.surface_mut();
        surface.set_text(text, "helloo");
        surface.set_selection(Some(SurfaceSelection::caret(SurfacePoint { node: text, offset: 6 })));

        let parsed = parse_between(&view, &old, &QuirkPolicy::all(), Span::new(1, 6), false).unwrap();
        assert_eq!(parsed.doc, p([t("helloo")]));
        assert_eq!((parsed.from, parsed.to), (1, 6));
        assert_eq!(parsed.hint, Some(Selection::caret(7)));
    }

    #[test]
    fn test_parse_keeps_whitespace() {
        let old = doc([p([t("a")])]);
        let mut view = MirrorView::new(&old, QuirkPolicy::none());
        let text = view.surface().find_text("a").unwrap().node;
        view.surface_mut().set_text(text, "a  b ");
        let parsed = parse_between(&view, &old, &QuirkPolicy::none(), Span::new(1, 2), false).unwrap();
        assert_eq!(parsed.doc, p([t("a  b ")]));
    }

    #[test]
    fn test_stray_break_after_backspace() {
        let old = doc([p([t("ab")]), p([t("cd")])]);
        let mut view = MirrorView::new(&old, QuirkPolicy::all());
        let root = view.surface().root();
        let surface = view.surface_mut();
        let stray = surface.create_element("br", BTreeMap::new());
        surface.append(root, stray);

        let policy = QuirkPolicy::all();
        let with_quirk = parse_between(&view, &old, &policy, Span::new(0, 8), true).unwrap();
        assert_eq!(with_quirk.doc, doc([p([t("ab")]), p([t("cd")])]));

        let without = parse_between(&view, &old, &policy, Span::new(0, 8), false).unwrap();
        assert_eq!(without.doc, doc([p([t("ab")]), p([t("cd")])]));
    }

    #[test]
    fn test_stray_break_not_last_is_parsed_without_quirk() {
        let old = doc([p([t("ab")])]);
        let mut view = MirrorView::new(&old, QuirkPolicy::none());
        let root = view.surface().root();
        let surface = view.surface_mut();
        let stray = surface.create_element("br", BTreeMap::new());
        surface.append(root, stray);
        let trailing = surface.create_text("x");
        surface.append(root, trailing);

        let parsed = parse_between(&view, &old, &QuirkPolicy::none(), Span::new(0, 4), true).unwrap();
        assert_eq!(parsed.doc, doc([p([t("ab")]), p([br(), t("x")])]));
    }
}
