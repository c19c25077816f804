//! # Mirror View - Reference Projection of a Document onto a Surface
//!
//! [`MirrorView`] renders a document into a [`Surface`] and remembers, for
//! every rendered surface node, which part of the document it stands for.
//! These records are the view descriptors the reconciler asks about: which
//! surface children render a document span, which nodes are known atoms and
//! which are rendering artifacts.
//!
//! Rendering is a full rebuild every time. Old surface nodes are detached,
//! not reused, so stale ids never resolve to live descriptors.
//!
//! ## Rendering rules
//!
//! - Blocks render as their usual tags; code blocks render as a bare `pre`.
//! - Inline nodes sharing an outer mark share one wrapper element, nested in
//!   mark rank order.
//! - A textblock that is empty, or whose last inline node is not text or is
//!   text ending in a newline, gets a trailing `<br>` so the host keeps the
//!   line open. That break has a zero-size descriptor and is ignored when
//!   parsing.

use std::collections::{BTreeMap, HashMap};

use surface_reconcile_model::{Attrs, Fragment, Mark, MarkSet, Node, NodeKind, Selection};

use crate::quirks::{Quirk, QuirkPolicy};
use crate::surface::{Surface, SurfaceId, SurfacePoint, SurfaceSelection};
use crate::view::{NodeOverride, ParseRange, Projection, SurfaceView};

#[derive(Debug, Clone)]
enum DescRole {
    Node(Node),
    Text(Node),
    Mark,
    TrailingBreak,
}

#[derive(Debug, Clone)]
struct Desc {
    role: DescRole,
    dom: SurfaceId,
    content_dom: Option<SurfaceId>,
    parent: Option<usize>,
    children: Vec<usize>,
    size: usize,
    border: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Start,
    End,
}

#[derive(Debug, Clone)]
pub struct MirrorView {
    surface: Surface,
    descs: Vec<Desc>,
    by_dom: HashMap<SurfaceId, usize>,
    quirks: QuirkPolicy,
}

impl MirrorView {
    pub fn new(doc: &Node, quirks: QuirkPolicy) -> Self {
        let mut view = Self {
            surface: Surface::new(),
            descs: Vec::new(),
            by_dom: HashMap::new(),
            quirks,
        };
        view.render(doc, None);
        view
    }

    /// Host access to the live surface, used to simulate native edits.
    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn quirks(&self) -> &QuirkPolicy {
        &self.quirks
    }

    /// Re-renders `doc` and places the native selection.
    pub fn render(&mut self, doc: &Node, selection: Option<Selection>) {
        let root = self.surface.root();
        for child in self.surface.children(root).to_vec() {
            self.surface.remove(child);
        }
        self.descs.clear();
        self.by_dom.clear();
        self.descs.push(Desc {
            role: DescRole::Node(doc.clone()),
            dom: root,
            content_dom: Some(root),
            parent: None,
            children: Vec::new(),
            size: doc.content_size(),
            border: 0,
        });
        self.by_dom.insert(root, 0);
        self.render_content(0, root, doc);

        let native = selection.and_then(|sel| {
            Some(SurfaceSelection {
                anchor: self.point_for_pos(sel.anchor)?,
                head: self.point_for_pos(sel.head)?,
            })
        });
        self.surface.set_selection(native);
    }

    fn add_desc(&mut self, parent: usize, desc: Desc) -> usize {
        let index = self.descs.len();
        self.by_dom.insert(desc.dom, index);
        self.descs.push(Desc {
            parent: Some(parent),
            ..desc
        });
        self.descs[parent].children.push(index);
        index
    }

    fn render_content(&mut self, desc: usize, dom: SurfaceId, node: &Node) {
        let children: Vec<Node> = node.content().iter().cloned().collect();
        if !node.is_textblock() {
            for child in &children {
                self.render_block(desc, dom, child);
            }
            return;
        }
        self.render_inlines(desc, dom, &children, 0);
        let needs_break = children
            .last()
            .is_none_or(|last| last.text_value().is_none_or(|text| text.ends_with('\n')));
        if needs_break {
            let br = self.surface.create_element("br", BTreeMap::new());
            self.surface.append(dom, br);
            self.add_desc(
                desc,
                Desc {
                    role: DescRole::TrailingBreak,
                    dom: br,
                    content_dom: None,
                    parent: None,
                    children: Vec::new(),
                    size: 0,
                    border: 0,
                },
            );
        }
    }

    fn render_block(&mut self, parent: usize, parent_dom: SurfaceId, node: &Node) {
        let tag = match node.kind() {
            NodeKind::Paragraph => "p".to_string(),
            NodeKind::Heading(level) => format!("h{level}"),
            NodeKind::CodeBlock => "pre".to_string(),
            NodeKind::Blockquote => "blockquote".to_string(),
            NodeKind::BulletList => "ul".to_string(),
            NodeKind::OrderedList => "ol".to_string(),
            NodeKind::ListItem => "li".to_string(),
            _ => "div".to_string(),
        };
        let dom = self.surface.create_element(&tag, BTreeMap::new());
        self.surface.append(parent_dom, dom);
        let desc = self.add_desc(
            parent,
            Desc {
                role: DescRole::Node(node.clone()),
                dom,
                content_dom: Some(dom),
                parent: None,
                children: Vec::new(),
                size: node.node_size(),
                border: 1,
            },
        );
        self.render_content(desc, dom, node);
    }

    /// Renders inline nodes whose first `level` marks are already wrapped.
    fn render_inlines(&mut self, parent: usize, parent_dom: SurfaceId, nodes: &[Node], level: usize) {
        let mut i = 0;
        while i < nodes.len() {
            let Some(mark) = nodes[i].marks().get(level) else {
                self.render_inline(parent, parent_dom, &nodes[i]);
                i += 1;
                continue;
            };
            let end = nodes[i..]
                .iter()
                .position(|node| node.marks().get(level) != Some(mark))
                .map_or(nodes.len(), |n| i + n);
            let attrs = match mark {
                Mark::Link { href } => BTreeMap::from([("href".to_string(), href.clone())]),
                _ => BTreeMap::new(),
            };
            let tag = match mark {
                Mark::Link { .. } => "a",
                Mark::Em => "em",
                Mark::Strong => "strong",
                Mark::Code => "code",
            };
            let dom = self.surface.create_element(tag, attrs);
            self.surface.append(parent_dom, dom);
            let desc = self.add_desc(
                parent,
                Desc {
                    role: DescRole::Mark,
                    dom,
                    content_dom: Some(dom),
                    parent: None,
                    children: Vec::new(),
                    size: nodes[i..end].iter().map(Node::node_size).sum(),
                    border: 0,
                },
            );
            self.render_inlines(desc, dom, &nodes[i..end], level + 1);
            i = end;
        }
    }

    fn render_inline(&mut self, parent: usize, parent_dom: SurfaceId, node: &Node) {
        let (dom, role) = match node.text_value() {
            Some(text) => (self.surface.create_text(text), DescRole::Text(node.clone())),
            None => {
                let tag = if node.kind() == NodeKind::Image { "img" } else { "br" };
                let dom = self.surface.create_element(tag, node.attrs().clone());
                (dom, DescRole::Node(node.clone()))
            }
        };
        self.surface.append(parent_dom, dom);
        self.add_desc(
            parent,
            Desc {
                role,
                dom,
                content_dom: None,
                parent: None,
                children: Vec::new(),
                size: node.node_size(),
                border: 0,
            },
        );
    }

    fn pos_at_start(&self, desc: usize) -> usize {
        match self.descs[desc].parent {
            None => 0,
            Some(parent) => self.pos_before_child(parent, desc) + self.descs[desc].border,
        }
    }

    fn pos_at_end(&self, desc: usize) -> usize {
        let d = &self.descs[desc];
        self.pos_at_start(desc) + d.size - 2 * d.border
    }

    fn pos_before_child(&self, parent: usize, child: usize) -> usize {
        let mut pos = self.pos_at_start(parent);
        for &sibling in &self.descs[parent].children {
            if sibling == child {
                break;
            }
            pos += self.descs[sibling].size;
        }
        pos
    }

    /// Whether the first or last content child of a descriptor covers nothing.
    fn empty_child_at(&self, desc: usize, side: Side) -> bool {
        let d = &self.descs[desc];
        if d.border > 0 || d.content_dom.is_none() {
            return false;
        }
        let child = match side {
            Side::Start => d.children.first(),
            Side::End => d.children.last(),
        };
        child.is_some_and(|&child| self.descs[child].size == 0 || self.empty_child_at(child, side))
    }

    fn next_sibling(&self, id: SurfaceId) -> Option<SurfaceId> {
        let parent = self.surface.parent(id)?;
        let index = self.surface.index_in_parent(id)?;
        self.surface.children(parent).get(index + 1).copied()
    }

    /// The innermost descriptor of a document node around `dom`.
    fn nearest_desc(&self, dom: SurfaceId) -> Option<usize> {
        let mut cur = Some(dom);
        while let Some(id) = cur {
            if let Some(&desc) = self.by_dom.get(&id)
                && matches!(self.descs[desc].role, DescRole::Node(_) | DescRole::Text(_))
            {
                return Some(desc);
            }
            cur = self.surface.parent(id);
        }
        None
    }

    fn local_pos_from_dom(&self, desc: usize, dom: SurfaceId, offset: usize) -> Option<usize> {
        let d = &self.descs[desc];
        if let DescRole::Text(node) = &d.role
            && d.dom == dom
        {
            return Some(self.pos_at_start(desc) + offset.min(node.node_size()));
        }
        let container = if self.surface.is_text(dom) {
            self.surface.parent(dom)?
        } else {
            dom
        };
        if let Some(content) = d.content_dom
            && self.surface.contains(content, container)
        {
            let mut after = if dom == content {
                self.surface.children(content).get(offset).copied()
            } else {
                let mut cur = dom;
                while self.surface.parent(cur) != Some(content) {
                    cur = self.surface.parent(cur)?;
                }
                self.next_sibling(cur)
            };
            while let Some(candidate) = after {
                if let Some(&child) = self.by_dom.get(&candidate)
                    && self.descs[child].parent == Some(desc)
                {
                    return Some(self.pos_before_child(desc, child));
                }
                after = self.next_sibling(candidate);
            }
            return Some(self.pos_at_end(desc));
        }
        let at_start = offset == 0 && self.is_edge_of(desc, dom, Side::Start);
        Some(if at_start {
            self.pos_at_start(desc)
        } else {
            self.pos_at_end(desc)
        })
    }

    /// Whether `dom` sits at the start (or end) of the descriptor's element.
    fn is_edge_of(&self, desc: usize, dom: SurfaceId, side: Side) -> bool {
        let root = self.descs[desc].dom;
        if self.surface.children(root).is_empty() {
            return false;
        }
        let mut cur = dom;
        while cur != root {
            let Some(index) = self.surface.index_in_parent(cur) else {
                return false;
            };
            let at_edge = match side {
                Side::Start => index == 0,
                Side::End => self.next_sibling(cur).is_none(),
            };
            if !at_edge {
                return false;
            }
            match self.surface.parent(cur) {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
        true
    }

    /// The surface point that renders a document position.
    pub fn point_for_pos(&self, pos: usize) -> Option<SurfacePoint> {
        let mut desc = 0;
        'descend: loop {
            let d = &self.descs[desc];
            let content = d.content_dom?;
            let mut offset = self.pos_at_start(desc);
            for &child in &d.children {
                let c = &self.descs[child];
                let end = offset + c.size;
                let inside = match c.role {
                    DescRole::Text(_) | DescRole::Mark => pos >= offset && pos <= end,
                    DescRole::Node(_) => c.border > 0 && pos > offset && pos < end,
                    DescRole::TrailingBreak => false,
                };
                if inside {
                    if let DescRole::Text(_) = c.role {
                        return Some(SurfacePoint {
                            node: c.dom,
                            offset: pos - offset,
                        });
                    }
                    desc = child;
                    continue 'descend;
                }
                if pos <= offset {
                    return Some(SurfacePoint {
                        node: content,
                        offset: self.surface.index_in_parent(c.dom)?,
                    });
                }
                offset = end;
            }
            return Some(SurfacePoint {
                node: content,
                offset: self.surface.children(content).len(),
            });
        }
    }
}

fn empty_list_item() -> Node {
    let paragraph = Node::new(NodeKind::Paragraph, Attrs::new(), Fragment::empty());
    Node::new(NodeKind::ListItem, Attrs::new(), Fragment::from_nodes([paragraph]))
}

impl SurfaceView for MirrorView {
    fn surface(&self) -> &Surface {
        &self.surface
    }

    fn parse_range(&self, from: usize, to: usize) -> Option<ParseRange> {
        let mut desc = 0;
        let mut base = 0;
        'descend: loop {
            let d = &self.descs[desc];
            let content = d.content_dom?;
            if d.children.is_empty() {
                return Some(ParseRange {
                    parent: content,
                    from_offset: 0,
                    to_offset: self.surface.children(content).len(),
                    from,
                    to,
                });
            }
            let mut span_from = from;
            let mut from_offset = None;
            let mut offset = base;
            for (i, &child) in d.children.iter().enumerate() {
                let c = &self.descs[child];
                let end = offset + c.size;
                if from_offset.is_none() && from <= end {
                    let child_base = offset + c.border;
                    if from >= child_base
                        && to + c.border <= end
                        && matches!(c.role, DescRole::Node(_))
                        && c.content_dom.is_some_and(|cd| self.surface.contains(content, cd))
                    {
                        desc = child;
                        base = child_base;
                        continue 'descend;
                    }
                    span_from = offset;
                    for &prev in d.children[..i].iter().rev() {
                        let p = &self.descs[prev];
                        if p.size > 0
                            && self.surface.parent(p.dom) == Some(content)
                            && !self.empty_child_at(prev, Side::End)
                        {
                            from_offset = self.surface.index_in_parent(p.dom).map(|index| index + 1);
                            break;
                        }
                        span_from -= p.size;
                    }
                    from_offset.get_or_insert(0);
                }
                if let Some(from_offset) = from_offset
                    && (end > to || i == d.children.len() - 1)
                {
                    let mut span_to = end;
                    let mut to_offset = None;
                    for &next in &d.children[i + 1..] {
                        let n = &self.descs[next];
                        if n.size > 0
                            && self.surface.parent(n.dom) == Some(content)
                            && !self.empty_child_at(next, Side::Start)
                        {
                            to_offset = self.surface.index_in_parent(n.dom);
                            break;
                        }
                        span_to += n.size;
                    }
                    return Some(ParseRange {
                        parent: content,
                        from_offset,
                        to_offset: to_offset.unwrap_or(self.surface.children(content).len()),
                        from: span_from,
                        to: span_to,
                    });
                }
                offset = end;
            }
            return None;
        }
    }

    fn node_override(&self, id: SurfaceId) -> NodeOverride {
        if let Some(&desc) = self.by_dom.get(&id) {
            return match &self.descs[desc].role {
                DescRole::TrailingBreak => NodeOverride::Ignore,
                DescRole::Node(node) if node.is_leaf() => {
                    NodeOverride::UseKnown(node.with_marks(MarkSet::none()))
                }
                _ => NodeOverride::Parse,
            };
        }
        let surface = &self.surface;
        match surface.tag(id) {
            Some("br")
                if self.quirks.has(Quirk::BreakReplacesListItem)
                    && surface
                        .parent(id)
                        .and_then(|parent| surface.tag(parent))
                        .is_some_and(|tag| matches!(tag, "ul" | "ol")) =>
            {
                NodeOverride::UseKnown(empty_list_item())
            }
            Some("br")
                if surface
                    .parent(id)
                    .is_some_and(|parent| surface.children(parent).last() == Some(&id)) =>
            {
                NodeOverride::Ignore
            }
            Some("img")
                if self.quirks.has(Quirk::MarkPlaceholderImage)
                    && surface.attr(id, "mark-placeholder").is_some() =>
            {
                NodeOverride::Ignore
            }
            _ => NodeOverride::Parse,
        }
    }

    fn descriptor_size(&self, id: SurfaceId) -> Option<usize> {
        self.by_dom.get(&id).map(|&desc| self.descs[desc].size)
    }

    fn pos_from_point(&self, point: SurfacePoint) -> Option<usize> {
        if !self.surface.is_attached(point.node) {
            return None;
        }
        let desc = self.nearest_desc(point.node)?;
        self.local_pos_from_dom(desc, point.node, point.offset)
    }
}

impl Projection for MirrorView {
    fn project(&mut self, doc: &Node, selection: Option<Selection>) {
        self.render(doc, selection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use surface_reconcile_model::builders::*;

    fn mirror(doc: &Node) -> MirrorView {
        MirrorView::new(doc, QuirkPolicy::all())
    }

    #[rstest]
    #[case(doc([p([t("ab"), em(t("c"))]), p([])]), "<p>ab<em>c</em></p><p><br></p>")]
    #[case(doc([p([em(t("a")), em(strong(t("b")))])]), "<p><em>a<strong>b</strong></em></p>")]
    #[case(doc([pre("a\n")]), "<pre>a\n<br></pre>")]
    #[case(doc([p([t("a"), br()])]), "<p>a<br><br></p>")]
    #[case(doc([ul([li([p([t("x")])])])]), "<ul><li><p>x</p></li></ul>")]
    #[case(doc([p([link("u", t("l")), img("i.png")])]), "<p><a href=\"u\">l</a><img src=\"i.png\"><br></p>")]
    fn test_render(#[case] doc: Node, #[case] expected: &str) {
        assert_eq!(mirror(&doc).surface().to_markup(), expected);
    }

    #[test]
    fn test_parse_range_inside_textblock() {
        let view = mirror(&doc([p([t("ab")]), p([t("cd")])]));
        let range = view.parse_range(1, 3).unwrap();
        let first = view.surface().children(view.surface().root())[0];
        assert_eq!(
            range,
            ParseRange {
                parent: first,
                from_offset: 0,
                to_offset: 1,
                from: 1,
                to: 3,
            }
        );
    }

    #[test]
    fn test_parse_range_across_blocks() {
        let view = mirror(&doc([p([t("ab")]), p([t("cd")]), p([t("ef")])]));
        let range = view.parse_range(2, 6).unwrap();
        assert_eq!(range.parent, view.surface().root());
        assert_eq!((range.from_offset, range.to_offset), (0, 2));
        assert_eq!((range.from, range.to), (0, 8));
    }

    #[test]
    fn test_parse_range_widens_to_block_boundaries() {
        let view = mirror(&doc([p([t("ab")]), p([]), p([t("cd")])]));
        let range = view.parse_range(5, 7).unwrap();
        assert_eq!((range.from_offset, range.to_offset), (1, 3));
        assert_eq!((range.from, range.to), (4, 10));
    }

    #[test]
    fn test_node_overrides() {
        let mut view = mirror(&doc([p([t("a"), img("i.png")]), p([t("b")])]));
        let root = view.surface().root();
        let first = view.surface().children(root)[0];
        let image = view.surface().children(first)[1];
        let hack = view.surface().children(first)[2];
        assert_eq!(view.node_override(image), NodeOverride::UseKnown(img("i.png")));
        assert_eq!(view.node_override(hack), NodeOverride::Ignore);
        assert_eq!(view.node_override(first), NodeOverride::Parse);

        let second = view.surface().children(root)[1];
        let surface = view.surface_mut();
        let stray = surface.create_element("br", BTreeMap::new());
        surface.append(second, stray);
        let placeholder = surface.create_element(
            "img",
            BTreeMap::from([("mark-placeholder".to_string(), "true".to_string())]),
        );
        surface.insert(second, 0, placeholder);
        assert_eq!(view.node_override(stray), NodeOverride::Ignore);
        assert_eq!(view.node_override(placeholder), NodeOverride::Ignore);
    }

    #[test]
    fn test_break_in_list_reads_as_empty_item() {
        let mut view = mirror(&doc([ul([li([p([t("a")])])])]));
        let list = view.surface().children(view.surface().root())[0];
        let surface = view.surface_mut();
        let stray = surface.create_element("br", BTreeMap::new());
        surface.append(list, stray);
        assert_eq!(view.node_override(stray), NodeOverride::UseKnown(li([p([])])));

        let mut plain = MirrorView::new(&doc([ul([li([p([t("a")])])])]), QuirkPolicy::none());
        let list = plain.surface().children(plain.surface().root())[0];
        let surface = plain.surface_mut();
        let stray = surface.create_element("br", BTreeMap::new());
        surface.append(list, stray);
        assert_eq!(plain.node_override(stray), NodeOverride::Ignore);
    }

    #[test]
    fn test_placeholder_image_parsed_without_quirk() {
        let mut view = MirrorView::new(&doc([p([t("a")])]), QuirkPolicy::none());
        let first = view.surface().children(view.surface().root())[0];
        let surface = view.surface_mut();
        let placeholder = surface.create_element(
            "img",
            BTreeMap::from([("mark-placeholder".to_string(), "true".to_string())]),
        );
        surface.insert(first, 0, placeholder);
        assert_eq!(view.node_override(placeholder), NodeOverride::Parse);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(6)]
    #[case(8)]
    fn test_point_and_pos_agree(#[case] pos: usize) {
        let view = mirror(&doc([p([t("ab")]), p([]), p([t("cd"), em(t("e"))])]));
        let point = view.point_for_pos(pos).unwrap();
        assert_eq!(view.pos_from_point(point), Some(pos));
    }

    #[test]
    fn test_empty_paragraph_point() {
        let view = mirror(&doc([p([t("ab")]), p([])]));
        let second = view.surface().children(view.surface().root())[1];
        assert_eq!(view.point_for_pos(5), Some(SurfacePoint { node: second, offset: 0 }));
        assert_eq!(view.pos_from_point(SurfacePoint { node: second, offset: 0 }), Some(5));
    }

    #[test]
    fn test_render_places_native_selection() {
        let mut view = mirror(&doc([p([t("hello")])]));
        view.render(&doc([p([t("hello")])]), Some(Selection::caret(3)));
        let text = view.surface().find_text("hello").unwrap().node;
        assert_eq!(
            view.native_selection(),
            Some(SurfaceSelection::caret(SurfacePoint { node: text, offset: 2 }))
        );
    }
}
