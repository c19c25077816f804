//! # Surface Parser - Permissive Surface to Document Parsing
//!
//! Turns a range of surface children into a document node of a given top
//! kind. The schema's content rules act as the grammar: a node that does not
//! fit the current context either closes open contexts until it fits, gets
//! wrapped (`paragraph`, `list_item`, `bullet_list`) or is dropped. The parse
//! never fails; unknown markup degrades to its text.
//!
//! ## Contexts
//!
//! The parser keeps a stack of open contexts. Contexts opened for a surface
//! element are *solid*: skipping past one to place a node costs a penalty, so
//! content prefers to stay inside the element it came from. Wrapper contexts
//! created on demand are not solid.
//!
//! ## Position finding
//!
//! Callers may ask for surface points (usually the native selection) to be
//! translated into positions in the parsed output. Points are recorded as the
//! parser walks past them, so they are relative to the start of the top
//! node's content.

use std::collections::VecDeque;

use log::trace;
use surface_reconcile_model::{Attrs, Fragment, Mark, MarkSet, Node, NodeKind};

use crate::surface::{Surface, SurfaceData, SurfaceId, SurfacePoint};
use crate::view::NodeOverride;

/// Kinds the parser may insert on its own to make content fit.
const WRAPPERS: [NodeKind; 3] = [NodeKind::Paragraph, NodeKind::ListItem, NodeKind::BulletList];

/// Unknown elements that still imply a block boundary.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "div", "dl", "fieldset", "footer", "form", "header", "hr",
    "main", "nav", "section", "table",
];

/// How text whitespace is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Whitespace {
    /// Runs of whitespace collapse to one space; leading and trailing
    /// whitespace in a block is dropped.
    #[default]
    Collapse,
    /// Whitespace is kept but newlines become spaces.
    Preserve,
    /// Whitespace is kept verbatim.
    Full,
}

pub struct ParseOptions<'a> {
    /// Kind of the node the parsed content goes into.
    pub top: NodeKind,
    pub top_attrs: Attrs,
    /// Leave the top node open at its end (no content filling).
    pub top_open: bool,
    /// First child of the parsed element to include.
    pub from: usize,
    /// Child to stop before, all children when `None`.
    pub to: Option<usize>,
    pub whitespace: Whitespace,
    /// Surface points to translate into parsed positions.
    pub find: Vec<SurfacePoint>,
    pub overrides: Option<&'a dyn Fn(SurfaceId) -> NodeOverride>,
}

impl ParseOptions<'_> {
    pub fn new(top: NodeKind) -> Self {
        Self {
            top,
            top_attrs: Attrs::new(),
            top_open: false,
            from: 0,
            to: None,
            whitespace: Whitespace::default(),
            find: Vec::new(),
            overrides: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub node: Node,
    /// One entry per requested point, `None` when the point was not passed.
    pub found: Vec<Option<usize>>,
}

enum TagRule {
    Block(NodeKind, Attrs),
    Leaf(Node),
    Mark(Mark),
}

struct Context {
    id: usize,
    kind: NodeKind,
    attrs: Attrs,
    content: Vec<Node>,
    whitespace: Whitespace,
    solid: bool,
}

/// Parses children `[options.from, options.to)` of `parent`.
pub fn parse(surface: &Surface, parent: SurfaceId, options: ParseOptions<'_>) -> Parsed {
    let to = options
        .to
        .unwrap_or(surface.children(parent).len())
        .min(surface.children(parent).len());
    let from = options.from.min(to);
    let mut parser = SurfaceParser::new(surface, options);
    parser.add_all(parent, from, to);
    parser.finish()
}

/// Parses standalone markup into a document.
pub fn parse_document(markup: &str) -> Node {
    let surface = Surface::from_markup(markup);
    parse(&surface, surface.root(), ParseOptions::new(NodeKind::Doc)).node
}

struct SurfaceParser<'s, 'o> {
    surface: &'s Surface,
    options: ParseOptions<'o>,
    contexts: Vec<Context>,
    marks: MarkSet,
    found: Vec<Option<usize>>,
    next_id: usize,
}

impl<'s, 'o> SurfaceParser<'s, 'o> {
    fn new(surface: &'s Surface, options: ParseOptions<'o>) -> Self {
        let top = Context {
            id: 0,
            kind: options.top,
            attrs: options.top_attrs.clone(),
            content: Vec::new(),
            whitespace: if options.top.is_code() {
                Whitespace::Full
            } else {
                options.whitespace
            },
            solid: true,
        };
        let found = vec![None; options.find.len()];
        Self {
            surface,
            options,
            contexts: vec![top],
            marks: MarkSet::none(),
            found,
            next_id: 1,
        }
    }

    fn top(&self) -> &Context {
        // The top-level context is never popped before `finish`.
        &self.contexts[self.contexts.len() - 1]
    }

    fn add_all(&mut self, parent: SurfaceId, from: usize, to: usize) {
        let children = self.surface.children(parent).to_vec();
        for (index, &child) in children.iter().enumerate().take(to).skip(from) {
            self.find_at_point(parent, index);
            self.add_node(child);
        }
        self.find_at_point(parent, to);
    }

    fn add_node(&mut self, id: SurfaceId) {
        match self.surface.data(id) {
            SurfaceData::Text(text) => {
                let text = text.clone();
                self.add_text(&text, Some(id));
            }
            SurfaceData::Element { .. } => self.add_element(id),
        }
    }

    fn add_text(&mut self, raw: &str, id: Option<SurfaceId>) {
        let top = self.top();
        let whitespace = top.whitespace;
        let keep = top.kind.is_textblock()
            || whitespace == Whitespace::Full
            || raw.chars().any(|c| !is_space(c));
        if !keep {
            if let Some(id) = id {
                self.find_inside(id);
            }
            return;
        }
        let value = match whitespace {
            Whitespace::Collapse => {
                let mut value = collapse_spaces(raw);
                if value.starts_with(' ') && self.strips_leading_space(id) {
                    value.remove(0);
                }
                value
            }
            Whitespace::Preserve => raw.replace("\r\n", " ").replace(['\n', '\r'], " "),
            Whitespace::Full => raw.replace("\r\n", "\n").replace('\r', "\n"),
        };
        if !value.is_empty() {
            self.insert_node(Node::text(value, MarkSet::none()), false);
        }
        if let Some(id) = id {
            self.find_in_text(id, raw.chars().count());
        }
    }

    /// Leading collapsed space is dropped at the start of a block, after a
    /// break and after text that already ends in whitespace.
    fn strips_leading_space(&self, id: Option<SurfaceId>) -> bool {
        let after_break = id
            .and_then(|id| {
                let index = self.surface.index_in_parent(id)?;
                let parent = self.surface.parent(id)?;
                let before = *self.surface.children(parent).get(index.checked_sub(1)?)?;
                Some(self.surface.tag(before) == Some("br"))
            })
            .unwrap_or(false);
        match self.top().content.last() {
            None => true,
            Some(last) => {
                after_break
                    || last
                        .text_value()
                        .is_some_and(|text| text.ends_with(is_space))
            }
        }
    }

    fn add_element(&mut self, id: SurfaceId) {
        let overridden = self
            .options
            .overrides
            .map_or(NodeOverride::Parse, |rule| rule(id));
        match overridden {
            NodeOverride::Ignore => {
                trace!("ignoring surface node {id:?}");
                self.find_inside(id);
            }
            NodeOverride::UseKnown(node) => {
                self.insert_node(node, false);
                self.find_inside(id);
            }
            NodeOverride::Parse => match self.match_tag(id) {
                Some(rule) => self.add_by_rule(id, rule),
                None => self.add_unknown(id),
            },
        }
    }

    fn add_by_rule(&mut self, id: SurfaceId, rule: TagRule) {
        let child_count = self.surface.children(id).len();
        match rule {
            TagRule::Leaf(node) => {
                let is_break = node.kind() == NodeKind::HardBreak;
                if !self.insert_node(node, is_break) && is_break && self.top().kind.is_textblock() {
                    self.add_text("\n", None);
                }
                self.find_inside(id);
            }
            TagRule::Block(kind, attrs) => {
                let entered = self.enter(kind, attrs);
                self.add_all(id, 0, child_count);
                if let Some(context) = entered {
                    self.close_context(context);
                }
            }
            TagRule::Mark(mark) => {
                let outer = self.marks.clone();
                self.marks = mark.add_to(&outer);
                self.add_all(id, 0, child_count);
                self.marks = outer;
            }
        }
    }

    /// Unknown elements are transparent. Childless ones are dropped, block
    /// level ones close an open inline context first.
    fn add_unknown(&mut self, id: SurfaceId) {
        let child_count = self.surface.children(id).len();
        let is_block = self
            .surface
            .tag(id)
            .is_some_and(|tag| BLOCK_TAGS.contains(&tag));
        if !is_block && child_count == 0 {
            trace!("dropping unknown empty element {:?}", self.surface.tag(id));
            self.find_inside(id);
            return;
        }
        if is_block
            && self.contexts.len() > 1
            && self.top().content.first().is_some_and(Node::is_inline)
        {
            self.close_top();
        }
        let depth = self.contexts.len() - 1;
        self.add_all(id, 0, child_count);
        if is_block {
            self.close_to(depth);
        }
    }

    fn match_tag(&self, id: SurfaceId) -> Option<TagRule> {
        let surface = self.surface;
        let tag = surface.tag(id)?;
        let rule = match tag {
            "p" => TagRule::Block(NodeKind::Paragraph, Attrs::new()),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse().unwrap_or(1);
                TagRule::Block(NodeKind::Heading(level), Attrs::new())
            }
            "pre" => TagRule::Block(NodeKind::CodeBlock, Attrs::new()),
            "blockquote" => TagRule::Block(NodeKind::Blockquote, Attrs::new()),
            "ul" => TagRule::Block(NodeKind::BulletList, Attrs::new()),
            "ol" => TagRule::Block(NodeKind::OrderedList, Attrs::new()),
            "li" => TagRule::Block(NodeKind::ListItem, Attrs::new()),
            "br" => TagRule::Leaf(Node::leaf(NodeKind::HardBreak, Attrs::new(), MarkSet::none())),
            "img" => {
                let src = surface.attr(id, "src")?;
                let mut attrs = Attrs::from([("src".to_string(), src.to_string())]);
                for name in ["alt", "title"] {
                    if let Some(value) = surface.attr(id, name) {
                        attrs.insert(name.to_string(), value.to_string());
                    }
                }
                TagRule::Leaf(Node::leaf(NodeKind::Image, attrs, MarkSet::none()))
            }
            "em" | "i" => TagRule::Mark(Mark::Em),
            "strong" | "b" => TagRule::Mark(Mark::Strong),
            "code" => TagRule::Mark(Mark::Code),
            "a" => TagRule::Mark(Mark::Link {
                href: surface.attr(id, "href")?.to_string(),
            }),
            _ => return None,
        };
        Some(rule)
    }

    /// Opens a context for `kind`, closing or wrapping as needed. Returns the
    /// context id, or `None` when the kind fits nowhere.
    fn enter(&mut self, kind: NodeKind, attrs: Attrs) -> Option<usize> {
        if !self.find_place(kind, false) {
            trace!("no place for {kind}, parsing its content in place");
            return None;
        }
        Some(self.push_context(kind, attrs, true))
    }

    fn push_context(&mut self, kind: NodeKind, attrs: Attrs, solid: bool) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        let whitespace = if kind.is_code() {
            Whitespace::Full
        } else {
            self.top().whitespace
        };
        self.contexts.push(Context {
            id,
            kind,
            attrs,
            content: Vec::new(),
            whitespace,
            solid,
        });
        id
    }

    fn insert_node(&mut self, node: Node, cautious: bool) -> bool {
        if !self.find_place(node.kind(), cautious) {
            trace!("dropping {node}: no place in context");
            return false;
        }
        let top = self.top();
        let marks = if top.kind.allows_marks() {
            node.marks()
                .iter()
                .fold(self.marks.clone(), |set, mark| mark.add_to(&set))
        } else {
            MarkSet::none()
        };
        let node = node.with_marks(marks);
        let last = self.contexts.len() - 1;
        self.contexts[last].content.push(node);
        true
    }

    /// Finds the context that can hold `kind` with the shortest wrapping
    /// route, closes the contexts above it and opens the wrappers.
    fn find_place(&mut self, kind: NodeKind, cautious: bool) -> bool {
        let mut best: Option<(usize, Vec<NodeKind>)> = None;
        let mut penalty = 0;
        for depth in (0..self.contexts.len()).rev() {
            let context = &self.contexts[depth];
            if let Some(route) = find_wrapping(context.kind, kind)
                && best
                    .as_ref()
                    .is_none_or(|(_, best)| best.len() > route.len() + penalty)
            {
                let direct = route.is_empty();
                best = Some((depth, route));
                if direct {
                    break;
                }
            }
            if context.solid {
                if cautious {
                    break;
                }
                penalty += 2;
            }
        }
        let Some((depth, route)) = best else {
            return false;
        };
        self.close_to(depth);
        for wrapper in route {
            trace!("wrapping in {wrapper}");
            self.push_context(wrapper, Attrs::new(), false);
        }
        true
    }

    fn close_context(&mut self, id: usize) {
        if let Some(index) = self.contexts.iter().position(|cx| cx.id == id) {
            self.close_to(index);
            if index > 0 {
                self.close_top();
            }
        }
    }

    /// Closes every context above `depth`.
    fn close_to(&mut self, depth: usize) {
        while self.contexts.len() > depth + 1 {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        let Some(context) = self.contexts.pop() else {
            return;
        };
        let node = finish_context(context, false);
        if let Some(parent) = self.contexts.last_mut() {
            parent.content.push(node);
        }
    }

    fn finish(mut self) -> Parsed {
        self.close_to(0);
        let node = match self.contexts.pop() {
            Some(top) => finish_context(top, self.options.top_open),
            None => Node::new(self.options.top, self.options.top_attrs.clone(), Fragment::empty()),
        };
        Parsed {
            node,
            found: self.found,
        }
    }

    /// Position after everything parsed so far, relative to the top content.
    fn current_pos(&self) -> usize {
        self.contexts
            .iter()
            .enumerate()
            .map(|(depth, cx)| {
                cx.content.iter().map(Node::node_size).sum::<usize>() + usize::from(depth > 0)
            })
            .sum()
    }

    fn find_at_point(&mut self, parent: SurfaceId, offset: usize) {
        let pos = self.current_pos();
        for (point, found) in self.options.find.iter().zip(self.found.iter_mut()) {
            if point.node == parent && point.offset == offset {
                *found = Some(pos);
            }
        }
    }

    fn find_inside(&mut self, id: SurfaceId) {
        let pos = self.current_pos();
        for (point, found) in self.options.find.iter().zip(self.found.iter_mut()) {
            if found.is_none() && self.surface.contains(id, point.node) {
                *found = Some(pos);
            }
        }
    }

    fn find_in_text(&mut self, id: SurfaceId, len: usize) {
        let pos = self.current_pos();
        for (point, found) in self.options.find.iter().zip(self.found.iter_mut()) {
            if point.node == id {
                *found = Some(pos.saturating_sub(len.saturating_sub(point.offset)));
            }
        }
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\u{c}')
}

fn collapse_spaces(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.chars() {
        if is_space(c) {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn finish_context(context: Context, open_end: bool) -> Node {
    let mut content = context.content;
    if context.whitespace == Whitespace::Collapse
        && let Some(last) = content.last_mut()
        && let Some(text) = last.text_value()
        && text.ends_with(is_space)
    {
        let trimmed = text.trim_end_matches(is_space).to_string();
        *last = last.with_text(trimmed);
    }
    let content = Fragment::from_nodes(content);
    if !open_end && content.child_count() == 0 && context.kind.requires_content() {
        return filled(context.kind, context.attrs);
    }
    Node::new(context.kind, context.attrs, content)
}

/// An empty node of `kind` with the minimal content its rule requires.
pub(crate) fn filled(kind: NodeKind, attrs: Attrs) -> Node {
    let content = match kind.fill_kind() {
        Some(child) if kind.requires_content() => Fragment::from_nodes([filled(child, Attrs::new())]),
        _ => Fragment::empty(),
    };
    Node::new(kind, attrs, content)
}

/// The shortest list of wrapper kinds that lets `child` sit inside `parent`,
/// outermost first. Empty when it fits directly.
fn find_wrapping(parent: NodeKind, child: NodeKind) -> Option<Vec<NodeKind>> {
    if parent.allows(child) {
        return Some(Vec::new());
    }
    let mut queue = VecDeque::from([(parent, Vec::new())]);
    while let Some((kind, route)) = queue.pop_front() {
        if route.len() >= WRAPPERS.len() {
            continue;
        }
        for wrapper in WRAPPERS {
            if !kind.allows(wrapper) || route.contains(&wrapper) {
                continue;
            }
            let mut next = route.clone();
            next.push(wrapper);
            if wrapper.allows(child) {
                return Some(next);
            }
            queue.push_back((wrapper, next));
        }
    }
    None
}
