//! Short constructors for writing documents in tests and fixtures.
//!
//! ```
//! use surface_reconcile_model::builders::*;
//!
//! let d = doc([p([t("a"), em(t("b"))])]);
//! assert_eq!(d.to_string(), r#"doc(paragraph("a", em("b")))"#);
//! ```

use crate::fragment::Fragment;
use crate::mark::{Mark, MarkSet};
use crate::node::{Attrs, Node};
use crate::schema::NodeKind;

fn block(kind: NodeKind, children: impl IntoIterator<Item = Node>) -> Node {
    Node::new(kind, Attrs::new(), Fragment::from_nodes(children))
}

pub fn doc(children: impl IntoIterator<Item = Node>) -> Node {
    block(NodeKind::Doc, children)
}

pub fn p(children: impl IntoIterator<Item = Node>) -> Node {
    block(NodeKind::Paragraph, children)
}

pub fn h(level: u8, children: impl IntoIterator<Item = Node>) -> Node {
    block(NodeKind::Heading(level), children)
}

pub fn pre(text: &str) -> Node {
    block(NodeKind::CodeBlock, [t(text)])
}

pub fn blockquote(children: impl IntoIterator<Item = Node>) -> Node {
    block(NodeKind::Blockquote, children)
}

pub fn ul(children: impl IntoIterator<Item = Node>) -> Node {
    block(NodeKind::BulletList, children)
}

pub fn ol(children: impl IntoIterator<Item = Node>) -> Node {
    block(NodeKind::OrderedList, children)
}

pub fn li(children: impl IntoIterator<Item = Node>) -> Node {
    block(NodeKind::ListItem, children)
}

pub fn t(text: &str) -> Node {
    Node::text(text, MarkSet::none())
}

pub fn br() -> Node {
    Node::leaf(NodeKind::HardBreak, Attrs::new(), MarkSet::none())
}

pub fn img(src: &str) -> Node {
    let attrs = Attrs::from([("src".to_string(), src.to_string())]);
    Node::leaf(NodeKind::Image, attrs, MarkSet::none())
}

fn marked(mark: Mark, node: Node) -> Node {
    let marks = mark.add_to(node.marks());
    node.with_marks(marks)
}

pub fn em(node: Node) -> Node {
    marked(Mark::Em, node)
}

pub fn strong(node: Node) -> Node {
    marked(Mark::Strong, node)
}

pub fn code(node: Node) -> Node {
    marked(Mark::Code, node)
}

pub fn link(href: &str, node: Node) -> Node {
    marked(Mark::Link { href: href.into() }, node)
}
