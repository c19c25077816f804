//! # Schema
//!
//! The closed set of node and mark kinds together with the content rules that
//! decide which children a node may hold. The surface parser consults these
//! rules as its grammar context and the replace algorithm uses them to validate
//! the nodes it closes.

use std::fmt;

/// The kind of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The top-level node. Holds blocks.
    Doc,
    Paragraph,
    /// Heading with level 1..=6.
    Heading(u8),
    /// Preformatted text, no marks, whitespace kept verbatim.
    CodeBlock,
    Blockquote,
    BulletList,
    OrderedList,
    ListItem,
    Text,
    HardBreak,
    Image,
}

/// What a node kind may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRule {
    /// Block nodes (paragraphs, lists, quotes, code).
    Blocks,
    /// List items only.
    ListItems,
    /// Inline nodes (text, breaks, images) with marks.
    Inline,
    /// Unmarked text only.
    PlainText,
    /// Leaf node, no content.
    Empty,
}

impl NodeKind {
    pub fn content_rule(self) -> ContentRule {
        match self {
            NodeKind::Doc | NodeKind::Blockquote | NodeKind::ListItem => ContentRule::Blocks,
            NodeKind::BulletList | NodeKind::OrderedList => ContentRule::ListItems,
            NodeKind::Paragraph | NodeKind::Heading(_) => ContentRule::Inline,
            NodeKind::CodeBlock => ContentRule::PlainText,
            NodeKind::Text | NodeKind::HardBreak | NodeKind::Image => ContentRule::Empty,
        }
    }

    /// Whether a node of kind `child` may appear directly inside this kind.
    pub fn allows(self, child: NodeKind) -> bool {
        match self.content_rule() {
            ContentRule::Blocks => child.is_block() && child != NodeKind::ListItem,
            ContentRule::ListItems => child == NodeKind::ListItem,
            ContentRule::Inline => child.is_inline(),
            ContentRule::PlainText => child == NodeKind::Text,
            ContentRule::Empty => false,
        }
    }

    /// Whether text inside this node may carry marks.
    pub fn allows_marks(self) -> bool {
        self.content_rule() == ContentRule::Inline
    }

    /// Nodes that must hold at least one child once closed.
    pub fn requires_content(self) -> bool {
        matches!(
            self,
            NodeKind::Blockquote | NodeKind::ListItem | NodeKind::BulletList | NodeKind::OrderedList
        )
    }

    /// The child kind used to fill a node that requires content but has none.
    pub fn fill_kind(self) -> Option<NodeKind> {
        match self.content_rule() {
            ContentRule::Blocks => Some(NodeKind::Paragraph),
            ContentRule::ListItems => Some(NodeKind::ListItem),
            _ => None,
        }
    }

    /// Two kinds are compatible when one's content can be joined onto the other.
    pub fn compatible_content(self, other: NodeKind) -> bool {
        self == other || self.content_rule() == other.content_rule()
    }

    pub fn is_block(self) -> bool {
        !self.is_inline() && self != NodeKind::Doc
    }

    pub fn is_inline(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::HardBreak | NodeKind::Image)
    }

    pub fn is_leaf(self) -> bool {
        self.content_rule() == ContentRule::Empty
    }

    /// A block whose content is inline (including code blocks).
    pub fn is_textblock(self) -> bool {
        matches!(
            self.content_rule(),
            ContentRule::Inline | ContentRule::PlainText
        )
    }

    /// Code nodes keep their whitespace verbatim.
    pub fn is_code(self) -> bool {
        self == NodeKind::CodeBlock
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Doc => "doc",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading(_) => "heading",
            NodeKind::CodeBlock => "code_block",
            NodeKind::Blockquote => "blockquote",
            NodeKind::BulletList => "bullet_list",
            NodeKind::OrderedList => "ordered_list",
            NodeKind::ListItem => "list_item",
            NodeKind::Text => "text",
            NodeKind::HardBreak => "hard_break",
            NodeKind::Image => "image",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Heading(level) => write!(f, "heading{level}"),
            other => f.write_str(other.name()),
        }
    }
}
