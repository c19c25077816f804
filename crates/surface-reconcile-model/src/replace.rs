//! Structural replacement of a document range by a slice.
//!
//! Open sides of the slice are joined onto the nodes around the replaced
//! range; every node that gets rebuilt on the way is checked against its
//! content rule.

use thiserror::Error;

use crate::fragment::Fragment;
use crate::node::Node;
use crate::resolved::{PositionError, ResolvedPos};
use crate::schema::NodeKind;
use crate::slice::Slice;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplaceError {
    #[error("inserted content deeper than insertion position")]
    TooDeep,
    #[error("inconsistent open depths")]
    InconsistentOpenDepths,
    #[error("cannot join {sub} onto {main}")]
    CannotJoin { sub: NodeKind, main: NodeKind },
    #[error("invalid content for node {0}")]
    InvalidContent(NodeKind),
    #[error(transparent)]
    Position(#[from] PositionError),
}

impl Node {
    /// Replaces `[from, to)` with `slice`, returning the new node.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ReplaceError> {
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        if slice.open_start() > rfrom.depth() {
            return Err(ReplaceError::TooDeep);
        }
        if rfrom.depth() + slice.open_end() != rto.depth() + slice.open_start() {
            return Err(ReplaceError::InconsistentOpenDepths);
        }
        replace_outer(&rfrom, &rto, slice, 0)
    }

    /// Checks `content` against this node's content rule.
    pub fn check_content(&self, content: &Fragment) -> Result<(), ReplaceError> {
        check_content(self.kind(), content)
    }
}

pub(crate) fn check_content(kind: NodeKind, content: &Fragment) -> Result<(), ReplaceError> {
    let valid = content.iter().all(|child| {
        kind.allows(child.kind()) && (kind.allows_marks() || child.marks().is_empty())
    }) && !(kind.requires_content() && content.child_count() == 0);
    if valid {
        Ok(())
    } else {
        Err(ReplaceError::InvalidContent(kind))
    }
}

fn replace_outer(
    from: &ResolvedPos<'_>,
    to: &ResolvedPos<'_>,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ReplaceError> {
    let index = from.index(depth);
    let node = from.node(depth);
    if index == to.index(depth) && depth + slice.open_start() < from.depth() {
        let inner = replace_outer(from, to, slice, depth + 1)?;
        return Ok(node.copy(node.content().replace_child(index, inner)));
    }
    if slice.content().size() == 0 {
        return close(node, replace_two_way(from, to, depth)?);
    }
    if slice.open_start() == 0
        && slice.open_end() == 0
        && from.depth() == depth
        && to.depth() == depth
    {
        let parent = from.parent();
        let content = parent.content();
        let joined = content
            .cut(0, from.parent_offset())
            .append(slice.content())
            .append(&content.cut(to.parent_offset(), content.size()));
        return close(parent, joined);
    }
    let prepared = prepare_slice(slice, from);
    let start = prepared.resolve(slice.open_start() + prepared_extra(from, slice))?;
    let end = prepared.resolve(
        prepared.content_size() - slice.open_end() - prepared_extra(from, slice),
    )?;
    close(node, replace_three_way(from, &start, &end, to, depth)?)
}

fn prepared_extra(along: &ResolvedPos<'_>, slice: &Slice) -> usize {
    along.depth() - slice.open_start()
}

/// Wraps the slice content in copies of the ancestors of `along` so it can be
/// resolved with the same depths as the insertion point.
fn prepare_slice(slice: &Slice, along: &ResolvedPos<'_>) -> Node {
    let extra = prepared_extra(along, slice);
    let mut node = along.node(extra).copy(slice.content().clone());
    for depth in (0..extra).rev() {
        node = along.node(depth).copy(Fragment::from_nodes([node]));
    }
    node
}

fn joinable<'a>(
    before: &ResolvedPos<'a>,
    after: &ResolvedPos<'_>,
    depth: usize,
) -> Result<&'a Node, ReplaceError> {
    let node = before.node(depth);
    check_join(node, after.node(depth))?;
    Ok(node)
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ReplaceError> {
    if sub.kind().compatible_content(main.kind()) {
        Ok(())
    } else {
        Err(ReplaceError::CannotJoin {
            sub: sub.kind(),
            main: main.kind(),
        })
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node, ReplaceError> {
    node.check_content(&content)?;
    Ok(node.copy(content))
}

/// Pushes the children of the node at `depth` lying between `start` and
/// `end`, including the cut pieces of text nodes either position splits.
fn add_range(
    start: Option<&ResolvedPos<'_>>,
    end: Option<&ResolvedPos<'_>>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let Some(node) = end.or(start).map(|pos| pos.node(depth)) else {
        return;
    };
    let mut start_index = 0;
    let end_index = end.map_or(node.child_count(), |end| end.index(depth));
    if let Some(start) = start {
        start_index = start.index(depth);
        if start.depth() > depth {
            start_index += 1;
        } else if start.text_offset() > 0 {
            target.extend(start.node_after());
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        target.push(node.child(i).clone());
    }
    if let Some(end) = end
        && end.depth() == depth
        && end.text_offset() > 0
    {
        target.extend(end.node_before());
    }
}

fn replace_three_way(
    from: &ResolvedPos<'_>,
    start: &ResolvedPos<'_>,
    end: &ResolvedPos<'_>,
    to: &ResolvedPos<'_>,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let open_start = if from.depth() > depth {
        Some(joinable(from, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(end, to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    match (open_start, open_end) {
        (Some(open_start), Some(open_end)) if start.index(depth) == end.index(depth) => {
            check_join(open_start, open_end)?;
            let inner = replace_three_way(from, start, end, to, depth + 1)?;
            content.push(close(open_start, inner)?);
        }
        _ => {
            if let Some(open_start) = open_start {
                let inner = replace_two_way(from, start, depth + 1)?;
                content.push(close(open_start, inner)?);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(open_end) = open_end {
                let inner = replace_two_way(end, to, depth + 1)?;
                content.push(close(open_end, inner)?);
            }
        }
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

fn replace_two_way(
    from: &ResolvedPos<'_>,
    to: &ResolvedPos<'_>,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let kind = joinable(from, to, depth + 1)?;
        let inner = replace_two_way(from, to, depth + 1)?;
        content.push(close(kind, inner)?);
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}
