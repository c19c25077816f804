use std::fmt;

use crate::node::{Node, char_slice};

/// An ordered sequence of sibling nodes.
///
/// Construction normalizes the sequence: empty text nodes are dropped and
/// adjacent text nodes with equal marks are merged, so two fragments with the
/// same content always compare equal. `size` is always the sum of the child
/// sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    nodes: Vec<Node>,
    size: usize,
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut out: Vec<Node> = Vec::new();
        for node in nodes {
            if node.is_text() && node.node_size() == 0 {
                continue;
            }
            if let Some(last) = out.last_mut()
                && last.is_text()
                && node.is_text()
                && last.same_markup(&node)
            {
                let merged = format!(
                    "{}{}",
                    last.text_value().unwrap_or_default(),
                    node.text_value().unwrap_or_default()
                );
                *last = last.with_text(merged);
                continue;
            }
            out.push(node);
        }
        let size = out.iter().map(Node::node_size).sum();
        Self { nodes: out, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn child_count(&self) -> usize {
        self.nodes.len()
    }

    /// # Panics
    /// Panics if `index` is out of range; use [`Fragment::maybe_child`] when
    /// the index is not known to be valid.
    pub fn child(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        if from == 0 && to >= self.size {
            return self.clone();
        }
        let mut result = Vec::new();
        if to > from {
            let mut pos = 0;
            for child in &self.nodes {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    if pos < from || end > to {
                        if child.is_text() {
                            result.push(child.cut(from.saturating_sub(pos), (to - pos).min(child.node_size())));
                        } else {
                            result.push(child.cut(
                                from.saturating_sub(pos + 1),
                                (to.saturating_sub(pos + 1)).min(child.content_size()),
                            ));
                        }
                    } else {
                        result.push(child.clone());
                    }
                }
                pos = end;
            }
        }
        Fragment::from_nodes(result)
    }

    pub fn append(&self, other: &Fragment) -> Fragment {
        Fragment::from_nodes(self.nodes.iter().chain(other.nodes.iter()).cloned())
    }

    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut nodes = self.nodes.clone();
        nodes[index] = node;
        Fragment::from_nodes(nodes)
    }

    /// Finds the child index at a content offset, with the offset where that
    /// child starts. A position on a child boundary resolves to the child
    /// after it.
    pub fn find_index(&self, pos: usize) -> (usize, usize) {
        if pos == 0 {
            return (0, 0);
        }
        if pos >= self.size {
            return (self.nodes.len(), self.size);
        }
        let mut cur = 0;
        for (i, child) in self.nodes.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                if end == pos {
                    return (i + 1, end);
                }
                return (i, cur);
            }
            cur = end;
        }
        (self.nodes.len(), self.size)
    }

    pub(crate) fn nodes_between(
        &self,
        from: usize,
        to: usize,
        f: &mut dyn FnMut(&Node, usize) -> bool,
        node_start: usize,
    ) {
        let mut pos = 0;
        for child in &self.nodes {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos) && child.content_size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    child.content_size().min(to.saturating_sub(start)),
                    f,
                    node_start + start,
                );
            }
            pos = end;
        }
    }

    /// Concatenated text between two offsets. When `block_separator` is given
    /// it is inserted between text coming from different blocks.
    pub fn text_between(&self, from: usize, to: usize, block_separator: Option<&str>) -> String {
        let mut text = String::new();
        let mut separated = true;
        self.nodes_between(
            from,
            to,
            &mut |node, pos| {
                if let Some(value) = node.text_value() {
                    text.push_str(char_slice(value, from.max(pos) - pos, to - pos));
                    separated = block_separator.is_none();
                } else if !separated && node.is_block() {
                    text.push_str(block_separator.unwrap_or_default());
                    separated = true;
                }
                true
            },
            0,
        );
        text
    }

    /// The first position, counting from `pos`, at which this fragment and
    /// `other` differ, or `None` when they are equal.
    pub fn find_diff_start(&self, other: &Fragment, mut pos: usize) -> Option<usize> {
        let mut i = 0;
        loop {
            if i == self.child_count() || i == other.child_count() {
                return if self.child_count() == other.child_count() {
                    None
                } else {
                    Some(pos)
                };
            }
            let (a, b) = (self.child(i), other.child(i));
            if a == b {
                pos += a.node_size();
                i += 1;
                continue;
            }
            if !a.same_markup(b) {
                return Some(pos);
            }
            if let (Some(ta), Some(tb)) = (a.text_value(), b.text_value()) {
                let same = ta.chars().zip(tb.chars()).take_while(|(x, y)| x == y).count();
                return Some(pos + same);
            }
            if (a.content_size() > 0 || b.content_size() > 0)
                && let Some(inner) = a.content().find_diff_start(b.content(), pos + 1)
            {
                return Some(inner);
            }
            pos += a.node_size();
            i += 1;
        }
    }

    /// Scans both fragments from their ends and returns the end positions
    /// `(a, b)` of the differing region, or `None` when they are equal.
    /// `pos_a`/`pos_b` are the positions of the fragment ends.
    pub fn find_diff_end(
        &self,
        other: &Fragment,
        mut pos_a: usize,
        mut pos_b: usize,
    ) -> Option<(usize, usize)> {
        let (mut ia, mut ib) = (self.child_count(), other.child_count());
        loop {
            if ia == 0 || ib == 0 {
                return if ia == ib { None } else { Some((pos_a, pos_b)) };
            }
            ia -= 1;
            ib -= 1;
            let (a, b) = (self.child(ia), other.child(ib));
            let size = a.node_size();
            if a == b {
                pos_a -= size;
                pos_b -= size;
                continue;
            }
            if !a.same_markup(b) {
                return Some((pos_a, pos_b));
            }
            if let (Some(ta), Some(tb)) = (a.text_value(), b.text_value()) {
                let same = ta
                    .chars()
                    .rev()
                    .zip(tb.chars().rev())
                    .take_while(|(x, y)| x == y)
                    .count();
                return Some((pos_a - same, pos_b - same));
            }
            if (a.content_size() > 0 || b.content_size() > 0)
                && let Some(inner) = a.content().find_diff_end(b.content(), pos_a - 1, pos_b - 1)
            {
                return Some(inner);
            }
            pos_a -= size;
            pos_b -= b.node_size();
        }
    }
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::*;
    use pretty_assertions::assert_eq;

    fn content(node: Node) -> Fragment {
        node.content().clone()
    }

    #[test]
    fn test_from_nodes_merges_adjacent_text() {
        let frag = Fragment::from_nodes([t("ab"), t("cd"), em(t("e")), em(t("f")), t("")]);
        assert_eq!(frag.child_count(), 2);
        assert_eq!(frag.to_string(), r#""abcd", em("ef")"#);
        assert_eq!(frag.size(), 6);
    }

    #[test]
    fn test_find_index() {
        let frag = content(doc([p([t("ab")]), p([t("c")])]));
        assert_eq!(frag.find_index(0), (0, 0));
        assert_eq!(frag.find_index(2), (0, 0));
        assert_eq!(frag.find_index(4), (1, 4));
        assert_eq!(frag.find_index(7), (2, 7));
    }

    #[test]
    fn test_diff_start_and_end_in_text() {
        let a = content(doc([p([t("abcdef")])]));
        let b = content(doc([p([t("abef")])]));
        assert_eq!(a.find_diff_start(&b, 0), Some(3));
        assert_eq!(a.find_diff_end(&b, a.size(), b.size()), Some((5, 3)));
    }

    #[test]
    fn test_no_diff_for_equal_fragments() {
        let a = content(doc([p([t("same"), em(t("x"))])]));
        let b = a.clone();
        assert_eq!(a.find_diff_start(&b, 0), None);
        assert_eq!(a.find_diff_end(&b, a.size(), b.size()), None);
    }

    #[test]
    fn test_diff_on_markup_change() {
        let a = content(doc([p([t("h"), em(t("ell")), t("o")])]));
        let b = content(doc([p([em(t("hell")), t("o")])]));
        assert_eq!(a.find_diff_start(&b, 0), Some(1));
        assert_eq!(a.find_diff_end(&b, a.size(), b.size()), Some((2, 2)));
    }

    #[test]
    fn test_diff_with_extra_block() {
        let a = content(doc([p([t("ab")])]));
        let b = content(doc([p([t("ab")]), p([t("new")])]));
        assert_eq!(a.find_diff_start(&b, 0), Some(4));
        assert_eq!(a.find_diff_end(&b, a.size(), b.size()), Some((3, 8)));
    }

    #[test]
    fn test_cut_across_blocks() {
        let frag = content(doc([p([t("abc")]), p([t("def")])]));
        assert_eq!(frag.cut(2, 7).to_string(), r#"paragraph("bc"), paragraph("d")"#);
        assert_eq!(frag.cut(0, 5), Fragment::from_nodes([p([t("abc")])]));
    }
}
