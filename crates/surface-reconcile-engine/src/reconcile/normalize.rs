use std::fmt;

use surface_reconcile_model::{Node, PositionError};

/// A span of document positions, `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub from: usize,
    pub to: usize,
}

impl Span {
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from: from.min(to),
            to: from.max(to),
        }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.from <= other.from && other.to <= self.to
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Widens a reported change span to whole nodes one level below the deepest
/// node containing both ends.
///
/// When an end sits directly in that shared node's content (no child at
/// the next depth) it stays where it is.
pub fn normalize_span(doc: &Node, from: usize, to: usize) -> Result<Span, PositionError> {
    let span = Span::new(from, to);
    let start = doc.resolve(span.from)?;
    let end = doc.resolve(span.to)?;
    let shared = start.shared_depth(span.to);
    Ok(Span {
        from: start.before(shared + 1),
        to: end.after(shared + 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use surface_reconcile_model::builders::*;

    fn sample() -> Node {
        // 0 <p> 1 ab 3 </p> 4 <ul> 5 <li> 6 <p> 7 c 8 </p> 9 </li> 10 </ul> 11
        doc([p([t("ab")]), ul([li([p([t("c")])])])])
    }

    #[rstest]
    #[case(2, 2, Span::new(2, 2))]
    #[case(1, 3, Span::new(1, 3))]
    #[case(2, 7, Span::new(0, 11))]
    #[case(7, 8, Span::new(7, 8))]
    #[case(0, 4, Span::new(0, 4))]
    #[case(3, 1, Span::new(1, 3))]
    fn test_normalize(#[case] from: usize, #[case] to: usize, #[case] expected: Span) {
        assert_eq!(normalize_span(&sample(), from, to), Ok(expected));
    }

    #[rstest]
    #[case(0, 11)]
    #[case(2, 7)]
    #[case(6, 9)]
    #[case(5, 5)]
    fn test_normalized_span_contains_input(#[case] from: usize, #[case] to: usize) {
        let span = normalize_span(&sample(), from, to).unwrap();
        assert!(span.contains(&Span::new(from, to)), "{span} should contain {from}..{to}");
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            normalize_span(&sample(), 0, 40),
            Err(PositionError::OutOfRange { pos: 40, size: 11 })
        );
    }
}
