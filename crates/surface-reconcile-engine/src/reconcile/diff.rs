use std::fmt;

use surface_reconcile_model::Fragment;

/// The differing window between the old and new content.
///
/// `start..end_a` is the replaced range in the old document, `start..end_b`
/// the replacement range in the new one. Both are absolute positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub start: usize,
    pub end_a: usize,
    pub end_b: usize,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{start: {}, end_a: {}, end_b: {}}}", self.start, self.end_a, self.end_b)
    }
}

/// Which side of an ambiguous change the caret should stay attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredSide {
    Start,
    End,
}

/// Finds the minimal differing window between `old` and `new`, both starting
/// at absolute position `base`.
///
/// When the common prefix and suffix overlap (repeated characters), the
/// window is slid towards `preferred_pos` so the reported edit matches where
/// the user actually typed or deleted.
pub fn find_diff(
    old: &Fragment,
    new: &Fragment,
    base: usize,
    preferred_pos: usize,
    preferred_side: PreferredSide,
) -> Option<Change> {
    let start = old.find_diff_start(new, base)?;
    let (end_a, end_b) = old
        .find_diff_end(new, base + old.size(), base + new.size())
        .unwrap_or((base + old.size(), base + new.size()));

    let mut start = start as isize;
    let (mut end_a, mut end_b) = (end_a as isize, end_b as isize);
    let mut preferred = preferred_pos as isize;
    if preferred_side == PreferredSide::End {
        let adjust = (start - end_a.min(end_b)).max(0);
        preferred -= end_a + adjust - start;
    }
    if end_a < start && old.size() < new.size() {
        let moved = if preferred <= start && preferred >= end_a {
            start - preferred
        } else {
            0
        };
        start -= moved;
        end_b = start + (end_b - end_a);
        end_a = start;
    } else if end_b < start {
        let moved = if preferred <= start && preferred >= end_b {
            start - preferred
        } else {
            0
        };
        start -= moved;
        end_a = start + (end_a - end_b);
        end_b = start;
    }
    Some(Change {
        start: start.max(0) as usize,
        end_a: end_a.max(0) as usize,
        end_b: end_b.max(0) as usize,
    })
}
