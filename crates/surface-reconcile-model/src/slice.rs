use std::fmt;

use crate::fragment::Fragment;

/// A piece of document content cut out of its context.
///
/// `open_start`/`open_end` count how many nodes on each side are cut open
/// (their opening or closing token lies outside the slice).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slice {
    content: Fragment,
    open_start: usize,
    open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A closed slice around a fragment.
    pub fn closed(content: Fragment) -> Self {
        Self::new(content, 0, 0)
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn open_start(&self) -> usize {
        self.open_start
    }

    pub fn open_end(&self) -> usize {
        self.open_end
    }

    /// Number of positions this slice adds when inserted.
    pub fn size(&self) -> usize {
        self.content
            .size()
            .saturating_sub(self.open_start + self.open_end)
    }

    pub fn is_empty(&self) -> bool {
        self.content.size() == 0
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.content)?;
        if self.open_start > 0 || self.open_end > 0 {
            write!(f, "({},{})", self.open_start, self.open_end)?;
        }
        Ok(())
    }
}
