use std::fmt;

/// An inline annotation attached to a run of text or inline leaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mark {
    Link { href: String },
    Em,
    Strong,
    Code,
}

impl Mark {
    /// Ordering rank inside a [`MarkSet`]; lower ranks sort first (outermost).
    pub fn rank(&self) -> u8 {
        match self {
            Mark::Link { .. } => 0,
            Mark::Em => 1,
            Mark::Strong => 2,
            Mark::Code => 3,
        }
    }

    /// Whether text typed at the edge of this mark picks it up.
    pub fn inclusive(&self) -> bool {
        !matches!(self, Mark::Link { .. })
    }

    /// Two marks of the same kind exclude each other within a set.
    pub fn same_kind(&self, other: &Mark) -> bool {
        self.rank() == other.rank()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mark::Link { .. } => "link",
            Mark::Em => "em",
            Mark::Strong => "strong",
            Mark::Code => "code",
        }
    }

    /// A set containing this mark plus `set`, replacing any mark of the same kind.
    pub fn add_to(&self, set: &MarkSet) -> MarkSet {
        let mut marks: Vec<Mark> = set
            .iter()
            .filter(|m| !m.same_kind(self))
            .cloned()
            .collect();
        let at = marks
            .iter()
            .position(|m| m.rank() > self.rank())
            .unwrap_or(marks.len());
        marks.insert(at, self.clone());
        MarkSet(marks)
    }

    pub fn remove_from(&self, set: &MarkSet) -> MarkSet {
        MarkSet(set.iter().filter(|m| *m != self).cloned().collect())
    }

    pub fn is_in(&self, set: &MarkSet) -> bool {
        set.iter().any(|m| m == self)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Link { href } => write!(f, "link[{href}]"),
            other => f.write_str(other.name()),
        }
    }
}

/// A rank-sorted set of marks with at most one mark per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MarkSet(Vec<Mark>);

impl MarkSet {
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a set from arbitrary marks; later marks win over earlier ones of
    /// the same kind.
    pub fn from_marks(marks: impl IntoIterator<Item = Mark>) -> Self {
        marks
            .into_iter()
            .fold(MarkSet::none(), |set, mark| mark.add_to(&set))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mark> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn same_set(&self, other: &MarkSet) -> bool {
        self == other
    }

    /// Mark at `index` in rank order.
    pub fn get(&self, index: usize) -> Option<&Mark> {
        self.0.get(index)
    }

    pub fn union(&self, other: &MarkSet) -> MarkSet {
        other.iter().fold(self.clone(), |set, mark| {
            if set.iter().any(|m| m.same_kind(mark)) {
                set
            } else {
                mark.add_to(&set)
            }
        })
    }
}

impl<'a> IntoIterator for &'a MarkSet {
    type Item = &'a Mark;
    type IntoIter = std::slice::Iter<'a, Mark>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
