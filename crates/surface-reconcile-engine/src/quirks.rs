//! Host quirks the reconciler compensates for.
//!
//! Detection is the host integration's job; the reconciler only consults the
//! policy it is handed.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quirk {
    /// After Backspace the host leaves a stray `<br>` at the end of the
    /// edited block. It is excluded from the parsed range.
    StrayBreakOnBackspace,
    /// The host keeps cursor marks alive with an `<img mark-placeholder>`.
    /// Such images are ignored when parsing.
    MarkPlaceholderImage,
    /// Deleting the last character of a list item leaves a bare `<br>`
    /// directly in the list. It is read back as an empty list item.
    BreakReplacesListItem,
}

impl Quirk {
    pub const ALL: [Quirk; 3] = [
        Quirk::StrayBreakOnBackspace,
        Quirk::MarkPlaceholderImage,
        Quirk::BreakReplacesListItem,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Quirk::StrayBreakOnBackspace => "stray-break-on-backspace",
            Quirk::MarkPlaceholderImage => "mark-placeholder-image",
            Quirk::BreakReplacesListItem => "break-replaces-list-item",
        }
    }
}

impl fmt::Display for Quirk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown host quirk: {0}")]
pub struct UnknownQuirk(pub String);

impl FromStr for Quirk {
    type Err = UnknownQuirk;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quirk::ALL
            .into_iter()
            .find(|quirk| quirk.name() == s.trim())
            .ok_or_else(|| UnknownQuirk(s.to_string()))
    }
}

/// The set of quirks active for the current host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuirkPolicy {
    quirks: BTreeSet<Quirk>,
}

impl QuirkPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Quirk::ALL.into_iter().collect()
    }

    /// Builds a policy from quirk names. Unknown names are an error.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, UnknownQuirk> {
        names.iter().map(|name| name.as_ref().parse()).collect()
    }

    pub fn with(mut self, quirk: Quirk) -> Self {
        self.quirks.insert(quirk);
        self
    }

    pub fn has(&self, quirk: Quirk) -> bool {
        self.quirks.contains(&quirk)
    }

    pub fn iter(&self) -> impl Iterator<Item = Quirk> + '_ {
        self.quirks.iter().copied()
    }
}

impl FromIterator<Quirk> for QuirkPolicy {
    fn from_iter<T: IntoIterator<Item = Quirk>>(iter: T) -> Self {
        Self {
            quirks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("stray-break-on-backspace", Quirk::StrayBreakOnBackspace)]
    #[case("mark-placeholder-image", Quirk::MarkPlaceholderImage)]
    #[case(" mark-placeholder-image ", Quirk::MarkPlaceholderImage)]
    #[case("break-replaces-list-item", Quirk::BreakReplacesListItem)]
    fn test_parse_quirk(#[case] name: &str, #[case] expected: Quirk) {
        assert_eq!(name.parse::<Quirk>(), Ok(expected));
    }

    #[test]
    fn test_unknown_quirk_is_rejected() {
        let err = QuirkPolicy::parse(&["stray-break-on-backspace", "blink"]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown host quirk: blink");
    }

    #[test]
    fn test_policy_membership() {
        let policy = QuirkPolicy::none().with(Quirk::MarkPlaceholderImage);
        assert!(policy.has(Quirk::MarkPlaceholderImage));
        assert!(!policy.has(Quirk::StrayBreakOnBackspace));
        assert_eq!(QuirkPolicy::all().iter().count(), 3);
    }
}
