//! Cheap existence checks for unsupported regex syntax.
//!
//! These scans look at raw text, not at parsed regexes, so they also count
//! occurrences inside strings and comments. That is intended: the same counts
//! gate the transformer before it runs and measure coverage after it ran.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static NAMED_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\?<[a-zA-Z_][a-zA-Z0-9_]*>").expect("valid regex"));

static LOOKBEHIND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\?<[=!]").expect("valid regex"));

static NAMED_BACKREFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\k<[a-zA-Z_][a-zA-Z0-9_]*>").expect("valid regex"));

/// Whether `text` contains a `(?<name>` opening.
pub fn has_named_group(text: &str) -> bool {
    NAMED_GROUP.is_match(text)
}

/// Whether `text` contains a `(?<=` or `(?<!` opener.
pub fn has_lookbehind(text: &str) -> bool {
    LOOKBEHIND.is_match(text)
}

/// Byte offsets of every named-group opening and lookbehind opener, in
/// ascending order.
pub fn unsupported_offsets(text: &str) -> Vec<usize> {
    let mut offsets: Vec<usize> = NAMED_GROUP
        .find_iter(text)
        .chain(LOOKBEHIND.find_iter(text))
        .map(|m| m.start())
        .collect();
    offsets.sort_unstable();
    offsets
}

/// Kinds of syntax the target engine rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructKind {
    NamedGroup,
    Lookbehind,
    NamedBackreference,
}

impl ConstructKind {
    /// Plural noun used in reports.
    pub fn plural(self) -> &'static str {
        match self {
            ConstructKind::NamedGroup => "named groups",
            ConstructKind::Lookbehind => "lookbehinds",
            ConstructKind::NamedBackreference => "named backreferences",
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// Occurrence counts of each unsupported construct in a block of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstructCounts {
    pub named_groups: usize,
    pub lookbehinds: usize,
    pub named_backreferences: usize,
}

impl ConstructCounts {
    pub fn scan(text: &str) -> Self {
        Self {
            named_groups: NAMED_GROUP.find_iter(text).count(),
            lookbehinds: LOOKBEHIND.find_iter(text).count(),
            named_backreferences: NAMED_BACKREFERENCE.find_iter(text).count(),
        }
    }

    /// Gate used before transforming: named groups or lookbehinds present.
    ///
    /// A named backreference alone is not worth a pass since there is no
    /// group to resolve it against.
    pub fn has_unsupported(&self) -> bool {
        self.named_groups > 0 || self.lookbehinds > 0
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.named_groups + self.lookbehinds + self.named_backreferences
    }

    pub fn get(&self, kind: ConstructKind) -> usize {
        match kind {
            ConstructKind::NamedGroup => self.named_groups,
            ConstructKind::Lookbehind => self.lookbehinds,
            ConstructKind::NamedBackreference => self.named_backreferences,
        }
    }

    /// Nonzero counts, in a fixed kind order.
    pub fn nonzero(&self) -> impl Iterator<Item = (ConstructKind, usize)> + '_ {
        [
            ConstructKind::NamedGroup,
            ConstructKind::Lookbehind,
            ConstructKind::NamedBackreference,
        ]
        .into_iter()
        .map(|kind| (kind, self.get(kind)))
        .filter(|(_, count)| *count > 0)
    }
}

impl fmt::Display for ConstructCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (idx, (kind, count)) in self.nonzero().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{count} {kind}")?;
        }
        Ok(())
    }
}
