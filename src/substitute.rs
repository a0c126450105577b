//! Exact-string substitutions for known third-party patterns.
//!
//! A fixed (search, replace) pair is the degenerate case of the general
//! transformer: it is checked first and needs no scanning at all.

use serde::Deserialize;
use std::borrow::Cow;

/// One known pattern and its compatible replacement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Substitution {
    pub search: String,
    pub replace: String,
}

impl Substitution {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

/// Result of running a substitution table over a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionOutcome<'a> {
    pub text: Cow<'a, str>,
    /// Pairs whose search text was found and replaced
    pub applied: usize,
    /// Pairs whose search text is absent but whose replacement is present
    pub already_applied: usize,
}

impl SubstitutionOutcome<'_> {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Apply `table` in order, replacing every occurrence of each search text.
///
/// Later pairs see the output of earlier ones.
pub fn apply_substitutions<'a>(text: &'a str, table: &[Substitution]) -> SubstitutionOutcome<'a> {
    let mut current = Cow::Borrowed(text);
    let mut applied = 0;
    let mut already_applied = 0;

    for sub in table {
        if sub.search.is_empty() {
            continue;
        }
        if current.contains(sub.search.as_str()) {
            current = Cow::Owned(current.replace(sub.search.as_str(), &sub.replace));
            applied += 1;
        } else if !sub.replace.is_empty() && current.contains(sub.replace.as_str()) {
            already_applied += 1;
        }
    }

    SubstitutionOutcome {
        text: current,
        applied,
        already_applied,
    }
}
