//! Pattern-text primitives shared by the literal and constructor scanners.
//!
//! Both primitives operate on a regex body (no delimiters, no flags) and never
//! fail: unsupported syntax is either rewritten or left in place for the
//! caller's coverage report.

pub mod lookbehind;
pub mod names;

pub use lookbehind::strip_lookbehinds;
pub use names::{rename_named_groups, GroupNameTable};

use serde::Deserialize;

/// How many source backslashes encode one regex-level backslash.
///
/// A regex literal body is the regex source itself (`Single`). A pattern held
/// in a quoted string argument goes through the string's own escaping first,
/// so `\d` is written `\\d` (`Double`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeDepth {
    #[default]
    Single,
    Double,
}

impl EscapeDepth {
    /// Number of source backslashes per regex backslash.
    pub fn width(self) -> usize {
        match self {
            EscapeDepth::Single => 1,
            EscapeDepth::Double => 2,
        }
    }

    /// Whether a run of `run` backslashes escapes the character after it at
    /// the regex level.
    ///
    /// At depth `Double` a leftover odd backslash is a string-level escape of
    /// the next character, which does not reach the regex engine.
    pub fn escapes_next(self, run: usize) -> bool {
        (run / self.width()) % 2 == 1
    }
}

/// Length of the run of `\` bytes starting at `pos`.
pub(crate) fn backslash_run(bytes: &[u8], pos: usize) -> usize {
    bytes[pos..].iter().take_while(|&&b| b == b'\\').count()
}

/// Byte offset just past a `[A-Za-z_][A-Za-z0-9_]*` identifier starting at
/// `pos`, or `None` when no identifier starts there.
pub(crate) fn identifier_end(bytes: &[u8], pos: usize) -> Option<usize> {
    let first = *bytes.get(pos)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let len = bytes[pos + 1..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    Some(pos + 1 + len)
}

/// If a `(?<ident>` named-group opening starts at `pos`, return the
/// identifier's byte range.
pub(crate) fn named_group_at(bytes: &[u8], pos: usize) -> Option<(usize, usize)> {
    if !bytes[pos..].starts_with(b"(?<") {
        return None;
    }
    let start = pos + 3;
    let end = identifier_end(bytes, start)?;
    (bytes.get(end) == Some(&b'>')).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_depth_escapes_on_odd_runs() {
        assert!(EscapeDepth::Single.escapes_next(1));
        assert!(!EscapeDepth::Single.escapes_next(2));
        assert!(EscapeDepth::Single.escapes_next(3));
    }

    #[test]
    fn test_double_depth_ignores_string_level_escapes() {
        // `\(` inside a string is just `(` for the regex engine
        assert!(!EscapeDepth::Double.escapes_next(1));
        assert!(EscapeDepth::Double.escapes_next(2));
        assert!(EscapeDepth::Double.escapes_next(3));
        assert!(!EscapeDepth::Double.escapes_next(4));
    }

    #[test]
    fn test_named_group_at() {
        let bytes = b"x(?<year>\\d)";
        assert_eq!(named_group_at(bytes, 1), Some((4, 8)));
        assert_eq!(named_group_at(bytes, 0), None);
        assert_eq!(named_group_at(b"(?<=a)", 0), None);
        assert_eq!(named_group_at(b"(?<1a>)", 0), None);
        assert_eq!(named_group_at(b"(?<abc", 0), None);
    }

    #[test]
    fn test_backslash_run() {
        assert_eq!(backslash_run(b"a\\\\\\k", 1), 3);
        assert_eq!(backslash_run(b"abc", 0), 0);
    }
}
