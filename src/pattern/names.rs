//! Named-group renamer.
//!
//! Rewrites `(?<name>` openings to plain `(` and `\k<name>` backreferences to
//! positional `\N`, numbering names in the order they are first declared.

use super::{backslash_run, identifier_end, named_group_at, EscapeDepth};
use std::borrow::Cow;
use std::fmt::Write;

/// Distinct group names of a pattern in first-occurrence order.
///
/// The name at position `i` is referenced as backreference `i + 1` after
/// renaming. Openings are rewritten in place, so this order is also the
/// left-to-right order of the resulting plain groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupNameTable {
    names: Vec<String>,
}

impl GroupNameTable {
    /// Collect every unescaped `(?<ident>` opening of `pattern`.
    pub fn collect(pattern: &str, depth: EscapeDepth) -> Self {
        let bytes = pattern.as_bytes();
        let mut names: Vec<String> = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'\\' => {
                    let run = backslash_run(bytes, i);
                    i += run + usize::from(depth.escapes_next(run));
                }
                b'(' => match named_group_at(bytes, i) {
                    Some((start, end)) => {
                        let name = &pattern[start..end];
                        if !names.iter().any(|n| n == name) {
                            names.push(name.to_string());
                        }
                        i = end + 1;
                    }
                    None => i += 1,
                },
                _ => i += 1,
            }
        }

        Self { names }
    }

    /// 1-based backreference index of `name`, if it was declared.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name).map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Replace named groups and named backreferences with positional ones.
///
/// Returns the input borrowed when it declares no named group. A
/// backreference to a name that is never declared is kept verbatim.
///
/// ```
/// use regex_compat::pattern::{rename_named_groups, EscapeDepth};
///
/// let out = rename_named_groups(r#"(?<q>['"]).*?\k<q>"#, EscapeDepth::Single);
/// assert_eq!(out, r#"(['"]).*?\1"#);
/// ```
pub fn rename_named_groups(pattern: &str, depth: EscapeDepth) -> Cow<'_, str> {
    let table = GroupNameTable::collect(pattern, depth);
    if table.is_empty() {
        return Cow::Borrowed(pattern);
    }

    let bytes = pattern.as_bytes();
    let mut out = String::with_capacity(pattern.len());
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let run = backslash_run(bytes, i);
                let after = i + run;
                if !depth.escapes_next(run) {
                    i = after;
                    continue;
                }
                let Some((end, index)) = backreference_at(pattern, after, &table) else {
                    i = after + 1;
                    continue;
                };

                // A leftover string-level backslash before `k` is dropped:
                // in front of a digit it would start an octal escape.
                let keep = run - run % depth.width();
                let slashes = &pattern[i..i + keep];
                out.push_str(&pattern[last..i]);
                if bytes.get(end).is_some_and(u8::is_ascii_digit) {
                    let _ = write!(out, "(?:{slashes}{index})");
                } else {
                    let _ = write!(out, "{slashes}{index}");
                }
                last = end;
                i = end;
            }
            b'(' => match named_group_at(bytes, i) {
                Some((_, name_end)) => {
                    out.push_str(&pattern[last..i]);
                    out.push('(');
                    last = name_end + 1;
                    i = name_end + 1;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    out.push_str(&pattern[last..]);
    Cow::Owned(out)
}

/// Match `k<ident>` at `pos` against the table; returns the byte offset just
/// past the closing `>` and the resolved index.
fn backreference_at(pattern: &str, pos: usize, table: &GroupNameTable) -> Option<(usize, usize)> {
    let bytes = pattern.as_bytes();
    if !bytes.get(pos..)?.starts_with(b"k<") {
        return None;
    }
    let end = identifier_end(bytes, pos + 2)?;
    if bytes.get(end) != Some(&b'>') {
        return None;
    }
    let index = table.index_of(&pattern[pos + 2..end])?;
    Some((end + 1, index))
}
