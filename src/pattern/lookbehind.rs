//! Lookbehind stripper.
//!
//! Deletes `(?<=...)` and `(?<!...)` assertions outright. The constraint they
//! expressed is lost; the rest of the pattern keeps its groups and numbering
//! since lookbehinds never capture.

use super::{backslash_run, EscapeDepth};
use std::borrow::Cow;

const POSITIVE_OPENER: &[u8] = b"(?<=";
const NEGATIVE_OPENER: &[u8] = b"(?<!";
const OPENER_LEN: usize = 4;

/// Replacement for an opener whose closing parenthesis cannot be found.
const NEUTRAL_OPENER: &str = "(?:";

/// Remove every lookbehind assertion from `pattern`, leftmost first.
///
/// If an assertion has no matching `)`, its opener is replaced by `(?:` and
/// processing stops, leaving the rest of the text untouched. Such output is
/// not a fixed point: running again strips lookbehinds after the fallback.
///
/// ```
/// use regex_compat::pattern::{strip_lookbehinds, EscapeDepth};
///
/// let out = strip_lookbehinds(r"(?<=^|\s)([-.\w+]+)@([-\w]+)", EscapeDepth::Single);
/// assert_eq!(out, r"([-.\w+]+)@([-\w]+)");
/// ```
pub fn strip_lookbehinds(pattern: &str, depth: EscapeDepth) -> Cow<'_, str> {
    if find_opener(pattern.as_bytes(), depth).is_none() {
        return Cow::Borrowed(pattern);
    }

    let mut result = pattern.to_string();
    // Rescan from the start each round: a removal can join text into a new
    // opener on either side of the cut.
    while let Some(start) = find_opener(result.as_bytes(), depth) {
        match closing_paren(result.as_bytes(), start + OPENER_LEN, depth) {
            Some(end) => {
                result.replace_range(start..end, "");
            }
            None => {
                result.replace_range(start..start + OPENER_LEN, NEUTRAL_OPENER);
                break;
            }
        }
    }

    Cow::Owned(result)
}

/// Offset of the leftmost unescaped lookbehind opener.
fn find_opener(bytes: &[u8], depth: EscapeDepth) -> Option<usize> {
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let run = backslash_run(bytes, i);
                i += run + usize::from(depth.escapes_next(run));
            }
            b'(' if is_opener(&bytes[i..]) => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn is_opener(rest: &[u8]) -> bool {
    rest.starts_with(POSITIVE_OPENER) || rest.starts_with(NEGATIVE_OPENER)
}

/// Scan from `from` with nesting depth 1 and return the offset just past the
/// `)` that closes it.
fn closing_paren(bytes: &[u8], from: usize, depth: EscapeDepth) -> Option<usize> {
    let mut nesting = 1usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let run = backslash_run(bytes, i);
                i += run + usize::from(depth.escapes_next(run));
                continue;
            }
            b'(' => nesting += 1,
            b')' => {
                nesting -= 1;
                if nesting == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
