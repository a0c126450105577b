//! `RegExp` constructor scanner.
//!
//! Rewrites the pattern passed as a quoted string to `new RegExp(...)` or
//! `RegExp(...)`. The string content is rewritten as it appears in the source,
//! so backslashes are interpreted at the caller's escape depth.

use crate::detect;
use crate::pattern::{rename_named_groups, strip_lookbehinds, EscapeDepth};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

static REGEXP_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<head>(?:\bnew\s+)?\bRegExp\s*\(\s*)",
        r#"(?:"(?P<dq>(?:[^"\\]|\\(?s:.))*)""#,
        r"|'(?P<sq>(?:[^'\\]|\\(?s:.))*)'",
        r"|`(?P<bq>(?:[^`\\]|\\(?s:.))*)`)",
    ))
    .expect("valid regex")
});

/// Output of the constructor pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorRewrite<'a> {
    pub text: Cow<'a, str>,
    /// Number of calls whose pattern argument changed
    pub rewritten: usize,
}

/// Rewrite lookbehinds and named groups in every `RegExp` string argument.
///
/// `depth` is the escape depth of the string contents; quoted JavaScript
/// strings use [`EscapeDepth::Double`].
pub fn rewrite_constructor_calls(source: &str, depth: EscapeDepth) -> ConstructorRewrite<'_> {
    let mut rewritten = 0;
    let text = REGEXP_CALL.replace_all(source, |caps: &Captures<'_>| {
        let Some((quote, content)) = quoted_argument(caps) else {
            return caps[0].to_string();
        };
        match rewrite_pattern_text(content, depth) {
            Some(pattern) => {
                rewritten += 1;
                format!("{}{quote}{pattern}{quote}", &caps["head"])
            }
            None => caps[0].to_string(),
        }
    });

    if rewritten == 0 {
        return ConstructorRewrite {
            text: Cow::Borrowed(source),
            rewritten,
        };
    }
    ConstructorRewrite { text, rewritten }
}

/// Strip lookbehinds, then rename named groups, in a pattern held in a
/// string. `None` when the text has neither or nothing changed.
pub fn rewrite_pattern_text(content: &str, depth: EscapeDepth) -> Option<String> {
    if !detect::has_lookbehind(content) && !detect::has_named_group(content) {
        return None;
    }

    let stripped = strip_lookbehinds(content, depth);
    let renamed = rename_named_groups(&stripped, depth);
    (renamed != content).then(|| renamed.into_owned())
}

fn quoted_argument<'h>(caps: &Captures<'h>) -> Option<(char, &'h str)> {
    [("dq", '"'), ("sq", '\''), ("bq", '`')]
        .into_iter()
        .find_map(|(group, quote)| caps.name(group).map(|m| (quote, m.as_str())))
}
