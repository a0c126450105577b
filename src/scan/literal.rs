//! Regex-literal scanner.
//!
//! Finds `/body/flags` literals in JavaScript text and rewrites the body of
//! every literal that declares a named group. Division operators are told
//! apart from literal openers by looking at the previous significant
//! character, the same heuristic a tokenizer uses without a full parse.

use crate::detect;
use crate::pattern::{rename_named_groups, strip_lookbehinds, EscapeDepth};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Raw text of a template literal up to its closing backtick or the next
/// `${`. A `$` not followed by `{` is plain text.
const TEMPLATE_TEXT: &str = r"(?:[^`\\$]|\\(?s:.)|\$+(?:[^{`\\$]|\\(?s:.)))*(?:\$*`|\$+\{)";

/// Comments, quoted strings and template text are matched first so their
/// contents are skipped. Braces are matched so the end of a `${...}`
/// substitution can be found. A literal's first body element may not be `*`
/// or `/`; after it come plain characters, escape pairs, or bracket classes
/// (which may hold `/`).
static REGEX_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "{}|`{}|[{{}}]|{}",
        r#"//[^\r\n]*|/\*(?s:.*?)\*/|"(?:[^"\\\r\n]|\\(?s:.))*"|'(?:[^'\\\r\n]|\\(?s:.))*'"#,
        TEMPLATE_TEXT,
        r"/(?:[^\\/\r\n\[*]|\\.|\[(?:[^\]\\\r\n]|\\.)*\])(?:[^\\/\r\n\[]|\\.|\[(?:[^\]\\\r\n]|\\.)*\])*/[dgimsuvy]*",
    ))
    .expect("valid regex")
});

/// Template text that resumes after the `}` closing a substitution.
static TEMPLATE_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{}", TEMPLATE_TEXT)).expect("valid regex"));

/// Words after which a `/` begins an expression rather than a division.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "await",
    "case",
    "delete",
    "do",
    "else",
    "in",
    "instanceof",
    "new",
    "of",
    "return",
    "throw",
    "typeof",
    "void",
    "yield",
];

/// Output of the literal pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralRewrite<'a> {
    pub text: Cow<'a, str>,
    /// Number of literals whose body changed
    pub rewritten: usize,
}

/// Rewrite named groups (and, inside those literals, lookbehinds) in every
/// regex literal of `source`.
pub fn rewrite_regex_literals(source: &str) -> LiteralRewrite<'_> {
    let mut out = String::new();
    let mut last = 0;
    let mut pos = 0;
    let mut rewritten = 0;

    // One entry per open `${`: the number of unclosed `{` inside it.
    let mut substitutions: Vec<usize> = Vec::new();

    while let Some(m) = REGEX_LITERAL.find_at(source, pos) {
        let token = m.as_str();
        match token {
            "{" => {
                if let Some(open) = substitutions.last_mut() {
                    *open += 1;
                }
                pos = m.end();
                continue;
            }
            "}" => {
                pos = m.end();
                match substitutions.last().copied() {
                    Some(0) => {
                        substitutions.pop();
                        pos = resume_template(source, pos, &mut substitutions);
                    }
                    Some(_) => {
                        if let Some(open) = substitutions.last_mut() {
                            *open -= 1;
                        }
                    }
                    None => {}
                }
                continue;
            }
            _ => {}
        }
        if token.starts_with('`') {
            if token.ends_with("${") {
                substitutions.push(0);
            }
            pos = m.end();
            continue;
        }
        if !is_literal(token) {
            pos = m.end();
            continue;
        }
        if !starts_expression(source, m.start()) {
            pos = m.start() + 1;
            continue;
        }
        pos = m.end();

        let Some(replacement) = rewrite_literal(m.as_str()) else {
            continue;
        };
        out.push_str(&source[last..m.start()]);
        out.push_str(&replacement);
        last = m.end();
        rewritten += 1;
    }

    if rewritten == 0 {
        return LiteralRewrite {
            text: Cow::Borrowed(source),
            rewritten,
        };
    }

    out.push_str(&source[last..]);
    LiteralRewrite {
        text: Cow::Owned(out),
        rewritten,
    }
}

/// Skip the template text following the `}` at `pos - 1`; returns where
/// scanning continues.
fn resume_template(source: &str, pos: usize, substitutions: &mut Vec<usize>) -> usize {
    match TEMPLATE_TAIL.find(&source[pos..]) {
        Some(text) => {
            if text.as_str().ends_with("${") {
                substitutions.push(0);
            }
            pos + text.end()
        }
        // unterminated template: scan the rest as code
        None => {
            substitutions.clear();
            pos
        }
    }
}

/// Whether a scanner match is a regex literal rather than a skipped comment
/// or string.
fn is_literal(matched: &str) -> bool {
    matched.starts_with('/') && !matched.starts_with("//") && !matched.starts_with("/*")
}

/// Rewrite one `/body/flags` literal; `None` when it needs no change.
fn rewrite_literal(literal: &str) -> Option<String> {
    let close = literal.rfind('/')?;
    let body = &literal[1..close];
    let flags = &literal[close + 1..];

    if !detect::has_named_group(body) {
        return None;
    }

    let renamed = rename_named_groups(body, EscapeDepth::Single);
    let stripped = strip_lookbehinds(&renamed, EscapeDepth::Single);
    if stripped == body {
        return None;
    }
    Some(format!("/{stripped}/{flags}"))
}

/// Whether a `/` at `slash` can open a regex literal.
///
/// It cannot when the previous significant token ends a value: an
/// identifier, a number, `)`, `]` or `$`. Keywords such as `return` are
/// identifiers that still expect an expression.
fn starts_expression(source: &str, slash: usize) -> bool {
    let before = source[..slash].trim_end();
    let Some(prev) = before.chars().next_back() else {
        return true;
    };

    if prev == ')' || prev == ']' {
        return false;
    }
    if !is_identifier_char(prev) {
        return true;
    }

    let word_start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_identifier_char(*c))
        .last()
        .map_or(before.len(), |(idx, _)| idx);
    let word = &before[word_start..];

    // `obj.return / 2` is a property access
    let is_property = before[..word_start].trim_end().ends_with('.');
    !is_property && EXPRESSION_KEYWORDS.contains(&word)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(source: &str) -> String {
        rewrite_regex_literals(source).text.into_owned()
    }

    #[test]
    fn test_named_groups_in_literal() {
        assert_eq!(
            rewrite(r"const re = /(?<year>\d{4})-(?<month>\d{2})/u;"),
            r"const re = /(\d{4})-(\d{2})/u;"
        );
    }

    #[test]
    fn test_marked_link_pattern() {
        let source = r"inlineCode: /\[(?:[^\[\]`]|(?<!`)(?<a>`+)[^`]+\k<a>(?!`))*?\]\((?:\\[\s\S]|[^\\()\)]|\((?:\\[\s\S]|[^\\()\)])*\))*\)/,";
        let expected = r"inlineCode: /\[(?:[^\[\]`]|(`+)[^`]+\1(?!`))*?\]\((?:\\[\s\S]|[^\\()\)]|\((?:\\[\s\S]|[^\\()\)])*\))*\)/,";
        assert_eq!(rewrite(source), expected);
    }

    #[test]
    fn test_division_is_not_a_literal() {
        let source = "const ratio = a / b / c;";
        let result = rewrite_regex_literals(source);
        assert_eq!(result.rewritten, 0);
        assert!(matches!(result.text, Cow::Borrowed(_)));
    }

    #[test]
    fn test_division_before_named_group_text() {
        // a division on the same line must not swallow the real literal
        let source = r"x = total / 2; y = /(?<n>\d+)/g;";
        assert_eq!(rewrite(source), r"x = total / 2; y = /(\d+)/g;");
    }

    #[test]
    fn test_division_after_call_or_index() {
        let source = r"f(a) / (?<n>x) / g[0] / (?<m>y) /";
        assert_eq!(rewrite(source), source);
    }

    #[test]
    fn test_keyword_before_literal() {
        assert_eq!(
            rewrite(r"return /(?<w>\w)\k<w>/.test(s)"),
            r"return /(\w)\1/.test(s)"
        );
        assert_eq!(
            rewrite(r"x = obj.return / (?<w>a) / 2"),
            r"x = obj.return / (?<w>a) / 2"
        );
    }

    #[test]
    fn test_lookbehind_only_literal_is_skipped() {
        let source = r"const re = /(?<=a)b/;";
        assert_eq!(rewrite(source), source);
    }

    #[test]
    fn test_lookbehind_stripped_alongside_named_group() {
        assert_eq!(
            rewrite(r"s.match(/(?<=\s)(?<w>\w+)\k<w>/g)"),
            r"s.match(/(\w+)\1/g)"
        );
    }

    #[test]
    fn test_slash_inside_class() {
        assert_eq!(rewrite(r"p = /(?<path>[a/b]+)/;"), r"p = /([a/b]+)/;");
    }

    #[test]
    fn test_comments_are_not_literals() {
        let source = "// (?<a>x) /\n/* (?<b>y) */";
        assert_eq!(rewrite(source), source);
    }

    #[test]
    fn test_string_contents_are_skipped() {
        let source = r#"const s = "/(?<a>x)/"; const t = '/(?<b>y)/';"#;
        assert_eq!(rewrite(source), source);
    }

    #[test]
    fn test_literal_inside_template_substitution() {
        assert_eq!(
            rewrite(r"const t = `${s.replace(/(?<a>x)\k<a>/g, '')}`;"),
            r"const t = `${s.replace(/(x)\1/g, '')}`;"
        );
    }

    #[test]
    fn test_template_text_is_skipped_around_substitutions() {
        let source = r"const t = `/(?<a>x)/ ${n} /(?<b>y)/ $5`;";
        assert_eq!(rewrite(source), source);
    }

    #[test]
    fn test_nested_braces_and_code_after_template() {
        let source = r"const t = `${ {k: /(?<a>x)/}.k }/(?<raw>y)/`; const u = /(?<b>z)/;";
        let result = rewrite_regex_literals(source);
        assert_eq!(result.rewritten, 2);
        assert_eq!(
            result.text,
            r"const t = `${ {k: /(x)/}.k }/(?<raw>y)/`; const u = /(z)/;"
        );
    }

    #[test]
    fn test_template_inside_substitution() {
        assert_eq!(
            rewrite(r"`a${ `b${ c.match(/(?<d>\d)/) }` }e` + /(?<f>g)/.source"),
            r"`a${ `b${ c.match(/(\d)/) }` }e` + /(g)/.source"
        );
    }

    #[test]
    fn test_url_in_string_does_not_hide_literal() {
        assert_eq!(
            rewrite(r#"u = "http://example.com"; re = /(?<h>#\w+)/g;"#),
            r#"u = "http://example.com"; re = /(#\w+)/g;"#
        );
    }

    #[test]
    fn test_multiple_literals_counted() {
        let result = rewrite_regex_literals(r"[/(?<a>x)/, /plain/, /(?<b>y)/i]");
        assert_eq!(result.rewritten, 2);
        assert_eq!(result.text, r"[/(x)/, /plain/, /(y)/i]");
    }
}
