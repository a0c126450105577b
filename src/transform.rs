//! Whole-unit transformation pipeline.
//!
//! A unit is one file or one bundled chunk. The detection gate decides
//! whether any scanner runs; afterwards the same scan measures what is left
//! so callers can report partial coverage.

use crate::detect::{ConstructCounts, ConstructKind};
use crate::pattern::EscapeDepth;
use crate::scan::{rewrite_constructor_calls, rewrite_regex_literals};
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;

/// Which passes run and how constructor strings are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RewriteOptions {
    /// Rewrite `/pattern/flags` literals
    pub literals: bool,
    /// Rewrite quoted `RegExp(...)` arguments
    pub constructors: bool,
    /// Escape depth of constructor string arguments
    pub string_escape: EscapeDepth,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            literals: true,
            constructors: true,
            string_escape: EscapeDepth::Double,
        }
    }
}

/// Runs the literal and constructor passes over source units.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transformer {
    options: RewriteOptions,
}

impl Transformer {
    pub fn new(options: RewriteOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RewriteOptions {
        &self.options
    }

    /// Transform one unit. `unit` names it in warnings (a file name or chunk
    /// id); it has no effect on the output text.
    pub fn transform<'a>(&self, unit: &str, source: &'a str) -> TransformOutcome<'a> {
        let before = ConstructCounts::scan(source);
        let mut outcome = TransformOutcome {
            unit: unit.to_string(),
            code: Cow::Borrowed(source),
            literals_rewritten: 0,
            constructors_rewritten: 0,
            before,
            remaining: before,
        };
        if !before.has_unsupported() {
            return outcome;
        }

        let mut code = Cow::Borrowed(source);

        // Literals only declare named groups worth rewriting; a literal
        // with just a lookbehind is left for the coverage report.
        if self.options.literals && before.named_groups > 0 {
            let pass = rewrite_regex_literals(&code);
            outcome.literals_rewritten = pass.rewritten;
            if let Cow::Owned(text) = pass.text {
                code = Cow::Owned(text);
            }
        }

        if self.options.constructors {
            let pass = rewrite_constructor_calls(&code, self.options.string_escape);
            outcome.constructors_rewritten = pass.rewritten;
            if let Cow::Owned(text) = pass.text {
                code = Cow::Owned(text);
            }
        }

        if outcome.rewrites() > 0 {
            outcome.remaining = ConstructCounts::scan(&code);
            outcome.code = code;
        }
        outcome
    }
}

/// Transform `source` with default options, discarding diagnostics.
pub fn transform_source(source: &str) -> Cow<'_, str> {
    Transformer::default().transform("<input>", source).code
}

/// Result of transforming one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutcome<'a> {
    pub unit: String,
    pub code: Cow<'a, str>,
    pub literals_rewritten: usize,
    pub constructors_rewritten: usize,
    /// Unsupported constructs found before any pass ran
    pub before: ConstructCounts,
    /// Unsupported constructs still present in `code`
    pub remaining: ConstructCounts,
}

impl TransformOutcome<'_> {
    pub fn rewrites(&self) -> usize {
        self.literals_rewritten + self.constructors_rewritten
    }

    pub fn changed(&self) -> bool {
        self.rewrites() > 0
    }

    /// One warning per construct kind that survived the passes.
    pub fn warnings(&self) -> Vec<CoverageWarning> {
        self.remaining
            .nonzero()
            .map(|(kind, count)| CoverageWarning {
                unit: self.unit.clone(),
                kind,
                count,
            })
            .collect()
    }
}

/// Unsupported syntax left in a unit after transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageWarning {
    pub unit: String,
    pub kind: ConstructKind,
    pub count: usize,
}

impl fmt::Display for CoverageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} remaining in {}", self.count, self.kind, self.unit)
    }
}
