//! regex-compat: rewrite JavaScript regexes for engines without lookbehind
//! or named-group support
//!
//! Older JavaScriptCore builds reject `(?<=...)`, `(?<!...)`, `(?<name>...)`
//! and `\k<name>` at parse time, which takes down the whole script. This crate
//! rewrites those constructs in source text so bundles load on such engines.
//!
//! # Architecture
//!
//! Two primitives work on a bare pattern body: the named-group renamer and
//! the lookbehind stripper. Two scanners find pattern bodies in source text:
//! `/pattern/flags` literals and quoted `RegExp(...)` arguments. A detection
//! gate skips units with nothing to rewrite and measures what is left
//! afterwards.
//!
//! On top of that, patch sets (TOML) name third-party files with exact
//! substitutions, applied atomically with before-content verification.
//!
//! # Lossy rewrites
//!
//! Removing a lookbehind widens what a pattern matches. Callers that need
//! the original semantics must not run the stripper.
//!
//! # Example
//!
//! ```
//! use regex_compat::transform_source;
//!
//! let out = transform_source(r"const re = /(?<year>\d{4})-\k<year>/;");
//! assert_eq!(out, r"const re = /(\d{4})-\1/;");
//! ```

pub mod config;
pub mod detect;
pub mod edit;
pub mod pattern;
pub mod safety;
pub mod scan;
pub mod substitute;
pub mod transform;

// Re-exports
pub use config::{
    apply_targets, check_targets, load_from_path, load_from_str, ApplicationError, ApplyMode,
    ConfigError, PatchSet, PatchStatus, VersionError,
};
pub use detect::{ConstructCounts, ConstructKind};
pub use edit::{EditError, Rewrite, RewriteResult};
pub use pattern::{rename_named_groups, strip_lookbehinds, EscapeDepth};
pub use safety::{SafetyError, WorkspaceGuard};
pub use scan::{rewrite_constructor_calls, rewrite_regex_literals};
pub use substitute::{apply_substitutions, Substitution, SubstitutionOutcome};
pub use transform::{
    transform_source, CoverageWarning, RewriteOptions, TransformOutcome, Transformer,
};
