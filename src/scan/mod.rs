//! Source-level scanners that locate regexes in JavaScript text.

pub mod constructor;
pub mod literal;

pub use constructor::{rewrite_constructor_calls, rewrite_pattern_text, ConstructorRewrite};
pub use literal::{rewrite_regex_literals, LiteralRewrite};
