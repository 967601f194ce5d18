//! Selector patterns for wheel build identifiers.
//!
//! A build identifier looks like `cp39-manylinux_x86_64`. Selectors match
//! identifiers with a deliberately small grammar: literal text, `*` for any
//! run of characters, and `{a,b,c}` brace groups that expand into
//! alternatives before matching.

mod error;
mod glob;
mod list;
mod pattern;

pub use error::PatternError;
pub use glob::Glob;
pub use list::PatternList;
pub use pattern::{SelectorPattern, MAX_ALTERNATIVES};

/// Parse `pattern` and test it against `identifier` in one call.
pub fn matches(pattern: &str, identifier: &str) -> Result<bool, PatternError> {
    Ok(SelectorPattern::parse(pattern)?.matches(identifier))
}
