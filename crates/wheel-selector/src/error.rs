//! Pattern error types.

use thiserror::Error;

/// Errors raised while parsing a selector pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `{` without a matching `}`.
    #[error("unterminated brace group at offset {offset} in pattern '{pattern}'")]
    UnterminatedBrace { pattern: String, offset: usize },

    /// A `}` with no open group.
    #[error("unexpected '}}' at offset {offset} in pattern '{pattern}'")]
    UnexpectedCloseBrace { pattern: String, offset: usize },

    /// A `{` inside an open group.
    #[error("nested brace group at offset {offset} in pattern '{pattern}'")]
    NestedBrace { pattern: String, offset: usize },

    /// Brace expansion produced more alternatives than allowed.
    #[error("pattern '{pattern}' expands to more than {limit} alternatives")]
    TooManyAlternatives { pattern: String, limit: usize },
}

impl PatternError {
    /// The pattern text that failed to parse.
    pub fn pattern(&self) -> &str {
        match self {
            PatternError::UnterminatedBrace { pattern, .. }
            | PatternError::UnexpectedCloseBrace { pattern, .. }
            | PatternError::NestedBrace { pattern, .. }
            | PatternError::TooManyAlternatives { pattern, .. } => pattern,
        }
    }
}
