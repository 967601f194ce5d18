//! Selector pattern parsing and brace expansion.
//!
//! Grammar:
//!
//! ```text
//! pattern := segment*
//! segment := literal | '{' alt (',' alt)* '}'
//! alt     := (any char except '{', '}', ',')*
//! ```
//!
//! `*` may appear anywhere, including inside alternatives. Groups do not
//! nest. Multiple groups expand to their cartesian product, left to right.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PatternError;
use crate::glob::Glob;

/// Upper bound on alternatives produced by one pattern.
pub const MAX_ALTERNATIVES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(Vec<String>),
}

/// A parsed selector, e.g. `cp3{8,9}-manylinux_*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorPattern {
    source: String,
    alternatives: Vec<Glob>,
}

impl SelectorPattern {
    /// Parse a pattern and expand its brace groups.
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let segments = split_segments(source)?;
        let alternatives = expand(source, &segments)?;
        Ok(Self {
            source: source.to_string(),
            alternatives: alternatives.into_iter().map(Glob::new).collect(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Brace-free globs this pattern expands to, in expansion order.
    pub fn alternatives(&self) -> &[Glob] {
        &self.alternatives
    }

    /// True if any alternative matches the whole identifier.
    pub fn matches(&self, identifier: &str) -> bool {
        self.alternatives.iter().any(|g| g.matches(identifier))
    }
}

fn split_segments(source: &str) -> Result<Vec<Segment>, PatternError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }

                let mut alts = Vec::new();
                let mut current = String::new();
                let mut closed = false;

                for (inner_offset, inner) in chars.by_ref() {
                    match inner {
                        '}' => {
                            alts.push(std::mem::take(&mut current));
                            closed = true;
                            break;
                        }
                        ',' => alts.push(std::mem::take(&mut current)),
                        '{' => {
                            return Err(PatternError::NestedBrace {
                                pattern: source.to_string(),
                                offset: inner_offset,
                            });
                        }
                        other => current.push(other),
                    }
                }

                if !closed {
                    return Err(PatternError::UnterminatedBrace {
                        pattern: source.to_string(),
                        offset,
                    });
                }
                segments.push(Segment::Group(alts));
            }
            '}' => {
                return Err(PatternError::UnexpectedCloseBrace {
                    pattern: source.to_string(),
                    offset,
                });
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() || segments.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn expand(source: &str, segments: &[Segment]) -> Result<Vec<String>, PatternError> {
    let mut results = vec![String::new()];

    for segment in segments {
        match segment {
            Segment::Literal(text) => {
                for r in results.iter_mut() {
                    r.push_str(text);
                }
            }
            Segment::Group(alts) => {
                if results.len().saturating_mul(alts.len()) > MAX_ALTERNATIVES {
                    return Err(PatternError::TooManyAlternatives {
                        pattern: source.to_string(),
                        limit: MAX_ALTERNATIVES,
                    });
                }
                let mut next = Vec::with_capacity(results.len() * alts.len());
                for prefix in &results {
                    for alt in alts {
                        next.push(format!("{}{}", prefix, alt));
                    }
                }
                results = next;
            }
        }
    }

    // `{a,a}` is legal but matching twice is pointless
    let mut seen = std::collections::HashSet::new();
    results.retain(|r| seen.insert(r.clone()));
    Ok(results)
}

impl fmt::Display for SelectorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for SelectorPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SelectorPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for SelectorPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
