//! Whitespace-separated pattern lists (`skip = "pp* cp36-*"`).

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::PatternError;
use crate::pattern::SelectorPattern;

/// An ordered list of selector patterns; matches if any member matches.
///
/// An empty list matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternList {
    patterns: Vec<SelectorPattern>,
}

impl PatternList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space-separated string of patterns.
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        Self::from_items(std::iter::once(source))
    }

    /// Parse a sequence of items. Each item may itself hold several
    /// space-separated patterns.
    pub fn from_items<I, S>(items: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        for item in items {
            for token in item.as_ref().split_whitespace() {
                patterns.push(SelectorPattern::parse(token)?);
            }
        }
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn patterns(&self) -> &[SelectorPattern] {
        &self.patterns
    }

    pub fn matches(&self, identifier: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(identifier))
    }

    /// The first member pattern that matches, if any.
    pub fn first_match(&self, identifier: &str) -> Option<&SelectorPattern> {
        self.patterns.iter().find(|p| p.matches(identifier))
    }
}

impl fmt::Display for PatternList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.patterns.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", p)?;
        }
        Ok(())
    }
}

impl Serialize for PatternList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.patterns.iter())
    }
}
