//! Single-wildcard glob matcher.
//!
//! The only metacharacter is `*`, matching zero or more characters.
//! Everything else compares byte-for-byte, so matching is case-sensitive.

use std::fmt;

/// A brace-free glob such as `cp3*-manylinux_*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Glob {
    source: String,
}

impl Glob {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the glob has no `*`.
    pub fn is_literal(&self) -> bool {
        !self.source.contains('*')
    }

    /// Match the whole of `text` against this glob.
    ///
    /// Greedy two-pointer scan with backtracking to the most recent `*`.
    /// Literal runs are valid UTF-8, so byte matches always land on char
    /// boundaries of `text`.
    pub fn matches(&self, text: &str) -> bool {
        let pat = self.source.as_bytes();
        let txt = text.as_bytes();

        let (mut p, mut t) = (0usize, 0usize);
        let mut star: Option<usize> = None;
        let mut resume = 0usize;

        while t < txt.len() {
            if p < pat.len() && pat[p] == b'*' {
                star = Some(p);
                p += 1;
                resume = t;
            } else if p < pat.len() && pat[p] == txt[t] {
                p += 1;
                t += 1;
            } else if let Some(s) = star {
                p = s + 1;
                resume += 1;
                t = resume;
            } else {
                return false;
            }
        }

        while p < pat.len() && pat[p] == b'*' {
            p += 1;
        }
        p == pat.len()
    }
}

impl fmt::Display for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let glob = Glob::new("cp38-manylinux_i686");
        assert!(glob.is_literal());
        assert!(glob.matches("cp38-manylinux_i686"));
        assert!(!glob.matches("cp38-manylinux_i68"));
        assert!(!glob.matches("cp38-manylinux_i6866"));
    }

    #[test]
    fn test_star_matches_empty() {
        assert!(Glob::new("cp38*").matches("cp38"));
        assert!(Glob::new("*").matches(""));
        assert!(Glob::new("**").matches("anything"));
    }

    #[test]
    fn test_star_prefix_and_suffix() {
        let glob = Glob::new("*-manylinux_*");
        assert!(glob.matches("cp39-manylinux_x86_64"));
        assert!(glob.matches("pp310-manylinux_aarch64"));
        assert!(!glob.matches("cp39-win_amd64"));
    }

    #[test]
    fn test_backtracking() {
        // The first `-` is not the one that satisfies the pattern
        let glob = Glob::new("*-win*64");
        assert!(glob.matches("cp3-10-win_amd64"));
        assert!(!glob.matches("cp310-win32"));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(!Glob::new("CP38-*").matches("cp38-win32"));
        assert!(!Glob::new("*-WIN32").matches("cp38-win32"));
    }

    #[test]
    fn test_empty_pattern() {
        assert!(Glob::new("").matches(""));
        assert!(!Glob::new("").matches("a"));
    }

    #[test]
    fn test_non_ascii_text() {
        assert!(Glob::new("*é*").matches("café-x"));
        assert!(!Glob::new("caf?").matches("café"));
    }
}
