//! Ant-style path patterns for marking endpoints retryable per client.
//!
//! Patterns are matched segment by segment:
//!
//! - `**` matches any number of segments, including none
//! - `*` inside a segment matches any run of characters within it
//! - `?` matches exactly one character
//!
//! Leading, trailing and repeated slashes are ignored.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    AnyDepth,
    Glob(Vec<char>),
}

/// One compiled pattern such as `/orders/*/items` or `/admin/**`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let segments = split(&raw)
            .map(|segment| {
                if segment == "**" {
                    Segment::AnyDepth
                } else {
                    Segment::Glob(segment.chars().collect())
                }
            })
            .collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when `path` matches. A query string is ignored.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or_default();
        let parts: Vec<&str> = split(path).collect();
        match_segments(&self.segments, &parts)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((Segment::Glob(glob), rest)) => match path.split_first() {
            Some((head, tail)) => glob_matches(glob, head) && match_segments(rest, tail),
            None => false,
        },
    }
}

fn glob_matches(pattern: &[char], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, consumed)) = backtrack {
            p = star + 1;
            t = consumed + 1;
            backtrack = Some((star, consumed + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

/// The set of paths a client treats as retryable regardless of method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryablePaths {
    patterns: Vec<PathPattern>,
}

impl RetryablePaths {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        patterns.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    /// True when any pattern matches `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(path))
    }
}

impl<S: Into<String>> FromIterator<S> for RetryablePaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().map(PathPattern::new).collect(),
        }
    }
}
