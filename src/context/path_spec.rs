//! Url pattern matching for filter and servlet mappings.
//!
//! # Responsibilities
//! - Parse url patterns: exact, prefix, suffix, default and regex
//! - Match a path inside a context against a pattern
//! - Split a matched path into servlet path and path info
//!
//! # Design Decisions
//! - Patterns are validated once at parse time
//! - Precedence is expressed as an ordered `PathSpecGroup` so callers pick
//!   the best servlet with a plain `min_by_key`

use std::cmp::Reverse;
use std::fmt;

use regex::Regex;

use crate::error::{Result, RunnerError};

/// Match precedence, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSpecGroup {
    Exact,
    Prefix,
    Regex,
    Suffix,
    Default,
}

#[derive(Debug, Clone)]
enum Kind {
    Exact,
    /// Base without the trailing `/*`; empty for `/*`.
    Prefix(String),
    /// Extension without the leading `*.`.
    Suffix(String),
    Default,
    Regex(Regex),
}

/// A parsed url pattern.
#[derive(Debug, Clone)]
pub struct PathSpec {
    raw: String,
    kind: Kind,
}

impl PartialEq for PathSpec {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PathSpec {}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PathSpec {
    /// Parse a url pattern.
    pub fn parse(pattern: &str) -> Result<Self> {
        let raw = pattern.to_string();
        let invalid =
            |why: &str| RunnerError::invalid(format!("url pattern '{}' {}", pattern, why));

        if pattern.is_empty() {
            return Err(invalid("is empty"));
        }

        let kind = if pattern.starts_with('^') {
            Kind::Regex(Regex::new(pattern).map_err(|e| invalid(&e.to_string()))?)
        } else if let Some(ext) = pattern.strip_prefix("*.") {
            if ext.is_empty() || ext.contains(['/', '*']) {
                return Err(invalid("has an invalid extension"));
            }
            Kind::Suffix(ext.to_string())
        } else if pattern == "/" {
            Kind::Default
        } else if !pattern.starts_with('/') {
            return Err(invalid("must start with '/', '*.' or '^'"));
        } else if let Some(base) = pattern.strip_suffix("/*") {
            if base.contains('*') {
                return Err(invalid("may only end with a wildcard"));
            }
            Kind::Prefix(base.to_string())
        } else if pattern.contains('*') {
            return Err(invalid("may only end with a wildcard"));
        } else {
            Kind::Exact
        };

        Ok(Self { raw, kind })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn group(&self) -> PathSpecGroup {
        match self.kind {
            Kind::Exact => PathSpecGroup::Exact,
            Kind::Prefix(_) => PathSpecGroup::Prefix,
            Kind::Regex(_) => PathSpecGroup::Regex,
            Kind::Suffix(_) => PathSpecGroup::Suffix,
            Kind::Default => PathSpecGroup::Default,
        }
    }

    /// Sort key: lower is more specific. Longer prefixes win within a group.
    pub fn precedence(&self) -> (PathSpecGroup, Reverse<usize>) {
        let len = match &self.kind {
            Kind::Prefix(base) => base.len(),
            _ => 0,
        };
        (self.group(), Reverse(len))
    }

    /// Whether `path` (a path inside the context) matches.
    pub fn matches(&self, path: &str) -> bool {
        match &self.kind {
            Kind::Exact => path == self.raw,
            Kind::Prefix(base) => {
                base.is_empty()
                    || path == base
                    || (path.starts_with(base.as_str()) && path[base.len()..].starts_with('/'))
            }
            Kind::Suffix(ext) => {
                let last = path.rsplit('/').next().unwrap_or(path);
                last.rsplit_once('.').is_some_and(|(_, e)| e == ext)
            }
            Kind::Default => true,
            Kind::Regex(regex) => regex.is_match(path),
        }
    }

    /// Servlet path and path info for a matching `path`.
    pub fn split<'a>(&self, path: &'a str) -> (&'a str, Option<&'a str>) {
        match &self.kind {
            Kind::Prefix(base) => {
                let (servlet_path, info) = path.split_at(base.len().min(path.len()));
                (servlet_path, (!info.is_empty()).then_some(info))
            }
            _ => (path, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(p: &str) -> PathSpec {
        PathSpec::parse(p).unwrap()
    }

    #[test]
    fn classifies_patterns() {
        assert_eq!(spec("/login").group(), PathSpecGroup::Exact);
        assert_eq!(spec("/api/*").group(), PathSpecGroup::Prefix);
        assert_eq!(spec("/*").group(), PathSpecGroup::Prefix);
        assert_eq!(spec("*.jsp").group(), PathSpecGroup::Suffix);
        assert_eq!(spec("/").group(), PathSpecGroup::Default);
        assert_eq!(spec("^/v[0-9]+/.*$").group(), PathSpecGroup::Regex);
    }

    #[test]
    fn rejects_malformed_patterns() {
        for bad in ["", "app/*", "/a/*/b", "*.", "*.a/b", "/a*", "^(unclosed"] {
            assert!(PathSpec::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn prefix_matches_on_segment_boundary() {
        let api = spec("/api/*");
        assert!(api.matches("/api"));
        assert!(api.matches("/api/users"));
        assert!(!api.matches("/apiary"));
        assert!(spec("/*").matches("/anything/at/all"));
    }

    #[test]
    fn suffix_matches_last_segment_only() {
        let jsp = spec("*.jsp");
        assert!(jsp.matches("/index.jsp"));
        assert!(jsp.matches("/a/b/c.jsp"));
        assert!(!jsp.matches("/a.jsp/b"));
        assert!(!jsp.matches("/index.jspx"));
    }

    #[test]
    fn split_prefix_into_servlet_path_and_info() {
        assert_eq!(spec("/api/*").split("/api/users/7"), ("/api", Some("/users/7")));
        assert_eq!(spec("/api/*").split("/api"), ("/api", None));
        assert_eq!(spec("/*").split("/x"), ("", Some("/x")));
        assert_eq!(spec("/login").split("/login"), ("/login", None));
    }

    #[test]
    fn precedence_orders_groups_and_prefix_length() {
        let mut specs = vec![
            spec("/"),
            spec("*.html"),
            spec("^/a.*"),
            spec("/*"),
            spec("/a/*"),
            spec("/a/b"),
        ];
        specs.sort_by_key(|s| s.precedence());
        let order: Vec<_> = specs.iter().map(|s| s.as_str()).collect();
        assert_eq!(order, vec!["/a/b", "/a/*", "/*", "^/a.*", "*.html", "/"]);
    }
}
