//! Host permission match patterns.
//!
//! Patterns follow the browser extension syntax: `<all_urls>`, or
//! `scheme://host/path` where the scheme may be `*` (http and https), the
//! host may be `*` or start with `*.`, and `*` in the path matches anything.

use crate::errors::{BrickflowError, Result};
use regex::Regex;
use std::fmt;
use url::Url;

const ALL_URLS: &str = "<all_urls>";
const ALL_URLS_SCHEMES: [&str; 4] = ["http", "https", "file", "ftp"];

#[derive(Debug, Clone)]
enum HostMatch {
    Any,
    Subdomains(String),
    Exact(String),
}

impl HostMatch {
    fn matches(&self, host: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => host.eq_ignore_ascii_case(expected),
            Self::Subdomains(domain) => {
                let host = host.to_ascii_lowercase();
                host == *domain || host.ends_with(&format!(".{domain}"))
            }
        }
    }
}

/// A single match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    raw: String,
    scheme: Option<String>,
    host: HostMatch,
    path: Option<Regex>,
}

impl MatchPattern {
    /// Parses a match pattern.
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            BrickflowError::invalid_definition(format!("Invalid match pattern {pattern}: {reason}"))
        };

        if pattern == ALL_URLS {
            return Ok(Self {
                raw: pattern.to_string(),
                scheme: None,
                host: HostMatch::Any,
                path: None,
            });
        }

        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme separator"))?;
        let scheme = match scheme {
            "*" => None,
            "http" | "https" | "file" | "ftp" | "ws" | "wss" => Some(scheme.to_string()),
            _ => return Err(invalid("unsupported scheme")),
        };

        let slash = rest.find('/').ok_or_else(|| invalid("missing path"))?;
        let (host, path) = rest.split_at(slash);
        let host = match host {
            "*" => HostMatch::Any,
            "" if scheme.as_deref() == Some("file") => HostMatch::Any,
            "" => return Err(invalid("missing host")),
            _ => match host.strip_prefix("*.") {
                Some(domain) if !domain.contains('*') => HostMatch::Subdomains(domain.to_ascii_lowercase()),
                None if !host.contains('*') => HostMatch::Exact(host.to_ascii_lowercase()),
                _ => return Err(invalid("wildcards are only allowed at the start of the host")),
            },
        };

        let expression = path
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let path = Regex::new(&format!("^{expression}$")).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            raw: pattern.to_string(),
            scheme,
            host,
            path: Some(path),
        })
    }

    /// Returns true if `url` matches.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        let scheme = url.scheme();
        let scheme_ok = match (&self.scheme, &self.path) {
            (Some(expected), _) => scheme == expected,
            (None, None) => ALL_URLS_SCHEMES.contains(&scheme),
            (None, Some(_)) => matches!(scheme, "http" | "https"),
        };
        if !scheme_ok {
            return false;
        }

        if !self.host.matches(url.host_str().unwrap_or_default()) {
            return false;
        }

        self.path.as_ref().map_or(true, |path| {
            let target = match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_string(),
            };
            path.is_match(&target)
        })
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The set of URLs the extension may run in.
#[derive(Debug, Clone, Default)]
pub struct HostPermissions {
    patterns: Vec<MatchPattern>,
}

impl HostPermissions {
    /// Parses every pattern.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| MatchPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Returns true if any pattern matches `url`. Unparseable URLs never match.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|url| self.patterns.iter().any(|p| p.matches(&url)))
    }

    /// Returns the parsed patterns.
    #[must_use]
    pub fn patterns(&self) -> &[MatchPattern] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissions(patterns: &[&str]) -> HostPermissions {
        HostPermissions::from_patterns(patterns).unwrap()
    }

    #[test]
    fn test_all_urls() {
        let all = permissions(&["<all_urls>"]);
        assert!(all.matches("https://example.com/a?b=1"));
        assert!(all.matches("file:///tmp/x.html"));
        assert!(!all.matches("chrome://extensions"));
        assert!(!all.matches("not a url"));
    }

    #[test]
    fn test_wildcard_scheme_and_host() {
        let any = permissions(&["*://*/*"]);
        assert!(any.matches("http://foo.test/"));
        assert!(any.matches("https://foo.test/x"));
        assert!(!any.matches("ftp://foo.test/x"));
    }

    #[test]
    fn test_subdomain_and_path() {
        let example = permissions(&["https://*.example.com/app/*"]);
        assert!(example.matches("https://example.com/app/"));
        assert!(example.matches("https://a.b.example.com/app/page?q=1"));
        assert!(!example.matches("https://example.com/other"));
        assert!(!example.matches("http://example.com/app/"));
        assert!(!example.matches("https://badexample.com/app/"));
    }

    #[test]
    fn test_invalid_patterns() {
        for pattern in ["example.com", "https://example.com", "gopher://x/*", "https://a.*.com/*"] {
            let err = MatchPattern::parse(pattern).unwrap_err();
            assert_eq!(err.name(), "InvalidDefinitionError", "{pattern}");
        }
    }
}
