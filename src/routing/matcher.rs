//! Request matching primitives.
//!
//! # Design Decisions
//! - Path matching is a plain, case-sensitive prefix test
//! - No regex to guarantee O(n) matching

use axum::http::Method;

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns true if `path` starts with the prefix.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// `path` without the prefix; unchanged if it does not match.
    pub fn strip<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.prefix.as_str()).unwrap_or(path)
    }
}

/// Methods a static file can answer.
pub fn is_read_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");

        assert!(matcher.matches("/api"));
        assert!(matcher.matches("/api/v1"));
        assert!(matcher.matches("/api?x=1"));
        assert!(!matcher.matches("/images"));
        assert!(!matcher.matches("/API/v1"));
        assert!(!matcher.matches("/app/api"));
    }

    #[test]
    fn test_strip() {
        let matcher = PathPrefixMatcher::new("/api");
        assert_eq!(matcher.strip("/api/me"), "/me");
        assert_eq!(matcher.strip("/api"), "");
        assert_eq!(matcher.strip("/login"), "/login");
    }

    #[test]
    fn test_read_methods() {
        assert!(is_read_method(&Method::GET));
        assert!(is_read_method(&Method::HEAD));
        assert!(!is_read_method(&Method::POST));
        assert!(!is_read_method(&Method::DELETE));
    }
}
