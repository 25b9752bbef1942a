//! Endpoint path pattern compilation and matching.
//!
//! License rules name endpoints with glob patterns rather than full regular
//! expressions. A pattern is compiled once when the license set is loaded and
//! reused for every request, so malformed patterns surface as configuration
//! errors at load time, never while serving traffic.
//!
//! Wildcard semantics, applied uniformly everywhere a pattern is evaluated:
//! - `**` matches any run of characters, including path separators
//! - `*` matches any run of characters within one segment (never `/`)
//! - `?` matches exactly one character
//!
//! The whole pattern must match the whole path (anchored at both ends).

use thiserror::Error;

/// Error raised when an endpoint pattern cannot be compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern string is empty
    #[error("endpoint pattern is empty")]
    Empty,
}

/// One compiled pattern element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    /// A literal character
    Literal(char),
    /// `?` - exactly one character
    AnyChar,
    /// `*` - zero or more characters, stops at `/`
    Wildcard,
    /// `**` - zero or more characters, crosses `/`
    GlobStar,
}

impl Token {
    fn matches_empty(&self) -> bool {
        matches!(self, Token::Wildcard | Token::GlobStar)
    }
}

/// A compiled, anchored endpoint glob pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    tokens: Vec<Token>,
}

impl PathPattern {
    /// Compile a glob pattern string.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                    tokens.push(Token::GlobStar);
                    i += 2;
                }
                '*' => {
                    tokens.push(Token::Wildcard);
                    i += 1;
                }
                '?' => {
                    tokens.push(Token::AnyChar);
                    i += 1;
                }
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            tokens,
        })
    }

    /// The original pattern string this matcher was compiled from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Test a request path against the compiled pattern.
    ///
    /// Runs the classic O(path x pattern) wildcard dynamic program: row `i`
    /// holds, for every token prefix `j`, whether the first `i` path
    /// characters match the first `j` tokens.
    pub fn matches(&self, path: &str) -> bool {
        let n = self.tokens.len();

        // Row for the empty path: only leading stars match nothing.
        let mut prev = vec![false; n + 1];
        prev[0] = true;
        for j in 1..=n {
            prev[j] = prev[j - 1] && self.tokens[j - 1].matches_empty();
        }

        for ch in path.chars() {
            let mut cur = vec![false; n + 1];
            for j in 1..=n {
                cur[j] = match self.tokens[j - 1] {
                    Token::Literal(l) => prev[j - 1] && ch == l,
                    Token::AnyChar => prev[j - 1],
                    Token::Wildcard => cur[j - 1] || (prev[j] && ch != '/'),
                    Token::GlobStar => cur[j - 1] || prev[j],
                };
            }
            prev = cur;
        }

        prev[n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        PathPattern::compile(pattern).unwrap().matches(path)
    }

    #[test]
    fn test_literal_match_is_anchored() {
        assert!(matches("/v1/orders", "/v1/orders"));
        assert!(!matches("/v1/orders", "/v1/orders/123"));
        assert!(!matches("/v1/orders", "/api/v1/orders"));
        assert!(!matches("/v1/orders", "/v1/order"));
    }

    #[test]
    fn test_question_mark_matches_exactly_one_char() {
        assert!(matches("/v?/orders", "/v1/orders"));
        assert!(matches("/v?/orders", "/vX/orders"));
        assert!(!matches("/v?/orders", "/v12/orders"));
        assert!(!matches("/v?/orders", "/v/orders"));
    }

    #[test]
    fn test_single_star_stays_within_segment() {
        assert!(matches("/v1/orders/*", "/v1/orders/123"));
        assert!(matches("/v1/orders/*", "/v1/orders/"));
        assert!(!matches("/v1/orders/*", "/v1/orders/123/items"));
        assert!(matches("/v1/*/items", "/v1/orders/items"));
        assert!(!matches("/v1/*/items", "/v1/a/b/items"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        assert!(matches("/v1/orders/**", "/v1/orders/123"));
        assert!(matches("/v1/orders/**", "/v1/orders/123/items/4"));
        assert!(matches("/v1/orders/**", "/v1/orders/"));
        assert!(!matches("/v1/orders/**", "/v1/users/123"));
        assert!(matches("/**", "/anything/at/all"));
    }

    #[test]
    fn test_star_matches_empty_run() {
        assert!(matches("/v1/orders*", "/v1/orders"));
        assert!(matches("/v1/orders*", "/v1/orders-archive"));
    }

    #[test]
    fn test_mixed_wildcards() {
        assert!(matches("/v?/*/detail/**", "/v2/orders/detail/a/b"));
        assert!(!matches("/v?/*/detail/**", "/v2/orders/summary/a/b"));
    }

    #[test]
    fn test_adjacent_stars_beyond_two_still_match() {
        // "***" compiles to globstar + wildcard and keeps crossing semantics
        assert!(matches("/v1/***", "/v1/a/b/c"));
    }

    #[test]
    fn test_empty_pattern_is_a_compile_error() {
        assert_eq!(PathPattern::compile("").unwrap_err(), PatternError::Empty);
    }

    #[test]
    fn test_raw_pattern_is_preserved() {
        let p = PathPattern::compile("/v1/orders/**").unwrap();
        assert_eq!(p.as_str(), "/v1/orders/**");
    }
}
