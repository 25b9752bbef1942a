//! Terminal dispositions of an admission check.

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Unknown client, inactive license, or expired license
    Unauthorized,
    /// Endpoint blocked, not allowed, or the matching rule expired
    Forbidden,
    /// A configured rate limit window is out of tokens
    TooManyRequests,
}

impl DenyReason {
    /// Stable label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthorized => "unauthorized",
            DenyReason::Forbidden => "forbidden",
            DenyReason::TooManyRequests => "too_many_requests",
        }
    }
}

/// Outcome of the admission pipeline for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward the request downstream
    Allow,
    /// Short-circuit with the given reason
    Deny(DenyReason),
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}
