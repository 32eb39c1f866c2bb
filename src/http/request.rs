//! Inbound request identification.
//!
//! # Responsibilities
//! - Resolve the correlation ID for every inbound request
//! - Honor caller-supplied `X-Request-ID` values only when they are safe to echo
//! - Generate a UUID v4 when the header is absent or unusable
//!
//! # Design Decisions
//! - The header is attacker controlled: anything outside
//!   `[A-Za-z0-9][A-Za-z0-9._-]{0,127}` is replaced, never repaired
//! - Resolution is infallible; every request leaves with a usable ID

use std::fmt;
use std::sync::{Arc, LazyLock};

use axum::http::HeaderValue;
use regex::Regex;
use uuid::Uuid;

/// Header carrying the correlation ID, inbound and outbound.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Longest caller-supplied ID that is accepted verbatim.
pub const MAX_CORRELATION_ID_LEN: usize = 128;

static CORRELATION_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("correlation id pattern compiles")
});

/// Identifier tying one request's log lines to its response.
///
/// Cheap to clone; the value is immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Resolve the ID for a request from the raw header text.
    ///
    /// Surrounding whitespace is trimmed. The trimmed value is kept only if it
    /// is non-empty, at most 128 characters and matches the allowed pattern;
    /// otherwise a fresh UUID v4 is generated.
    pub fn resolve(raw: Option<&str>) -> Self {
        raw.map(str::trim)
            .filter(|candidate| Self::is_acceptable(candidate))
            .map(|candidate| Self(Arc::from(candidate)))
            .unwrap_or_else(Self::generate)
    }

    /// Resolve the ID straight from a header value.
    ///
    /// Values that are not visible ASCII cannot match the pattern and are
    /// treated as absent.
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        Self::resolve(value.and_then(|v| v.to_str().ok()))
    }

    /// A freshly generated UUID v4 in hyphenated form.
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Whether `candidate` would be accepted verbatim.
    pub fn is_acceptable(candidate: &str) -> bool {
        !candidate.is_empty()
            && candidate.len() <= MAX_CORRELATION_ID_LEN
            && CORRELATION_ID_PATTERN.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
