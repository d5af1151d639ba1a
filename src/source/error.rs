use std::time::Duration;

use thiserror::Error;

/// Snapshot fetch failures. Always recoverable: the cycle is skipped and the
/// detector state is left untouched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rate limited, retry after {retry_after_s}s")]
    RateLimited { retry_after_s: u64 },
    #[error("backing off for another {0:?}")]
    BackingOff(Duration),
    #[error("failed to parse response: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no data available: {0}")]
    NoData(String),
}

impl FetchError {
    /// Label of the WARN event this failure is reported as. `None` for
    /// failures already reported when they started.
    pub fn warn_label(&self) -> Option<&'static str> {
        match self {
            FetchError::RateLimited { .. } => Some("rate_limited"),
            FetchError::BackingOff(_) => None,
            _ => Some("fetch_failed"),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::RateLimited { .. } => Some(429),
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// First `max` characters of a response body, for logs and WARN metadata.
pub(crate) fn snippet(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
