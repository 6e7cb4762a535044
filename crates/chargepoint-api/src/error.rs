use thiserror::Error;

/// Top-level error type for the `chargepoint-api` crate.
///
/// Covers every way a single station lookup can fail: bad input,
/// transport, HTTP status, and body decoding. `chargepoint-core` wraps
/// these together with the station id they belong to.
#[derive(Debug, Error)]
pub enum Error {
    // ── Input ───────────────────────────────────────────────────────
    /// The station id was empty (or whitespace only).
    #[error("Station id must not be empty")]
    InvalidStationId,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Building the underlying HTTP client failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Response ────────────────────────────────────────────────────
    /// The API answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not valid JSON, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the next scheduled poll has a fair chance of
    /// succeeding where this one failed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
