use thiserror::Error;

/// Top-level error type for the `aquameter-api` crate.
///
/// Covers everything between this process and the device: building the
/// HTTP client, reaching the status bridge, and decoding its reply.
/// Device-side failures that arrive inside a well-formed reply are not
/// errors here; they surface as [`crate::StatusPayload::DeviceError`].
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ────────────────────────────────────────────────────
    /// HTTP transport error (connection reset, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request did not complete within the socket timeout
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The status bridge refused the connection or is not running.
    #[error("Status bridge unavailable at {url}: {reason}")]
    Unavailable { url: String, reason: String },

    /// Building the underlying HTTP client failed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Bridge ───────────────────────────────────────────────────────
    /// The bridge answered with a non-success HTTP status.
    #[error("Status bridge returned HTTP {status}: {message}")]
    Bridge { status: u16, message: String },

    // ── Data ─────────────────────────────────────────────────────────
    /// The bridge answered 200 but the body was not JSON.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } | Self::Unavailable { .. } => true,
            Self::Bridge { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the bridge service itself could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::ClientBuild(_))
    }
}
