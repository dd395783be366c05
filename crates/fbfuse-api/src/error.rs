use thiserror::Error;

/// Top-level error type for the `fbfuse-api` crate.
///
/// Covers every failure mode of the outbound calls the control plane makes:
/// transport, timeouts, non-success HTTP statuses, malformed payloads, and
/// explicit rejections from a worker or the configuration authority.
/// `fbfuse-core` maps all of these into `ExternalServiceFailure`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Remote ──────────────────────────────────────────────────────
    /// The remote answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The remote answered but refused the request
    /// (`{"status": "fail", "message": ...}` envelope).
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the call exceeded its time budget.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            status: 503,
            url: "http://127.0.0.1:1/".into(),
            body: String::new(),
        };
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn rejection_is_permanent() {
        let err = Error::Rejected {
            message: "bad beam layout".into(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_timeout());
    }

    #[test]
    fn timeout_classification() {
        let err = Error::Timeout { timeout_secs: 5 };
        assert!(err.is_timeout());
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "Request timed out after 5s");
    }
}
