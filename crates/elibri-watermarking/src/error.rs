//! Error types for watermarking API operations.

/// Boxed native error of the underlying transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when interacting with the watermarking API.
///
/// Response-derived variants map one-to-one onto HTTP status codes returned by
/// the service. [`WatermarkError::is_transient`] tells which of them make the
/// dispatcher move on to the next candidate host.
#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    /// The format string is not a comma-joined list of known formats.
    #[error("wrong format {0:?}, allowed: epub, mobi, pdf, mp3_in_zip, mp3_in_lpf (comma-joined)")]
    InvalidFormat(String),

    /// The service rejected the request parameters (400).
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Token or signature was not accepted (401).
    #[error("unauthorized")]
    Unauthorized,

    /// The operation is not allowed for this account (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Invalid url or http method (404).
    #[error("invalid url or http method")]
    NotFound,

    /// The signature stamp is stale (408). Resynchronize the local clock and
    /// issue the call again.
    #[error("request expired")]
    RequestExpired,

    /// Internal server error (500).
    #[error("server error")]
    ServerError,

    /// Any status code the protocol does not define.
    #[error("unknown error (HTTP {status})")]
    Unknown {
        /// HTTP status code.
        status: u16,
    },

    /// The request never produced an HTTP response.
    #[error("connection error: {0}")]
    Connection(#[source] BoxError),

    /// Every candidate host failed transiently.
    #[error("no server responding after {attempts} attempt(s)")]
    NoServerResponding {
        /// Number of hosts that were tried.
        attempts: usize,
    },

    /// The call was cancelled through its cancellation token.
    #[error("request cancelled")]
    Cancelled,

    /// The whole-call deadline elapsed.
    #[error("request timed out")]
    Timeout,

    /// Candidate hosts could not be resolved.
    #[error("host discovery failed: {0}")]
    Discovery(String),

    /// Failed to deserialize a response body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl WatermarkError {
    /// Whether this failure only disqualifies the current candidate host.
    ///
    /// Transient failures drive failover. Everything else is a definitive
    /// answer and ends the call.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServerError | Self::Unknown { .. } | Self::Connection(_)
        )
    }

    /// HTTP status code behind a response-derived error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidParameters(_) => Some(400),
            Self::Unauthorized => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound => Some(404),
            Self::RequestExpired => Some(408),
            Self::ServerError => Some(500),
            Self::Unknown { status } => Some(*status),
            _ => None,
        }
    }
}
