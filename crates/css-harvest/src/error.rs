//! Error types for fetching and aggregation.
//!
//! Per-URL failures are [`FetchError`]s. They are handed to `on_error` hooks and
//! never abort a harvest. [`HarvestError`] covers the few conditions that stop
//! an invocation before any slot exists (bad selectors, an unreadable page).

use thiserror::Error;

/// Failure to obtain valid CSS text from one URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client failed (connection refused, timeout, TLS, ...).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("server responded with status {status}")]
    Status { status: u16 },

    /// The response arrived but does not look like CSS.
    #[error("invalid payload (status {status}): {reason}")]
    InvalidPayload { status: u16, reason: &'static str },

    /// Cross-origin target with a scheme the legacy transport cannot reach.
    /// Raised before any request is made.
    #[error("cross-origin request to {url} must use the same protocol as {origin}")]
    ProtocolMismatch { url: String, origin: String },

    /// The URL could not be parsed or resolved against its base.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A `data:` URL that could not be decoded.
    #[error("malformed data url: {0}")]
    DataUrl(String),

    /// Reading a `file:` URL failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No transport knows how to load this scheme.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    /// The import was still unresolved when the pass limit ran out.
    #[error("@import left unresolved after {passes} resolution passes")]
    ImportLimit { passes: usize },
}

impl FetchError {
    /// HTTP status attached to the failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } | Self::InvalidPayload { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the failure happened before anything went over the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::ProtocolMismatch { .. }
                | Self::InvalidUrl { .. }
                | Self::UnsupportedScheme(_)
                | Self::ImportLimit { .. }
        )
    }
}

/// Invocation-level failure of an aggregation.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid document url {url:?}: {reason}")]
    InvalidDocumentUrl { url: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
