//! Failure taxonomy shared by the upstream clients.
//!
//! Nothing here ever reaches a tool caller: every public client operation
//! collapses these into an empty result or a readable sentence.

use thiserror::Error;

/// Result type for the fallible `try_*` client operations.
pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced a response (DNS, connect, TLS, body read).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-2xx status other than 404.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The requested entity does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream payload did not match the expected schema.
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A file body arrived but could not be decoded.
    #[error("could not decode {path}: {reason}")]
    Content { path: String, reason: String },

    /// GitHub omits the body of files over 1 MB from the contents API.
    #[error("{path} is {size} bytes, too large for the contents API")]
    TooLarge { path: String, size: u64 },

    #[error("GitHub request failed: {0}")]
    GitHub(#[from] octocrab::Error),

    /// Caller-supplied argument that cannot be turned into a request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::GitHub(octocrab::Error::GitHub { source, .. }) => {
                source.status_code.as_u16() == 404
            }
            _ => false,
        }
    }
}
