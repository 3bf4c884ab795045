//! Connection build and transport errors.

use std::fmt;

/// The request could not be assembled. Treated like a transport failure by
/// the lifecycle manager (retried after backoff).
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("app id {0:?} does not contain a project number")]
    InvalidAppId(String),
    #[error("realtime URL is malformed: {url}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("serialize request body: {0}")]
    Body(#[from] serde_json::Error),
}

/// Error from opening or reading a realtime stream, before any HTTP status
/// was observed. Always retryable.
#[derive(Debug)]
pub enum StreamError {
    /// Curl reported an error (DNS, connect, TLS, reset, ...).
    Curl(curl::Error),
    /// The transfer ended without a complete status line and headers.
    NoResponse,
    /// Local I/O failure (e.g. the transfer thread could not be spawned).
    Io(std::io::Error),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Curl(e) => write!(f, "{}", e),
            StreamError::NoResponse => write!(f, "no response from realtime endpoint"),
            StreamError::Io(e) => write!(f, "io: {}", e),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Curl(e) => Some(e),
            StreamError::Io(e) => Some(e),
            StreamError::NoResponse => None,
        }
    }
}

impl From<curl::Error> for StreamError {
    fn from(e: curl::Error) -> Self {
        StreamError::Curl(e)
    }
}
