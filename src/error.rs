use std::fmt;
use thiserror::Error;

/// Category of a provider-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// Credentials or connection missing. No chunk can succeed.
    Unavailable,
    /// Provider returned a different number of translations than requested.
    ShapeMismatch,
    /// The network call exceeded the configured timeout.
    Timeout,
    /// Non-2xx status or a response body that could not be understood.
    Protocol,
}

impl BackendErrorKind {
    /// Whether a chunk that failed with this kind is worth sending again.
    pub fn is_retryable(self) -> bool {
        matches!(self, BackendErrorKind::Timeout | BackendErrorKind::Protocol)
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::Unavailable => write!(f, "backend unavailable"),
            BackendErrorKind::ShapeMismatch => write!(f, "response shape mismatch"),
            BackendErrorKind::Timeout => write!(f, "request timeout"),
            BackendErrorKind::Protocol => write!(f, "protocol error"),
        }
    }
}

/// Error raised by a translation backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unavailable, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Protocol, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    pub fn shape_mismatch(expected: usize, got: usize) -> Self {
        Self::new(
            BackendErrorKind::ShapeMismatch,
            format!("expected {} translations, got {}", expected, got),
        )
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        // Some backends carry credentials in the URL.
        let e = e.without_url();
        if e.is_timeout() {
            BackendError::timeout(e.to_string())
        } else if e.is_connect() {
            BackendError::unavailable(format!("connection failed: {}", e))
        } else if e.is_decode() {
            BackendError::protocol(format!("undecodable response: {}", e))
        } else {
            BackendError::protocol(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum SubtransError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Unsupported subtitle format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SubtransError>;
