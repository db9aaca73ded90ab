//! Error taxonomy for export pipelines

use std::fmt;
use std::io;

/// Failure of a single remote call (one page or one query).
#[derive(Debug)]
pub enum TransportError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// The remote answered but reported a failure in the body
    Api(String),
    /// Response body did not have the expected shape
    Decode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Api(msg) => write!(f, "API error: {msg}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Api(_) | Self::Decode(_) => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// A time expression that could not be resolved to an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The offending input, verbatim
    pub input: String,
    pub reason: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot parse time expression {:?}: {}",
            self.input, self.reason
        )
    }
}

impl std::error::Error for ParseError {}

/// Error that aborts an export.
///
/// Per-page transport failures in streaming mode never surface here; the
/// producer logs and skips them. Everything in this enum is fatal.
#[derive(Debug)]
pub enum ExportError {
    /// Missing credentials or invalid option values, raised before start
    Configuration(String),
    Parse(ParseError),
    /// A bounded remote call failed (aggregation mode)
    Transport(TransportError),
    /// Destination could not be created or written
    Sink(io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Parse(e) => write!(f, "{e}"),
            Self::Transport(e) => write!(f, "remote call failed: {e}"),
            Self::Sink(e) => write!(f, "output error: {e}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(_) => None,
            Self::Parse(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Sink(e) => Some(e),
        }
    }
}

impl From<ParseError> for ExportError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<TransportError> for ExportError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
