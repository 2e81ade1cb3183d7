//! Error types for review AI operations.

use std::fmt;

/// Universal error type that abstracts provider-specific errors into common variants.
///
/// All provider implementations should map their native errors to these variants,
/// preserving context while maintaining a provider-agnostic interface.
#[derive(Debug)]
pub enum Error {
    /// API key authentication failures. Credentials are invalid, expired, or
    /// lack the permissions the call needs.
    Authentication(String),

    /// Network connectivity issues, DNS failures, or dropped connections.
    /// These errors are typically transient.
    Network(String),

    /// Invalid parameters or missing configuration, such as an absent API key.
    Configuration(String),

    /// The provider understood the request and refused or failed it.
    Provider(String),

    /// Operation exceeded the configured or provider-enforced timeout period.
    Timeout(String),

    /// Requested resource (uploaded file, model) does not exist.
    NotFound(String),

    /// Provider rate limit exceeded. Clients must wait before retrying.
    RateLimited { retry_after_seconds: u64 },

    /// The provider answered, but not with something usable, e.g. an empty
    /// embedding or an analysis without any content.
    InvalidResponse(String),

    /// Failed to serialize a request body to JSON.
    Serialization(String),

    /// Failed to deserialize a provider response to the expected type.
    Deserialization(String),

    /// The file type cannot be turned into text.
    UnsupportedFormat(String),

    /// Extraction ran but produced no text.
    NoTextExtracted(String),

    /// Catch-all for errors that don't fit other categories.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Provider(msg) => write!(f, "Provider error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::RateLimited {
                retry_after_seconds,
            } => {
                write!(f, "Rate limited: retry after {}s", retry_after_seconds)
            }
            Error::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Deserialization(msg) => write!(f, "Deserialization error: {}", msg),
            Error::UnsupportedFormat(msg) => write!(f, "Unsupported file type: {}", msg),
            Error::NoTextExtracted(msg) => write!(f, "No text extracted: {}", msg),
            Error::Other(err) => write!(f, "Other error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialization(err.to_string())
    }
}

impl Error {
    /// Whether the failure came from the text extraction collaborator.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_) | Error::NoTextExtracted(_))
    }
}
