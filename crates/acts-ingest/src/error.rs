//! Error types for the acts ingestion pipeline

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::types::Issuer;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Body of a failed response from a remote service.
///
/// Client errors (4xx) carry a structured JSON body, server errors (5xx)
/// an opaque text body.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceBody {
    Json(Value),
    Text(String),
}

impl fmt::Display for ServiceBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceBody::Json(value) => write!(f, "{}", value),
            ServiceBody::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source listing could not be fetched or understood
    #[error("Source {issuer} failed: {message}")]
    Source { issuer: Issuer, message: String },

    /// Record store request failed
    #[error("Store request '{operation}' failed (status {}): {body}", status_text(.status))]
    Store {
        operation: String,
        status: Option<u16>,
        body: ServiceBody,
    },

    /// Document download failed
    #[error("Failed to download '{url}': {message}")]
    Download { url: String, message: String },

    /// Content kind the extractor has no route for
    #[error("Unsupported content in '{path}': {kind}")]
    UnsupportedContent { path: String, kind: String },

    /// Legacy document whose text encoding could not be decoded
    #[error("Could not decode '{path}': {message}")]
    Decode { path: String, message: String },

    /// Text extraction tool failed
    #[error("Failed to extract text from '{path}': {message}")]
    Extraction { path: String, message: String },

    /// Extracted text does not look like the expected script
    #[error("Check extraction from {path}")]
    ExtractionQuality { path: String },

    /// Downstream service rejected a submission
    #[error("Forwarding failed (status {}): {body}", status_text(.status))]
    Forward {
        status: Option<u16>,
        body: ServiceBody,
    },

    /// Run was cancelled by the consumer
    #[error("Run cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_text(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl Error {
    /// Create a source error
    pub fn source_failure(issuer: Issuer, message: impl Into<String>) -> Self {
        Self::Source {
            issuer,
            message: message.into(),
        }
    }

    /// Create a store error for a request that never got a response
    pub fn store_unreachable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            status: None,
            body: ServiceBody::Text(message.into()),
        }
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error
    pub fn extraction(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error came from the record store.
    ///
    /// Store failures are infrastructure failures and end the run.
    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = Error::Store {
            operation: "create_act".to_string(),
            status: Some(400),
            body: ServiceBody::Json(serde_json::json!({"act_id": ["required"]})),
        };
        let text = err.to_string();
        assert!(text.contains("create_act"));
        assert!(text.contains("400"));
        assert!(text.contains("required"));
        assert!(err.is_store());
    }

    #[test]
    fn test_unreachable_store_has_no_status() {
        let err = Error::store_unreachable("fetch_acts", "connection refused");
        assert!(err.to_string().contains("status none"));
    }

    #[test]
    fn test_quality_error_names_file() {
        let err = Error::ExtractionQuality {
            path: "/api-data/acts/Sumy/1.pdf".to_string(),
        };
        assert_eq!(err.to_string(), "Check extraction from /api-data/acts/Sumy/1.pdf");
        assert!(!err.is_store());
    }
}
