//! Clipboard Error Types
//!
//! Errors raised while negotiating, reading and publishing clipboard content,
//! plus the classification the capture loop uses to decide how loudly to log
//! a failed capture and which counter to bump.

use thiserror::Error;

/// Result type for clipboard operations
pub type Result<T> = std::result::Result<T, ClipboardError>;

/// Clipboard module error types
#[derive(Error, Debug)]
pub enum ClipboardError {
    /// None of the offered identifiers is a supported content type
    #[error("No supported content type offered: {0:?}")]
    UnsupportedType(Vec<String>),

    /// Reading the chosen type from the clipboard source failed
    #[error("Failed to read {mime_type} from clipboard: {reason}")]
    ReadFailure {
        /// Offered identifier that was being read
        mime_type: String,
        /// Backend-specific failure description
        reason: String,
    },

    /// Clipboard source did not deliver data in time
    #[error("Clipboard read timed out after {0}ms")]
    ReadTimeout(u64),

    /// Clipboard source delivered zero bytes
    #[error("Clipboard offered {0} but delivered no data")]
    EmptyPayload(String),

    /// Text payload is not valid UTF-8
    #[error("Invalid UTF-8 data")]
    InvalidUtf8,

    /// Data size exceeds limit
    #[error("Data size {0} exceeds maximum allowed {1}")]
    DataSizeExceeded(usize, usize),

    /// Installing new clipboard content failed
    #[error("Failed to publish clipboard content: {0}")]
    PublishFailure(String),

    /// Publishing did not complete in time
    #[error("Clipboard publish timed out after {0}ms")]
    PublishTimeout(u64),

    /// Listing offered types failed
    #[error("Failed to query offered clipboard types: {0}")]
    Backend(String),

    /// Background task running a blocking clipboard call panicked or was cancelled
    #[error("Clipboard worker task failed: {0}")]
    Worker(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error classification for capture outcome accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Nothing capturable was offered; not a failure
    Unsupported,
    /// Source misbehaved while delivering data
    Read,
    /// Data arrived but is not storable
    DataValidation,
    /// Clipboard sink rejected new content
    Publish,
    /// Backend or runtime failure
    Backend,
}

/// Classify error for logging and statistics
pub fn classify_error(error: &ClipboardError) -> ErrorType {
    match error {
        ClipboardError::UnsupportedType(_) => ErrorType::Unsupported,

        ClipboardError::ReadFailure { .. } | ClipboardError::ReadTimeout(_) => ErrorType::Read,

        ClipboardError::EmptyPayload(_)
        | ClipboardError::InvalidUtf8
        | ClipboardError::DataSizeExceeded(_, _) => ErrorType::DataValidation,

        ClipboardError::PublishFailure(_) | ClipboardError::PublishTimeout(_) => {
            ErrorType::Publish
        }

        ClipboardError::Backend(_) | ClipboardError::Worker(_) | ClipboardError::Io(_) => {
            ErrorType::Backend
        }
    }
}

impl ClipboardError {
    /// Returns true if this outcome is expected and should not be reported as a failure
    pub fn is_benign(&self) -> bool {
        classify_error(self) == ErrorType::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let error = ClipboardError::UnsupportedType(vec!["text/html".to_string()]);
        assert_eq!(classify_error(&error), ErrorType::Unsupported);
        assert!(error.is_benign());

        let error = ClipboardError::ReadFailure {
            mime_type: "image/png".to_string(),
            reason: "source closed".to_string(),
        };
        assert_eq!(classify_error(&error), ErrorType::Read);
        assert!(!error.is_benign());

        let error = ClipboardError::ReadTimeout(5000);
        assert_eq!(classify_error(&error), ErrorType::Read);

        let error = ClipboardError::DataSizeExceeded(20_000_000, 16_777_216);
        assert_eq!(classify_error(&error), ErrorType::DataValidation);

        let error = ClipboardError::PublishTimeout(1000);
        assert_eq!(classify_error(&error), ErrorType::Publish);
    }

    #[test]
    fn test_error_display() {
        let err = ClipboardError::ReadFailure {
            mime_type: "text/plain".to_string(),
            reason: "pipe closed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read text/plain from clipboard: pipe closed"
        );
    }
}
