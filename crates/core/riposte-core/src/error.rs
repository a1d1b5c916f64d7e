//! Error types for the Riposte engine

use thiserror::Error;

/// Main error type for Riposte operations
#[derive(Debug, Error)]
pub enum RiposteError {
    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Message rejected because it exceeds the length limit
    #[error("Message exceeds {max_length} characters")]
    MessageTooLong {
        /// Maximum accepted message length
        max_length: usize,
    },

    /// Message rejected because it is empty after trimming
    #[error("Message is empty")]
    EmptyMessage,

    /// Reply source error (live transport or mock engine)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Reply synthesis error
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Generation was cancelled by the caller
    #[error("Generation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Message store error
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using RiposteError
pub type Result<T> = std::result::Result<T, RiposteError>;

impl RiposteError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        RiposteError::Validation(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        RiposteError::Provider(msg.into())
    }

    /// Create a synthesis error
    pub fn synthesis(msg: impl Into<String>) -> Self {
        RiposteError::Synthesis(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        RiposteError::Config(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        RiposteError::Store(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        RiposteError::Other(msg.into())
    }

    /// Whether this error is a cancellation (terminal but not a failure)
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RiposteError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RiposteError::provider("upstream refused");
        assert_eq!(err.to_string(), "Provider error: upstream refused");

        let err = RiposteError::MessageTooLong { max_length: 2000 };
        assert_eq!(err.to_string(), "Message exceeds 2000 characters");
    }

    #[test]
    fn test_cancelled_detection() {
        assert!(RiposteError::Cancelled.is_cancelled());
        assert!(!RiposteError::other("boom").is_cancelled());
    }
}
