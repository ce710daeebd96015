//! Workspace-wide error types
//!
//! All errors are explicit - no silent failures allowed.

use thiserror::Error;

/// Top-level error type for the grind workspace
#[derive(Debug, Error)]
pub enum GrindError {
    #[error("Invalid parameter '{name}': {message}")]
    Config { name: &'static str, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed graphlog: {message}")]
    BadLog { message: String },

    #[error("Operation not supported by the library: {operation}")]
    NotSupported { operation: &'static str },

    #[error("Library error: {message}")]
    Library { message: String },

    #[error("Protocol violation: {message}")]
    Protocol { message: String },

    #[error("Fatal: {message}")]
    Fatal { message: String },
}

impl GrindError {
    /// Shorthand for a `BadLog` with a formatted message
    pub fn bad_log(message: impl Into<String>) -> Self {
        GrindError::BadLog {
            message: message.into(),
        }
    }

    /// Shorthand for a recoverable library failure
    pub fn library(message: impl Into<String>) -> Self {
        GrindError::Library {
            message: message.into(),
        }
    }

    /// Shorthand for a wire-protocol violation
    pub fn protocol(message: impl Into<String>) -> Self {
        GrindError::Protocol {
            message: message.into(),
        }
    }

    /// Shorthand for an assertion-level violation
    pub fn fatal(message: impl Into<String>) -> Self {
        GrindError::Fatal {
            message: message.into(),
        }
    }
}

/// Convenience type alias for grind results
pub type GrindResult<T> = Result<T, GrindError>;
