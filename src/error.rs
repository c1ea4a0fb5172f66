//! Error types for the rate limiting engine.

use thiserror::Error;

/// Main error type for rate limiter operations.
#[derive(Error, Debug)]
pub enum RatelimitError {
    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(String),

    /// A duration string that does not match the accepted grammar
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// Errors coming back from the store. Transport failures and error
    /// replies (including script `error_reply`s) are surfaced unchanged.
    #[error("store error: {0}")]
    Store(String),

    /// A reply whose shape the client contract does not allow
    #[error("unexpected reply from store: {0}")]
    UnexpectedReply(String),

    /// `block_until_ready` called with a zero wait budget
    #[error("timeout must be positive")]
    NonPositiveTimeout,

    /// `block_until_ready` observed a zero reset timestamp on a rejected
    /// response, which indicates a corrupt store reply
    #[error("invalid reset")]
    InvalidReset,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rate limiter operations.
pub type Result<T> = std::result::Result<T, RatelimitError>;
