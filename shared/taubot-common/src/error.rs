//! Common error types.

/// Errors produced while parsing shared value types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Platform identifier was empty, too long or contained whitespace.
    #[error("Invalid platform id: {0:?}")]
    InvalidPlatformId(String),

    /// Account type name is not one of the known kinds.
    #[error("Unknown account type: {0}")]
    UnknownAccountType(String),
}

/// Result alias for common operations.
pub type Result<T> = std::result::Result<T, Error>;
