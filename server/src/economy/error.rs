//! Economy operation errors.

use crate::commands::ArgumentError;
use crate::permissions::{Permission, PermissionError, StoreError};

/// Errors returned by the economy operations.
///
/// Everything except [`Self::Store`] and [`Self::Database`] is the caller's
/// doing and is shown back to the invoking user.
#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("You are missing the `{0}` permission")]
    Unauthorized(Permission),

    #[error("This command can only be used inside a server")]
    NoGuild,

    #[error("This server is not registered to an economy")]
    Unregistered,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient funds: only {available} available")]
    InsufficientFunds { available: i64 },

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EconomyError {
    /// Whether the message should be shown to the user instead of failing the command.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Database(_))
    }

    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl From<PermissionError> for EconomyError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::Denied(permission) => Self::Unauthorized(permission),
            PermissionError::Store(e) => Self::Store(e),
        }
    }
}

impl From<validator::ValidationErrors> for EconomyError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type EconomyResult<T> = Result<T, EconomyError>;
