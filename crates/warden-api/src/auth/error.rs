//! Authentication error type

use thiserror::Error;
use warden_core::WardenError;

use super::password::PasswordError;

/// Errors returned by `AuthService` and the token/password primitives
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked")]
    AccountLocked,

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Account already exists")]
    DuplicateAccount,

    #[error(transparent)]
    Store(#[from] WardenError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
