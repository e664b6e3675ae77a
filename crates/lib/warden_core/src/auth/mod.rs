//! Authentication core.
//!
//! Password hashing, access token issuance, the credential store, the
//! refresh-token ledger and the [`service::AuthService`] that ties them together.

pub mod jwt;
pub mod ledger;
pub mod password;
pub mod service;
pub mod store;
pub mod validation;

use thiserror::Error;

/// Errors surfaced by [`service::AuthService`].
///
/// Lower layers keep finer distinctions (see [`store::StoreError`],
/// [`jwt::TokenError`], [`ledger::LedgerError`]); they are logged and collapsed
/// into these variants so callers cannot tell, say, an unknown user from a
/// wrong password.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<store::StoreError> for AuthError {
    fn from(e: store::StoreError) -> Self {
        match e {
            store::StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            store::StoreError::NotFound => AuthError::Internal("user not found".into()),
            store::StoreError::Internal(msg) => AuthError::Internal(msg),
        }
    }
}
