//! Password hashing via bcrypt.

use std::sync::LazyLock;

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Hash checked against when the user does not exist, so a failed login
/// costs the same whether or not the username is known.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| bcrypt::hash("warden-dummy-password", BCRYPT_COST).unwrap_or_default());

/// Hash a password with bcrypt (cost 10). The salt is random per call.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// Burn one verification's worth of work. Always returns `false`.
pub fn verify_dummy(password: &str) -> bool {
    let _ = bcrypt::verify(password, &DUMMY_HASH);
    false
}
