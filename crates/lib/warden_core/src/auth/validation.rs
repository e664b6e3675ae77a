//! Username and password rules applied at registration and password change.

use super::AuthError;

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LENGTH: usize = 256;

/// bcrypt only looks at the first 72 bytes; refuse anything longer.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Punctuation allowed in usernames besides ASCII letters and digits.
const USERNAME_EXTRA_CHARS: &str = "-._@+";

/// Check a username. Surrounding whitespace is ignored.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::Validation("Username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::Validation(format!(
            "Username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !USERNAME_EXTRA_CHARS.contains(*c))
    {
        return Err(AuthError::Validation(format!(
            "Username contains invalid character '{bad}'"
        )));
    }
    Ok(())
}

/// Check a password against the configured minimum length.
pub fn validate_password(password: &str, min_length: usize) -> Result<(), AuthError> {
    if password.chars().count() < min_length {
        return Err(AuthError::Validation(format!(
            "Password must be at least {min_length} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_usernames() {
        for name in ["alice", "Bob_99", "carol.doe@example.com", "d-e+f"] {
            validate_username(name).unwrap();
        }
    }

    #[test]
    fn rejects_empty_and_odd_usernames() {
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("semi;colon").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn password_length_bounds() {
        validate_password("secret", 6).unwrap();
        assert!(validate_password("short", 6).is_err());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_BYTES + 1), 6).is_err());
        validate_password(&"x".repeat(MAX_PASSWORD_BYTES), 6).unwrap();
    }
}
