//! Access token issuance and verification (HS256 JWT).

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use crate::config::{DEFAULT_ACCESS_TOKEN_TTL_SECS, IdentityConfig, positive_or};
use crate::models::auth::{AccessClaims, AccessToken};

/// Why an access token was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("access token expired")]
    Expired,

    #[error("access token signature mismatch")]
    InvalidSignature,

    #[error("access token malformed")]
    Malformed,
}

/// Mints and verifies access tokens with the process-wide signing secret.
///
/// Expiry is checked against the `now` passed in rather than the system
/// clock inside `jsonwebtoken`, so callers control time.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &IdentityConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: positive_or(
                config.access_token_ttl,
                chrono::Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
                "access_token_ttl",
            ),
        }
    }

    /// Access token lifetime in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Sign a new access token for `subject_id`, valid from `now` for the configured TTL.
    pub fn issue(
        &self,
        subject_id: Uuid,
        security_stamp: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, AuthError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Internal("access token expiry out of range".into()))?;
        let claims = AccessClaims {
            sub: subject_id.to_string(),
            stamp: security_stamp.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))?;
        Ok(AccessToken {
            token,
            subject_id,
            issued_at: now,
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the claims on success.
    ///
    /// A token is valid while `now` is strictly before its `exp`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        let data = decode::<AccessClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "access token rejected");
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;
        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(&IdentityConfig::new(secret))
    }

    #[test]
    fn token_valid_shortly_after_issue() {
        let issuer = issuer("test-secret");
        let subject = Uuid::now_v7();
        let t = Utc::now();
        let token = issuer.issue(subject, "stamp", t).unwrap();

        let claims = issuer.verify(&token.token, t + Duration::seconds(1)).unwrap();
        assert_eq!(claims.sub, subject.to_string());
        assert_eq!(claims.stamp, "stamp");
        assert_eq!(token.expires_at - token.issued_at, Duration::minutes(15));
    }

    #[test]
    fn token_expires_after_ttl() {
        let issuer = issuer("test-secret");
        let t = Utc::now();
        let token = issuer.issue(Uuid::now_v7(), "stamp", t).unwrap();

        let late = t + Duration::seconds(issuer.ttl_secs() + 1);
        assert_eq!(issuer.verify(&token.token, late), Err(TokenError::Expired));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let t = Utc::now();
        let token = issuer("secret-a").issue(Uuid::now_v7(), "stamp", t).unwrap();
        assert_eq!(
            issuer("secret-b").verify(&token.token, t),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let issuer = issuer("test-secret");
        assert_eq!(
            issuer.verify("not-a-jwt", Utc::now()),
            Err(TokenError::Malformed)
        );
        assert_eq!(issuer.verify("", Utc::now()), Err(TokenError::Malformed));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let issuer = issuer("test-secret");
        let t = Utc::now();
        let token = issuer.issue(Uuid::now_v7(), "stamp", t).unwrap();
        let other = issuer.issue(Uuid::now_v7(), "stamp", t).unwrap();

        // Splice the payload of one token onto the signature of another.
        let a: Vec<&str> = token.token.split('.').collect();
        let b: Vec<&str> = other.token.split('.').collect();
        let forged = format!("{}.{}.{}", a[0], b[1], a[2]);
        assert_eq!(
            issuer.verify(&forged, t),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn non_positive_ttl_uses_default() {
        let mut config = IdentityConfig::new("test-secret");
        config.access_token_ttl = Duration::seconds(-5);
        let issuer = TokenIssuer::new(&config);
        assert_eq!(issuer.ttl_secs(), 15 * 60);

        let t = Utc::now();
        let token = issuer.issue(Uuid::now_v7(), "stamp", t).unwrap();
        assert!(issuer.verify(&token.token, t + Duration::seconds(1)).is_ok());
    }

    #[test]
    fn overflowing_expiry_is_an_error() {
        let mut config = IdentityConfig::new("test-secret");
        config.access_token_ttl = Duration::days(100_000_000);
        let issuer = TokenIssuer::new(&config);
        assert!(matches!(
            issuer.issue(Uuid::now_v7(), "stamp", Utc::now()),
            Err(AuthError::Internal(_))
        ));
    }
}
