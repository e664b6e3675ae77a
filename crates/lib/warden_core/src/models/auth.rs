//! Authentication domain models.
//!
//! These are internal domain models, distinct from the HTTP request and
//! response bodies in `warden_api`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored user account.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    /// Username as entered at registration.
    pub username: String,
    /// Upper-cased username used for case-insensitive lookups.
    pub normalized_username: String,
    /// bcrypt hash (salt embedded).
    pub password_hash: String,
    /// Rotates whenever credentials change; tokens carry the stamp they were issued under.
    pub security_stamp: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, safe to hand out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

impl From<&UserRecord> for User {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
        }
    }
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject — user ID (standard JWT `sub` claim).
    pub sub: String,
    /// Security stamp of the user at issuance.
    pub stamp: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// A signed bearer access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Compact JWT; the signature is its third segment.
    pub token: String,
    pub subject_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly issued refresh token. The plaintext only exists here.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub token_id: Uuid,
    pub subject_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Refresh token record held by the ledger.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    /// SHA-256 hex digest of the plaintext token.
    pub token_hash: String,
    pub subject_id: Uuid,
    /// Shared by every token descending from the same login.
    pub family_id: Uuid,
    pub security_stamp: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub superseded_by: Option<Uuid>,
    pub revoked: bool,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Always `"Bearer"`.
    pub token_type: String,
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub refresh_token: String,
}
