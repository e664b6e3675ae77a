//! Refresh token ledger — issuance, single-use rotation and revocation.
//!
//! Tokens are opaque random strings handed out once; the ledger stores only
//! their SHA-256 digest. Each record moves `Active -> Used` when redeemed,
//! `Active -> Revoked` on logout or reuse detection, and counts as expired
//! once `now >= expires_at` (checked lazily on redeem).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{DEFAULT_REFRESH_TOKEN_TTL_DAYS, IdentityConfig, positive_or};
use crate::models::auth::{RefreshToken, RefreshTokenRecord};
use crate::uuid::uuidv7;

/// How often the in-memory ledger drops expired records.
const CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(300);

/// Why a refresh token could not be redeemed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("refresh token not found")]
    NotFound,

    #[error("refresh token already used")]
    AlreadyUsed,

    #[error("refresh token expired")]
    Expired,

    #[error("refresh token revoked")]
    Revoked,

    #[error("ledger error: {0}")]
    Internal(String),
}

/// Result of a successful redemption.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub subject_id: Uuid,
    /// Security stamp the redeemed token was issued under.
    pub security_stamp: String,
    pub family_id: Uuid,
    /// Id of the token that was just consumed.
    pub redeemed_id: Uuid,
    /// Successor in the same family.
    pub refresh_token: RefreshToken,
}

/// Storage and state transitions for refresh tokens.
#[async_trait]
pub trait RefreshTokenLedger: Send + Sync {
    /// Issue a token starting a new family.
    async fn issue(
        &self,
        subject_id: Uuid,
        security_stamp: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, LedgerError>;

    /// Consume `token` and issue its successor. Of concurrent redemptions of
    /// the same token at most one succeeds.
    async fn redeem(&self, token: &str, now: DateTime<Utc>) -> Result<Redemption, LedgerError>;

    /// Revoke a single token. Returns whether an active token was revoked.
    async fn revoke(&self, token: &str) -> Result<bool, LedgerError>;

    /// Revoke every token in a family. Returns the number revoked.
    async fn revoke_family(&self, family_id: Uuid) -> Result<usize, LedgerError>;

    /// Revoke every token of a subject. Returns the number revoked.
    async fn revoke_subject(&self, subject_id: Uuid) -> Result<usize, LedgerError>;

    /// Drop records that expired before `now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, LedgerError>;
}

/// Generate a cryptographically random refresh token (64 alphanumeric chars).
fn generate_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a refresh token for storage.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Immutable fields of the record being redeemed.
struct Parent {
    hash: String,
    subject_id: Uuid,
    family_id: Uuid,
    security_stamp: String,
}

/// In-memory ledger keyed by token hash.
#[derive(Debug)]
pub struct MemoryLedger {
    tokens: DashMap<String, RefreshTokenRecord>,
    ttl: Duration,
    revoke_family_on_reuse: bool,
}

impl MemoryLedger {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl: positive_or(
                config.refresh_token_ttl,
                Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
                "refresh_token_ttl",
            ),
            revoke_family_on_reuse: config.revoke_family_on_reuse,
        }
    }

    /// Number of records held, in any state.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Look up the record for a plaintext token.
    pub fn record(&self, token: &str) -> Option<RefreshTokenRecord> {
        self.tokens
            .get(&hash_token(token))
            .map(|r| r.value().clone())
    }

    fn insert(
        &self,
        subject_id: Uuid,
        family_id: Uuid,
        security_stamp: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, LedgerError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| LedgerError::Internal("refresh token expiry out of range".into()))?;
        let token = generate_token();
        let record = RefreshTokenRecord {
            id: uuidv7(),
            token_hash: hash_token(&token),
            subject_id,
            family_id,
            security_stamp: security_stamp.to_string(),
            issued_at: now,
            expires_at,
            used: false,
            superseded_by: None,
            revoked: false,
        };
        let issued = RefreshToken {
            token,
            token_id: record.id,
            subject_id,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
        };
        self.tokens.insert(record.token_hash.clone(), record);
        Ok(issued)
    }

    /// Commit a redemption of the parent record: mark it used and linked to
    /// the staged `successor`, or drop the successor if the parent cannot be
    /// redeemed.
    fn settle(
        &self,
        parent: Parent,
        successor: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<Redemption, LedgerError> {
        let outcome = match self.tokens.get_mut(&parent.hash) {
            None => Err(LedgerError::NotFound),
            Some(mut entry) => {
                let record = entry.value_mut();
                if record.used {
                    Err(LedgerError::AlreadyUsed)
                } else if record.revoked {
                    Err(LedgerError::Revoked)
                } else if now >= record.expires_at {
                    Err(LedgerError::Expired)
                } else {
                    record.used = true;
                    record.superseded_by = Some(successor.token_id);
                    Ok(record.id)
                }
            }
        };

        let Parent {
            subject_id,
            family_id,
            security_stamp,
            ..
        } = parent;
        match outcome {
            Ok(redeemed_id) => Ok(Redemption {
                subject_id,
                security_stamp,
                family_id,
                redeemed_id,
                refresh_token: successor,
            }),
            Err(e) => {
                self.tokens.remove(&hash_token(&successor.token));
                if e == LedgerError::AlreadyUsed {
                    warn!(%subject_id, %family_id, "refresh token reuse detected");
                    if self.revoke_family_on_reuse {
                        let revoked = self.revoke_where(|r| r.family_id == family_id);
                        warn!(%family_id, revoked, "revoked refresh token family");
                    }
                }
                Err(e)
            }
        }
    }

    fn revoke_where(&self, pred: impl Fn(&RefreshTokenRecord) -> bool) -> usize {
        let mut count = 0;
        for mut entry in self.tokens.iter_mut() {
            let record = entry.value_mut();
            if !record.revoked && pred(record) {
                record.revoked = true;
                count += 1;
            }
        }
        count
    }

    /// Spawn a periodic task that purges expired records.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        clock: Arc<dyn Clock>,
    ) -> tokio::task::JoinHandle<()> {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                if let Ok(n) = ledger.purge_expired(clock.now()).await
                    && n > 0
                {
                    debug!(removed = n, "purged expired refresh tokens");
                }
            }
        })
    }
}

#[async_trait]
impl RefreshTokenLedger for MemoryLedger {
    async fn issue(
        &self,
        subject_id: Uuid,
        security_stamp: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, LedgerError> {
        self.insert(subject_id, uuidv7(), security_stamp, now)
    }

    async fn redeem(&self, token: &str, now: DateTime<Utc>) -> Result<Redemption, LedgerError> {
        let hash = hash_token(token);

        // Family, subject and stamp never change, so read them first and
        // stage the successor before taking the write lock on the parent.
        // A concurrent reuse that revokes the family then also catches the
        // staged successor.
        let parent = {
            let record = self.tokens.get(&hash).ok_or(LedgerError::NotFound)?;
            Parent {
                subject_id: record.subject_id,
                family_id: record.family_id,
                security_stamp: record.security_stamp.clone(),
                hash: hash.clone(),
            }
        };
        let successor = self.insert(
            parent.subject_id,
            parent.family_id,
            &parent.security_stamp,
            now,
        )?;
        self.settle(parent, successor, now)
    }

    async fn revoke(&self, token: &str) -> Result<bool, LedgerError> {
        match self.tokens.get_mut(&hash_token(token)) {
            Some(mut entry) if !entry.revoked => {
                entry.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_family(&self, family_id: Uuid) -> Result<usize, LedgerError> {
        Ok(self.revoke_where(|r| r.family_id == family_id))
    }

    async fn revoke_subject(&self, subject_id: Uuid) -> Result<usize, LedgerError> {
        Ok(self.revoke_where(|r| r.subject_id == subject_id))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, r| r.expires_at > now);
        Ok(before.saturating_sub(self.tokens.len()))
    }
}
