//! Authentication service — register, login, refresh and identify.
//!
//! Orchestrates the credential store, password hasher, token issuer and
//! refresh ledger. Failures from lower layers are logged with their detail
//! and collapsed into [`AuthError`] before they leave this module.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::jwt::TokenIssuer;
use super::ledger::{LedgerError, MemoryLedger, RefreshTokenLedger};
use super::password;
use super::store::{CredentialStore, MemoryCredentialStore, StoreError};
use super::validation::{validate_password, validate_username};
use crate::clock::{Clock, SystemClock};
use crate::config::IdentityConfig;
use crate::models::auth::{RefreshToken, TokenPair, UserRecord};

/// Token type reported alongside every token pair.
const TOKEN_TYPE: &str = "Bearer";

/// Entry point for all identity operations.
#[derive(Clone)]
pub struct AuthService {
    config: IdentityConfig,
    store: Arc<dyn CredentialStore>,
    ledger: Arc<dyn RefreshTokenLedger>,
    issuer: TokenIssuer,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        config: IdentityConfig,
        store: Arc<dyn CredentialStore>,
        ledger: Arc<dyn RefreshTokenLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = TokenIssuer::new(&config);
        Self {
            config,
            store,
            ledger,
            issuer,
            clock,
        }
    }

    /// Service backed by the in-memory store and ledger, on wall-clock time.
    ///
    /// When called inside a Tokio runtime the ledger's purge task is started
    /// and runs for the life of the runtime. Outside a runtime expired
    /// refresh tokens are only rejected, never dropped.
    pub fn in_memory(config: IdentityConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = Arc::new(MemoryLedger::new(&config));
        if tokio::runtime::Handle::try_current().is_ok() {
            drop(ledger.spawn_cleanup_task(clock.clone()));
        } else {
            debug!("no runtime, refresh ledger cleanup not started");
        }
        Self::new(config, Arc::new(MemoryCredentialStore::new()), ledger, clock)
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Create an account. The password is hashed before the store is touched.
    pub async fn register(&self, username: &str, password: &str) -> Result<UserRecord, AuthError> {
        validate_username(username)?;
        validate_password(password, self.config.min_password_length)?;

        let hash = hash_off_thread(password).await?;
        let user = self.store.create(username, &hash).await.map_err(|e| {
            debug!(error = %e, "registration rejected");
            AuthError::from(e)
        })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Authenticate with username + password and issue a token pair.
    ///
    /// An unknown username and a wrong password fail identically.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = match self.store.find_by_username(username).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                burn_dummy_verify(password).await;
                debug!("login failed: unknown username");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_off_thread(password, &user.password_hash).await? {
            debug!(user_id = %user.id, "login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now();
        let refresh = self
            .ledger
            .issue(user.id, &user.security_stamp, now)
            .await
            .map_err(ledger_internal)?;

        info!(user_id = %user.id, "user logged in");
        self.token_pair(&user, refresh, now)
    }

    /// Exchange a refresh token for a new token pair (single-use rotation).
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let now = self.clock.now();
        let redemption = self
            .ledger
            .redeem(refresh_token, now)
            .await
            .map_err(|e| match e {
                LedgerError::Internal(msg) => AuthError::Internal(msg),
                other => {
                    debug!(reason = %other, "refresh rejected");
                    AuthError::InvalidRefreshToken
                }
            })?;

        let user = match self.store.find_by_id(redemption.subject_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                warn!(subject_id = %redemption.subject_id, "refresh token for missing user");
                self.discard(&redemption.refresh_token).await?;
                return Err(AuthError::InvalidRefreshToken);
            }
            Err(e) => return Err(e.into()),
        };

        if user.security_stamp != redemption.security_stamp {
            debug!(user_id = %user.id, "refresh rejected: security stamp changed");
            self.discard(&redemption.refresh_token).await?;
            return Err(AuthError::InvalidRefreshToken);
        }

        debug!(user_id = %user.id, family_id = %redemption.family_id, "refresh token rotated");
        self.token_pair(&user, redemption.refresh_token, now)
    }

    /// Resolve the user behind a bearer access token.
    pub async fn identify(&self, access_token: &str) -> Result<UserRecord, AuthError> {
        let claims = self
            .issuer
            .verify(access_token, self.clock.now())
            .map_err(|e| {
                debug!(reason = %e, "identify rejected");
                AuthError::Unauthenticated
            })?;

        let subject_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            debug!("identify rejected: subject is not a uuid");
            AuthError::Unauthenticated
        })?;

        let user = match self.store.find_by_id(subject_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AuthError::Unauthenticated),
            Err(e) => return Err(e.into()),
        };

        if user.security_stamp != claims.stamp {
            debug!(user_id = %user.id, "identify rejected: security stamp changed");
            return Err(AuthError::Unauthenticated);
        }
        Ok(user)
    }

    /// Change a password. Rotates the security stamp, which invalidates every
    /// outstanding access token, and revokes all refresh tokens of the user.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<UserRecord, AuthError> {
        let user = match self.store.find_by_id(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AuthError::Unauthenticated),
            Err(e) => return Err(e.into()),
        };
        if !verify_off_thread(current_password, &user.password_hash).await? {
            debug!(user_id = %user.id, "password change rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        validate_password(new_password, self.config.min_password_length)?;

        let hash = hash_off_thread(new_password).await?;
        let updated = self.store.update_password(user_id, &hash).await?;
        let revoked = self
            .ledger
            .revoke_subject(user_id)
            .await
            .map_err(ledger_internal)?;

        info!(user_id = %user_id, revoked, "password changed");
        Ok(updated)
    }

    /// Revoke one refresh token. Unknown tokens are not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<bool, AuthError> {
        self.ledger
            .revoke(refresh_token)
            .await
            .map_err(ledger_internal)
    }

    /// Revoke every refresh token of a user.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<usize, AuthError> {
        let revoked = self
            .ledger
            .revoke_subject(user_id)
            .await
            .map_err(ledger_internal)?;
        info!(user_id = %user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    /// Pair a fresh access token with `refresh`.
    fn token_pair(
        &self,
        user: &UserRecord,
        refresh: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        let access = self.issuer.issue(user.id, &user.security_stamp, now)?;
        Ok(TokenPair {
            token_type: TOKEN_TYPE.to_string(),
            access_token: access.token,
            expires_in: self.issuer.ttl_secs(),
            refresh_token: refresh.token,
        })
    }

    async fn discard(&self, token: &RefreshToken) -> Result<(), AuthError> {
        self.ledger
            .revoke(&token.token)
            .await
            .map(|_| ())
            .map_err(ledger_internal)
    }
}

fn ledger_internal(e: LedgerError) -> AuthError {
    AuthError::Internal(e.to_string())
}

/// bcrypt is CPU-bound; keep it off the async workers.
async fn hash_off_thread(plaintext: &str) -> Result<String, AuthError> {
    let plaintext = plaintext.to_string();
    tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|e| AuthError::Internal(format!("hash task: {e}")))?
}

async fn verify_off_thread(plaintext: &str, hash: &str) -> Result<bool, AuthError> {
    let plaintext = plaintext.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("verify task: {e}")))?
}

async fn burn_dummy_verify(plaintext: &str) {
    let plaintext = plaintext.to_string();
    let _ = tokio::task::spawn_blocking(move || password::verify_dummy(&plaintext)).await;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::ManualClock;

    struct Harness {
        service: AuthService,
        clock: Arc<ManualClock>,
    }

    fn harness(revoke_family_on_reuse: bool) -> Harness {
        let mut config = IdentityConfig::new("test-secret");
        config.revoke_family_on_reuse = revoke_family_on_reuse;
        let clock = Arc::new(ManualClock::default());
        let ledger = Arc::new(MemoryLedger::new(&config));
        let service = AuthService::new(
            config,
            Arc::new(MemoryCredentialStore::new()),
            ledger,
            clock.clone(),
        );
        Harness { service, clock }
    }

    #[tokio::test]
    async fn register_same_username_twice_fails() {
        let h = harness(true);
        h.service.register("alice", "secret").await.unwrap();

        assert_eq!(
            h.service.register("alice", "secret").await.unwrap_err(),
            AuthError::DuplicateUsername
        );
        assert_eq!(
            h.service.register("Alice", "another").await.unwrap_err(),
            AuthError::DuplicateUsername
        );
    }

    #[tokio::test]
    async fn register_validates_input() {
        let h = harness(true);
        assert!(matches!(
            h.service.register("", "secret").await.unwrap_err(),
            AuthError::Validation(_)
        ));
        assert!(matches!(
            h.service.register("alice", "abc").await.unwrap_err(),
            AuthError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn login_then_identify_returns_user() {
        let h = harness(true);
        let alice = h.service.register("alice", "secret").await.unwrap();

        let pair = h.service.login("alice", "secret").await.unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 15 * 60);
        assert!(!pair.refresh_token.is_empty());

        let who = h.service.identify(&pair.access_token).await.unwrap();
        assert_eq!(who.id, alice.id);
        assert_eq!(who.username, "alice");
    }

    #[tokio::test]
    async fn login_is_case_insensitive_on_username() {
        let h = harness(true);
        h.service.register("alice", "secret").await.unwrap();
        assert!(h.service.login("ALICE", "secret").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_indistinguishable() {
        let h = harness(true);
        h.service.register("alice", "secret").await.unwrap();

        let wrong = h.service.login("alice", "not-it").await.unwrap_err();
        let unknown = h.service.login("mallory", "secret").await.unwrap_err();
        assert_eq!(wrong, AuthError::InvalidCredentials);
        assert_eq!(wrong, unknown);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn access_token_expires_after_ttl() {
        let h = harness(true);
        h.service.register("alice", "secret").await.unwrap();
        let pair = h.service.login("alice", "secret").await.unwrap();

        h.clock.advance(Duration::seconds(1));
        assert!(h.service.identify(&pair.access_token).await.is_ok());

        h.clock.advance(Duration::seconds(pair.expires_in));
        assert_eq!(
            h.service.identify(&pair.access_token).await.unwrap_err(),
            AuthError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_reuse() {
        let h = harness(false);
        h.service.register("alice", "secret").await.unwrap();
        let first = h.service.login("alice", "secret").await.unwrap();

        let second = h.service.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert!(h.service.identify(&second.access_token).await.is_ok());

        assert_eq!(
            h.service.refresh(&first.refresh_token).await.unwrap_err(),
            AuthError::InvalidRefreshToken
        );
        // Without family revocation the successor keeps working.
        assert!(h.service.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_reuse_revokes_family_by_default() {
        let h = harness(true);
        h.service.register("alice", "secret").await.unwrap();
        let first = h.service.login("alice", "secret").await.unwrap();
        let second = h.service.refresh(&first.refresh_token).await.unwrap();

        h.service.refresh(&first.refresh_token).await.unwrap_err();
        assert_eq!(
            h.service.refresh(&second.refresh_token).await.unwrap_err(),
            AuthError::InvalidRefreshToken
        );
    }

    #[tokio::test]
    async fn refresh_token_expires() {
        let h = harness(true);
        h.service.register("alice", "secret").await.unwrap();
        let pair = h.service.login("alice", "secret").await.unwrap();

        h.clock.advance(Duration::days(14) + Duration::seconds(1));
        assert_eq!(
            h.service.refresh(&pair.refresh_token).await.unwrap_err(),
            AuthError::InvalidRefreshToken
        );
    }

    #[tokio::test]
    async fn unknown_refresh_token_is_invalid() {
        let h = harness(true);
        assert_eq!(
            h.service.refresh("made-up").await.unwrap_err(),
            AuthError::InvalidRefreshToken
        );
    }

    #[tokio::test]
    async fn garbage_access_token_is_unauthenticated() {
        let h = harness(true);
        assert_eq!(
            h.service.identify("garbage").await.unwrap_err(),
            AuthError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn change_password_invalidates_outstanding_tokens() {
        let h = harness(true);
        let alice = h.service.register("alice", "secret").await.unwrap();
        let pair = h.service.login("alice", "secret").await.unwrap();

        assert_eq!(
            h.service
                .change_password(alice.id, "wrong!", "n3w-secret")
                .await
                .unwrap_err(),
            AuthError::InvalidCredentials
        );
        h.service
            .change_password(alice.id, "secret", "n3w-secret")
            .await
            .unwrap();

        assert_eq!(
            h.service.identify(&pair.access_token).await.unwrap_err(),
            AuthError::Unauthenticated
        );
        assert_eq!(
            h.service.refresh(&pair.refresh_token).await.unwrap_err(),
            AuthError::InvalidRefreshToken
        );
        assert_eq!(
            h.service.login("alice", "secret").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        let fresh = h.service.login("alice", "n3w-secret").await.unwrap();
        assert!(h.service.identify(&fresh.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token() {
        let h = harness(true);
        let alice = h.service.register("alice", "secret").await.unwrap();
        let a = h.service.login("alice", "secret").await.unwrap();
        let b = h.service.login("alice", "secret").await.unwrap();

        assert!(h.service.logout(&a.refresh_token).await.unwrap());
        assert!(!h.service.logout(&a.refresh_token).await.unwrap());
        assert!(h.service.refresh(&a.refresh_token).await.is_err());
        assert!(h.service.refresh(&b.refresh_token).await.is_ok());

        let c = h.service.login("alice", "secret").await.unwrap();
        assert!(h.service.logout_all(alice.id).await.unwrap() >= 1);
        assert!(h.service.refresh(&c.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn login_with_out_of_range_lifetimes_does_not_panic() {
        let mut config = IdentityConfig::new("test-secret");
        config.access_token_ttl = Duration::seconds(-5);
        let service = AuthService::new(
            config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryLedger::new(&IdentityConfig::new("test-secret"))),
            Arc::new(ManualClock::default()),
        );
        service.register("alice", "secret").await.unwrap();

        let pair = service.login("alice", "secret").await.unwrap();
        assert_eq!(pair.expires_in, 15 * 60);
        assert!(service.identify(&pair.access_token).await.is_ok());

        let overflowing = {
            let mut config = IdentityConfig::new("test-secret");
            config.refresh_token_ttl = Duration::days(100_000_000);
            AuthService::new(
                config.clone(),
                Arc::new(MemoryCredentialStore::new()),
                Arc::new(MemoryLedger::new(&config)),
                Arc::new(ManualClock::default()),
            )
        };
        overflowing.register("bob", "secret").await.unwrap();
        assert!(matches!(
            overflowing.login("bob", "secret").await.unwrap_err(),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn in_memory_builds_outside_a_runtime() {
        let service = AuthService::in_memory(IdentityConfig::new("test-secret"));
        assert_eq!(service.config().min_password_length, 6);
    }

    #[tokio::test]
    async fn in_memory_serves_full_flow() {
        let service = AuthService::in_memory(IdentityConfig::new("test-secret"));
        service.register("alice", "secret").await.unwrap();
        let pair = service.login("alice", "secret").await.unwrap();
        let rotated = service.refresh(&pair.refresh_token).await.unwrap();
        assert!(service.identify(&rotated.access_token).await.is_ok());
    }
}
