//! Identity configuration — signing secret and token lifetimes.
//!
//! Built once at startup and handed to the token issuer and refresh ledger.
//! Nothing in the core reads configuration from globals.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, TimeDelta};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::warn;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 14 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 14;

/// Minimum password length accepted at registration.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// Configuration for the identity core.
#[derive(Clone)]
pub struct IdentityConfig {
    /// HS256 signing secret for access tokens.
    pub jwt_secret: String,
    /// Lifetime of an access token.
    pub access_token_ttl: Duration,
    /// Lifetime of a refresh token. Must exceed the access token lifetime.
    pub refresh_token_ttl: Duration,
    /// Revoke the whole token family when a used refresh token is presented again.
    pub revoke_family_on_reuse: bool,
    /// Minimum password length in characters.
    pub min_password_length: usize,
}

impl IdentityConfig {
    /// Config with default lifetimes and the given signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            revoke_family_on_reuse: true,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }

    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                      |
    /// |------------------------------|------------------------------|
    /// | `JWT_SECRET` / `AUTH_SECRET` | random, per process          |
    /// | `ACCESS_TOKEN_TTL_SECS`      | `900`                        |
    /// | `REFRESH_TOKEN_TTL_DAYS`     | `14`                         |
    /// | `REVOKE_FAMILY_ON_REUSE`     | `true`                       |
    /// | `MIN_PASSWORD_LENGTH`        | `6`                          |
    pub fn from_env() -> Self {
        let mut config = Self::new(resolve_jwt_secret());
        config.access_token_ttl = ttl_or_default(
            "ACCESS_TOKEN_TTL_SECS",
            env_or("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL_SECS),
            DEFAULT_ACCESS_TOKEN_TTL_SECS,
            TimeDelta::try_seconds,
        );
        config.refresh_token_ttl = ttl_or_default(
            "REFRESH_TOKEN_TTL_DAYS",
            env_or("REFRESH_TOKEN_TTL_DAYS", DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            TimeDelta::try_days,
        );
        config.revoke_family_on_reuse = env_or("REVOKE_FAMILY_ON_REUSE", true);
        config.min_password_length = env_or("MIN_PASSWORD_LENGTH", DEFAULT_MIN_PASSWORD_LENGTH);

        if config.refresh_token_ttl <= config.access_token_ttl {
            warn!(
                access_secs = config.access_token_ttl.num_seconds(),
                refresh_secs = config.refresh_token_ttl.num_seconds(),
                "refresh token lifetime does not exceed access token lifetime"
            );
        }
        config
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("revoke_family_on_reuse", &self.revoke_family_on_reuse)
            .field("min_password_length", &self.min_password_length)
            .finish()
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → random.
///
/// A random secret lives only as long as the process, which matches the
/// lifetime of the in-memory stores.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    warn!("no JWT_SECRET configured, generating a per-process signing secret");
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Parse an env var, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparsable config value");
                default
            }
        },
        Err(_) => default,
    }
}

/// Convert a configured lifetime, falling back to `default` when it is not
/// positive or does not fit a `TimeDelta`.
fn ttl_or_default(
    key: &str,
    value: i64,
    default: i64,
    unit: fn(i64) -> Option<TimeDelta>,
) -> Duration {
    match unit(value) {
        Some(ttl) if value > 0 => ttl,
        _ => {
            warn!(key, value, "ignoring out-of-range token lifetime");
            unit(default).unwrap_or(TimeDelta::zero())
        }
    }
}

/// `ttl` if positive, otherwise `default`. Guards lifetimes set directly on
/// an [`IdentityConfig`] rather than read through [`IdentityConfig::from_env`].
pub(crate) fn positive_or(ttl: Duration, default: Duration, what: &str) -> Duration {
    if ttl > Duration::zero() {
        ttl
    } else {
        warn!(what, secs = ttl.num_seconds(), "non-positive token lifetime, using default");
        default
    }
}
