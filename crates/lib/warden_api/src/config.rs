//! API server configuration.

use warden_core::config::IdentityConfig;

/// Default CORS origin: a local frontend dev server.
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// Origins allowed to make credentialed cross-origin requests.
    pub allowed_origins: Vec<String>,
    /// Signing secret and token lifetimes.
    pub identity: IdentityConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable               | Default                 |
    /// |------------------------|-------------------------|
    /// | `BIND_ADDR`            | `127.0.0.1:3100`        |
    /// | `CORS_ALLOWED_ORIGINS` | `http://localhost:3000` |
    ///
    /// Identity settings come from [`IdentityConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            allowed_origins: parse_origins(
                &std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.into()),
            ),
            identity: IdentityConfig::from_env(),
        }
    }
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
