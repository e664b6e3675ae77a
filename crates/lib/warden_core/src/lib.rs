//! # warden_core
//!
//! Core identity logic for Warden: credential storage, password hashing,
//! access token issuance and refresh-token rotation.

pub mod auth;
pub mod clock;
pub mod config;
pub mod models;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
