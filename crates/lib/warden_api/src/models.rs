//! Request and response bodies (camelCase on the wire).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use warden_core::models::auth::TokenPair;

/// Body of `POST /register` and `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

pub type RegisterRequest = CredentialsRequest;
pub type LoginRequest = CredentialsRequest;

/// Body of `POST /refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Body of `POST /logout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
}

/// A user as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
}

impl From<warden_core::models::auth::User> for UserResponse {
    fn from(user: warden_core::models::auth::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
