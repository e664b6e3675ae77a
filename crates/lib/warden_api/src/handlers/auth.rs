//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    LoginRequest, LogoutRequest, LogoutResponse, RefreshRequest, RegisterRequest, TokenPair,
    UserResponse,
};

/// `POST /register` — create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<UserResponse>> {
    let Json(body) = body?;
    let user = state.auth.register(&body.username, &body.password).await?;
    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
    }))
}

/// `POST /login` — authenticate with username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenPair>> {
    let Json(body) = body?;
    let resp = state.auth.login(&body.username, &body.password).await?;
    Ok(Json(resp))
}

/// `POST /refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<TokenPair>> {
    let Json(body) = body?;
    let resp = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(resp))
}

/// `POST /logout` — revoke a refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    body: Result<Json<LogoutRequest>, JsonRejection>,
) -> AppResult<Json<LogoutResponse>> {
    let Json(body) = body?;
    state.auth.logout(&body.refresh_token).await?;
    Ok(Json(LogoutResponse { success: true }))
}
