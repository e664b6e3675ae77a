//! Authentication middleware — Bearer token extraction and verification.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use warden_core::models::auth::User;

use crate::AppState;
use crate::error::AppError;

/// Key used to store the resolved `User` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Axum middleware: extracts `Authorization: Bearer <token>`, resolves it
/// through the auth service and injects `AuthenticatedUser` into request
/// extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = bearer_token(header)
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let user = state.auth.identify(token).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser(User::from(&user)));

    Ok(next.run(request).await)
}

/// Token from a `Bearer <token>` header value. The scheme is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER  abc "), Some("abc"));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_rejected() {
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearerabc"), None);
    }
}
