//! Greeting endpoint for authenticated callers.

use axum::Extension;

use crate::middleware::auth::AuthenticatedUser;

/// `GET /` — greet the caller by username.
pub async fn hello_handler(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> String {
    format!("Hello {}", user.username)
}
