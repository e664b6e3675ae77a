//! Current-user endpoint.

use axum::{Extension, Json};

use crate::middleware::auth::AuthenticatedUser;
use crate::models::UserResponse;

/// `GET /users/me` — the user behind the bearer token.
pub async fn me_handler(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}
