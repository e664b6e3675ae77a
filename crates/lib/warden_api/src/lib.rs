//! # warden_api
//!
//! HTTP API library for Warden.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;
use warden_core::auth::service::AuthService;

use crate::config::ApiConfig;
use crate::handlers::{auth, hello, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Identity operations.
    pub auth: Arc<AuthService>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// State backed by the in-memory credential store and refresh ledger.
    pub fn in_memory(config: ApiConfig) -> Self {
        Self {
            auth: Arc::new(AuthService::in_memory(config.identity.clone())),
            config,
        }
    }
}

/// Credentialed CORS for the configured origins, any header, any method.
///
/// Wildcards are not allowed together with credentials, so headers and
/// methods are mirrored from the preflight request instead.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_REGISTER, post(auth::register_handler))
        .route(routes::POST_LOGIN, post(auth::login_handler))
        .route(routes::POST_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_LOGOUT, post(auth::logout_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_ROOT, get(hello::hello_handler))
        .route(routes::GET_USERS_ME, get(users::me_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
