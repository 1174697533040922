//! Authentication routes

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::middleware::require_session;
use crate::state::AppState;

/// Public login endpoints
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/nonce", get(auth::get_nonce))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
}

/// Endpoints behind the session middleware
pub fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route_layer(from_fn_with_state(state, require_session))
}
