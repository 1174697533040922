//! Route definitions and router assembly

mod auth;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handlers;
use crate::middleware::{hsts_value, request_tracing, security_headers};
use crate::state::AppState;

pub use auth::{auth_routes, protected_routes};

/// Options for the outer layers of the router
#[derive(Debug, Clone, Default)]
pub struct RouterOptions<'a> {
    /// Comma-separated allowed origins; permissive when unset.
    pub cors_allowed_origins: Option<&'a str>,
    /// SPA assets, served for every unmatched path.
    pub static_dir: Option<&'a Path>,
    pub hsts: bool,
}

/// Build the full application router
pub fn create_router(state: AppState, options: RouterOptions<'_>) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(auth_routes())
        .merge(protected_routes(state.clone()));

    if let Some(dir) = options.static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        router = router.fallback_service(ServeDir::new(dir).fallback(index));
    }

    let router = router
        .with_state(state)
        .layer(from_fn(security_headers))
        .layer(from_fn(request_tracing))
        .layer(configure_cors(options.cors_allowed_origins));

    if options.hsts {
        router.layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            hsts_value(),
        ))
    } else {
        router
    }
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let Some(allowed_origins) = allowed_origins.filter(|s| !s.trim().is_empty()) else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    // Cookies only travel cross-origin with credentials enabled
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
