//! Request tracing middleware

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use super::auth::AuthenticatedUser;

/// Middleware for logging request information with timing
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Extract client IP if available
    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        });

    let start = Instant::now();

    tracing::debug!(
        method = %method,
        path = %path,
        client_ip = ?client_ip,
        "Request started"
    );

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    // Set by the session middleware on protected routes
    let wallet = response
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.wallet_address.to_checksum(None));

    if response.status().is_server_error() {
        tracing::error!(%method, %path, status, duration_ms, ?wallet, "Request completed with error");
    } else if response.status().is_client_error() {
        tracing::warn!(%method, %path, status, duration_ms, ?wallet, "Request completed with client error");
    } else {
        tracing::info!(%method, %path, status, duration_ms, ?wallet, "Request completed");
    }

    response
}
