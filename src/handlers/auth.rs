//! Authentication HTTP handlers
//!
//! Endpoints for Sign-In-With-Ethereum login and the cookie session.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use axum_extra::extract::cookie::{CookieJar, SignedCookieJar};
use validator::Validate;

use crate::auth::{parse_address, AuthError};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::{ApiResponse, LoginRequest, NonceQuery, NonceResponse, SessionResponse};
use crate::state::AppState;

/// GET /auth/nonce?address=0x... - Issue a login nonce for a wallet
pub async fn get_nonce(
    State(state): State<AppState>,
    query: Result<Query<NonceQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<NonceResponse>>> {
    let Query(query) = query.map_err(|e| {
        tracing::debug!(error = %e, "Rejected nonce query");
        AuthError::MalformedAddress
    })?;
    query.validate().map_err(|_| AuthError::MalformedAddress)?;
    let address = query
        .address
        .as_deref()
        .ok_or(AuthError::MalformedAddress)
        .and_then(|raw| parse_address(raw).map_err(|_| AuthError::MalformedAddress))?;

    let nonce = state.auth_service.issue_nonce(address).await?;

    Ok(Json(ApiResponse::ok(
        NonceResponse { nonce },
        "Generated SIWE nonce",
    )))
}

/// POST /auth/login - Verify a signed SIWE message and start a session
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    signed: SignedCookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(CookieJar, SignedCookieJar, Json<ApiResponse<SessionResponse>>)> {
    let Json(req) = body.map_err(|e| {
        tracing::debug!(error = %e, "Rejected login body");
        ApiError::BadRequest("Invalid login request".to_string())
    })?;

    if let Err(e) = req.validate() {
        let address_invalid = e.field_errors().contains_key("address");
        return Err(if address_invalid {
            AuthError::MalformedAddress.into()
        } else {
            AuthError::InvalidSiweMessage.into()
        });
    }
    let address = parse_address(&req.address).map_err(|_| AuthError::MalformedAddress)?;

    let tokens = state
        .auth_service
        .login(address, &req.message, &req.signature)
        .await?;

    let jar = state.cookies.write_access(jar, tokens.access);
    let signed = state.cookies.write_refresh(signed, tokens.refresh);

    Ok((
        jar,
        signed,
        Json(ApiResponse::ok(
            SessionResponse {
                address: address.to_checksum(None),
            },
            "Logged in successfully",
        )),
    ))
}

/// GET /auth/me - The wallet bound to the current session
pub async fn me(user: AuthenticatedUser) -> Json<ApiResponse<SessionResponse>> {
    Json(ApiResponse::ok(
        SessionResponse {
            address: user.wallet_address.to_checksum(None),
        },
        "Authenticated",
    ))
}

/// POST /auth/logout - Drop both session cookies
///
/// Tokens stay valid until they expire; there is no server-side revocation.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    signed: SignedCookieJar,
) -> (CookieJar, SignedCookieJar, Json<ApiResponse<()>>) {
    let (jar, signed) = state.cookies.clear(jar, signed);
    (jar, signed, Json(ApiResponse::message_only("Logged out")))
}
