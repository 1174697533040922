//! Session middleware
//!
//! Every protected request resolves to exactly one [`SessionOutcome`]: the
//! access cookie is honoured as-is, or an expired/missing access token is
//! replaced using the signed refresh cookie, or the request is rejected.

use alloy_primitives::Address;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{CookieJar, SignedCookieJar};
use thiserror::Error;

use crate::auth::cookies::{read_access, read_refresh};
use crate::auth::{parse_address, SessionToken, TokenIssuer};
use crate::error::ApiError;
use crate::state::AppState;

/// Reasons a protected request is turned away
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Failed to issue access token: {0}")]
    Issue(String),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Unauthorized | SessionError::InvalidToken => {
                ApiError::Unauthorized(e.to_string())
            }
            SessionError::Issue(_) => ApiError::InternalError(e.to_string()),
        }
    }
}

/// Terminal state of session resolution for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The access cookie verified; proceed.
    AccessValid(Address),
    /// A new access token was minted from the refresh cookie; proceed and set it.
    Refreshed {
        address: Address,
        access_token: String,
    },
    Rejected(SessionError),
}

/// Wallet bound to the current request by [`require_session`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub wallet_address: Address,
}

/// Decide what to do with a request given its (already cookie-decoded) tokens.
pub fn resolve_session(
    tokens: &TokenIssuer,
    access: Option<&str>,
    refresh: Option<&str>,
) -> SessionOutcome {
    if let Some(token) = access {
        match tokens.verify(token) {
            Ok(SessionToken::Access { sub }) => {
                return match parse_address(&sub) {
                    Ok(address) => SessionOutcome::AccessValid(address),
                    Err(_) => SessionOutcome::Rejected(SessionError::InvalidToken),
                };
            }
            Ok(SessionToken::Refresh { .. }) => {
                tracing::debug!("Refresh token presented in the access cookie");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Access token not usable, trying refresh");
            }
        }
    }

    let Some(token) = refresh else {
        return SessionOutcome::Rejected(SessionError::Unauthorized);
    };

    let sub = match tokens.verify(token) {
        Ok(SessionToken::Refresh { sub }) => sub,
        Ok(SessionToken::Access { .. }) => {
            tracing::debug!("Access token presented in the refresh cookie");
            return SessionOutcome::Rejected(SessionError::Unauthorized);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Refresh token rejected");
            return SessionOutcome::Rejected(SessionError::Unauthorized);
        }
    };

    let Ok(address) = parse_address(&sub) else {
        return SessionOutcome::Rejected(SessionError::InvalidToken);
    };

    match tokens.issue_access_token(address) {
        Ok(access_token) => SessionOutcome::Refreshed {
            address,
            access_token,
        },
        Err(e) => SessionOutcome::Rejected(SessionError::Issue(e.to_string())),
    }
}

/// Middleware guarding protected routes.
///
/// Inserts [`AuthenticatedUser`] into request and response extensions and,
/// after the handler has run, records activity for the wallet in the background.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    signed: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let access = read_access(&jar);
    let refresh = read_refresh(&signed);

    let (address, new_access) =
        match resolve_session(state.tokens(), access.as_deref(), refresh.as_deref()) {
            SessionOutcome::AccessValid(address) => (address, None),
            SessionOutcome::Refreshed {
                address,
                access_token,
            } => {
                tracing::debug!(%address, "Access token refreshed");
                (address, Some(access_token))
            }
            SessionOutcome::Rejected(e) => return ApiError::from(e).into_response(),
        };

    let user = AuthenticatedUser {
        wallet_address: address,
    };
    request.extensions_mut().insert(user.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);

    let users = state.users();
    tokio::spawn(async move {
        if let Err(e) = users.touch_last_active(address).await {
            tracing::warn!(%address, error = %e, "Failed to update last active time");
        }
    });

    match new_access {
        Some(token) => (state.cookies.write_access(CookieJar::new(), token), response).into_response(),
        None => response,
    }
}

/// Extractor for the wallet resolved by [`require_session`]
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     user.wallet_address.to_string()
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::from(SessionError::Unauthorized))
    }
}
