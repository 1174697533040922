//! Authentication service
//!
//! Core business logic for wallet-based authentication.

use alloy_primitives::Address;
use std::sync::Arc;
use thiserror::Error;

use crate::db::UserStore;
use crate::error::ApiError;

use super::jwt::{TokenError, TokenIssuer};
use super::nonce::{NonceError, NonceStore};
use super::siwe::SiweVerifier;

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing or invalid address")]
    MalformedAddress,

    #[error("Nonce not found or expired")]
    NonceNotFound,

    #[error("Invalid SIWE message")]
    InvalidSiweMessage,

    #[error("Invalid SIWE signature")]
    InvalidSignature,

    #[error("Nonce store error: {0}")]
    Nonce(#[from] NonceError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MalformedAddress => ApiError::BadRequest(e.to_string()),
            // Reported like any other bad message so callers cannot probe nonce state
            AuthError::NonceNotFound | AuthError::InvalidSiweMessage => {
                ApiError::BadRequest(AuthError::InvalidSiweMessage.to_string())
            }
            AuthError::InvalidSignature => ApiError::Unauthorized(e.to_string()),
            AuthError::Nonce(_) | AuthError::Token(_) => ApiError::InternalError(e.to_string()),
        }
    }
}

/// Token pair minted by a successful login
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    nonces: Arc<dyn NonceStore>,
    siwe: Arc<SiweVerifier>,
    tokens: TokenIssuer,
    users: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(
        nonces: Arc<dyn NonceStore>,
        siwe: SiweVerifier,
        tokens: TokenIssuer,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            nonces,
            siwe: Arc::new(siwe),
            tokens,
            users,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn users(&self) -> Arc<dyn UserStore> {
        self.users.clone()
    }

    /// Issue a login nonce for `address`, replacing any outstanding one.
    pub async fn issue_nonce(&self, address: Address) -> Result<String, AuthError> {
        Ok(self.nonces.issue(address).await?)
    }

    /// Exchange a signed SIWE message for a session.
    ///
    /// The nonce is consumed before anything else is checked, so every
    /// attempt burns it whether or not the login succeeds.
    pub async fn login(
        &self,
        address: Address,
        message: &str,
        signature: &str,
    ) -> Result<SessionTokens, AuthError> {
        let nonce = self
            .nonces
            .consume(address)
            .await?
            .ok_or(AuthError::NonceNotFound)?;

        if !self.siwe.validate_structure(message, address, &nonce) {
            return Err(AuthError::InvalidSiweMessage);
        }

        if !self.siwe.verify_signature(message, signature, address).await {
            tracing::warn!(%address, "SIWE signature verification failed");
            return Err(AuthError::InvalidSignature);
        }

        let tokens = SessionTokens {
            access: self.tokens.issue_access_token(address)?,
            refresh: self.tokens.issue_refresh_token(address)?,
        };

        let users = self.users.clone();
        tokio::spawn(async move {
            if let Err(e) = users.record_login(address).await {
                tracing::warn!(%address, error = %e, "Failed to record login");
            }
        });

        tracing::info!(%address, "Wallet logged in");
        Ok(tokens)
    }
}
