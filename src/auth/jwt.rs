//! JWT token generation and validation
//!
//! Handles creation and verification of access and refresh tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use alloy_primitives::Address;

use crate::config::SessionTimings;

/// Value of the `type` claim carried by refresh tokens.
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// JWT-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Wire claims shared by both token kinds. Access tokens carry no `type`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (wallet address)
    pub sub: String,
    /// Token type, only present on refresh tokens
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// A verified token, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionToken {
    Access { sub: String },
    Refresh { sub: String },
}

impl SessionToken {
    pub fn kind(&self) -> TokenKind {
        match self {
            SessionToken::Access { .. } => TokenKind::Access,
            SessionToken::Refresh { .. } => TokenKind::Refresh,
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            SessionToken::Access { sub } | SessionToken::Refresh { sub } => sub,
        }
    }
}

impl TryFrom<Claims> for SessionToken {
    type Error = TokenError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        match claims.token_type.as_deref() {
            None => Ok(SessionToken::Access { sub: claims.sub }),
            Some(REFRESH_TOKEN_TYPE) => Ok(SessionToken::Refresh { sub: claims.sub }),
            Some(other) => Err(TokenError::InvalidToken(format!(
                "unknown token type '{other}'"
            ))),
        }
    }
}

/// Mints and verifies HS256 session tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    timings: SessionTimings,
}

impl TokenIssuer {
    pub fn new(secret: &str, timings: SessionTimings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            timings,
        }
    }

    pub fn timings(&self) -> SessionTimings {
        self.timings
    }

    /// Generate an access token for a wallet, valid from now.
    pub fn issue_access_token(&self, address: Address) -> Result<String, TokenError> {
        self.issue_access_token_at(address, Utc::now())
    }

    /// Generate a refresh token for a wallet, usable after the refresh delay.
    pub fn issue_refresh_token(&self, address: Address) -> Result<String, TokenError> {
        self.issue_refresh_token_at(address, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        address: Address,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.generate_token(
            address,
            issued_at,
            0,
            self.timings.access_ttl_seconds,
            TokenKind::Access,
        )
    }

    pub fn issue_refresh_token_at(
        &self,
        address: Address,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.generate_token(
            address,
            issued_at,
            self.timings.refresh_not_before_seconds,
            self.timings.refresh_ttl_seconds,
            TokenKind::Refresh,
        )
    }

    fn generate_token(
        &self,
        address: Address,
        issued_at: DateTime<Utc>,
        not_before_seconds: i64,
        ttl_seconds: i64,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        let token_type = match kind {
            TokenKind::Access => None,
            TokenKind::Refresh => Some(REFRESH_TOKEN_TYPE.to_string()),
        };

        let claims = Claims {
            sub: address.to_checksum(None),
            token_type,
            iat: issued_at.timestamp(),
            nbf: (issued_at + Duration::seconds(not_before_seconds)).timestamp(),
            exp: (issued_at + Duration::seconds(ttl_seconds)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))
    }

    /// Verify signature, `exp` and `nbf`, then decode the token kind.
    pub fn verify(&self, token: &str) -> Result<SessionToken, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::TokenExpired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                _ => TokenError::InvalidToken(e.to_string()),
            },
        )?;

        SessionToken::try_from(token_data.claims)
    }
}
