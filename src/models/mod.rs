//! Data models for the wallet session server

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::auth::parse_address;

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Query for `GET /auth/nonce`
#[derive(Debug, Deserialize, Validate)]
pub struct NonceQuery {
    #[validate(required, custom = "validate_address")]
    pub address: Option<String>,
}

/// Response containing a freshly issued nonce
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// Body of `POST /auth/login`
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Missing SIWE message"))]
    pub message: String,
    #[validate(length(min = 1, message = "Missing signature"))]
    pub signature: String,
    #[validate(custom = "validate_address")]
    pub address: String,
}

/// The authenticated wallet, returned by login and `/auth/me`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub address: String,
}

fn validate_address(value: &str) -> Result<(), ValidationError> {
    parse_address(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("address");
        err.message = Some("Missing or invalid address".into());
        err
    })
}
