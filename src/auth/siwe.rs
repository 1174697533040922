//! SIWE (Sign-In with Ethereum, EIP-4361) parsing and structural validation.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::crypto::{parse_address, SignatureVerifier};
use crate::config::SiweExpectations;

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";

/// Errors during SIWE parsing or validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SiweError {
    #[error("SIWE message is empty")]
    EmptyMessage,
    #[error("invalid SIWE header format")]
    InvalidHeader,
    #[error("missing required SIWE field: {0}")]
    MissingField(&'static str),
    #[error("invalid SIWE field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("unsupported SIWE version: {0}")]
    UnsupportedVersion(String),
    #[error("SIWE address does not match the request")]
    AddressMismatch,
    #[error("SIWE nonce does not match the issued nonce")]
    NonceMismatch,
    #[error("SIWE domain mismatch: expected {expected}, got {actual}")]
    DomainMismatch { expected: String, actual: String },
    #[error("SIWE chain ID mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    #[error("SIWE message expired")]
    Expired,
    #[error("SIWE message is not yet valid")]
    NotYetValid,
}

/// Parsed SIWE message fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub scheme: Option<String>,
    pub domain: String,
    pub address: Address,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub request_id: Option<String>,
    pub resources: Vec<String>,
}

impl SiweMessage {
    /// Parse a SIWE message from its plain-text representation.
    pub fn parse(raw: &str) -> Result<Self, SiweError> {
        let lines: Vec<&str> = raw.lines().collect();
        if lines.is_empty() || raw.trim().is_empty() {
            return Err(SiweError::EmptyMessage);
        }

        let authority = lines[0]
            .trim_end()
            .strip_suffix(HEADER_SUFFIX)
            .filter(|value| !value.is_empty())
            .ok_or(SiweError::InvalidHeader)?;
        let (scheme, domain) = match authority.split_once("://") {
            Some((scheme, domain)) => (Some(scheme.to_string()), domain.to_string()),
            None => (None, authority.to_string()),
        };
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            return Err(SiweError::InvalidHeader);
        }

        let address_line = lines.get(1).ok_or(SiweError::MissingField("address"))?;
        let address = parse_address(address_line.trim()).map_err(|e| SiweError::InvalidField {
            field: "address",
            reason: e.to_string(),
        })?;

        let mut statement = None;
        let mut uri = None;
        let mut version = None;
        let mut chain_id = None;
        let mut nonce = None;
        let mut issued_at = None;
        let mut expiration_time = None;
        let mut not_before = None;
        let mut request_id = None;
        let mut resources = Vec::new();
        let mut in_resources = false;

        for raw_line in lines.iter().skip(2) {
            let line = raw_line.trim_end();
            if line.is_empty() {
                continue;
            }

            if in_resources {
                if let Some(resource) = line.strip_prefix("- ") {
                    resources.push(resource.trim().to_string());
                    continue;
                }
                return Err(SiweError::InvalidField {
                    field: "Resources",
                    reason: "expected '- ' prefixed entries".to_string(),
                });
            }

            if let Some(value) = line.strip_prefix("URI: ") {
                uri = Some(parse_uri(value)?);
            } else if let Some(value) = line.strip_prefix("Version: ") {
                version = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("Chain ID: ") {
                chain_id = Some(value.parse::<u64>().map_err(|_| SiweError::InvalidField {
                    field: "Chain ID",
                    reason: "not a valid u64".to_string(),
                })?);
            } else if let Some(value) = line.strip_prefix("Nonce: ") {
                nonce = Some(parse_nonce(value)?);
            } else if let Some(value) = line.strip_prefix("Issued At: ") {
                issued_at = Some(parse_datetime("Issued At", value)?);
            } else if let Some(value) = line.strip_prefix("Expiration Time: ") {
                expiration_time = Some(parse_datetime("Expiration Time", value)?);
            } else if let Some(value) = line.strip_prefix("Not Before: ") {
                not_before = Some(parse_datetime("Not Before", value)?);
            } else if let Some(value) = line.strip_prefix("Request ID: ") {
                request_id = Some(value.to_string());
            } else if line == "Resources:" {
                in_resources = true;
            } else if statement.is_none() && uri.is_none() {
                statement = Some(line.to_string());
            } else {
                return Err(SiweError::InvalidField {
                    field: "line",
                    reason: format!("unexpected content: {line}"),
                });
            }
        }

        Ok(Self {
            scheme,
            domain,
            address,
            statement,
            uri: uri.ok_or(SiweError::MissingField("URI"))?,
            version: version.ok_or(SiweError::MissingField("Version"))?,
            chain_id: chain_id.ok_or(SiweError::MissingField("Chain ID"))?,
            nonce: nonce.ok_or(SiweError::MissingField("Nonce"))?,
            issued_at: issued_at.ok_or(SiweError::MissingField("Issued At"))?,
            expiration_time,
            not_before,
            request_id,
            resources,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time.is_some_and(|exp| exp <= now)
    }

    pub fn is_not_yet_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_some_and(|nbf| nbf > now)
    }
}

fn parse_uri(raw: &str) -> Result<String, SiweError> {
    let valid = raw
        .split_once(':')
        .is_some_and(|(scheme, rest)| {
            !rest.is_empty()
                && scheme
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        })
        && !raw.contains(char::is_whitespace);

    if valid {
        Ok(raw.to_string())
    } else {
        Err(SiweError::InvalidField {
            field: "URI",
            reason: "not an RFC 3986 URI".to_string(),
        })
    }
}

fn parse_nonce(raw: &str) -> Result<String, SiweError> {
    if raw.len() >= 8 && raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(raw.to_string())
    } else {
        Err(SiweError::InvalidField {
            field: "Nonce",
            reason: "expected at least 8 alphanumeric characters".to_string(),
        })
    }
}

fn parse_datetime(field: &'static str, raw: &str) -> Result<DateTime<Utc>, SiweError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SiweError::InvalidField {
            field,
            reason: e.to_string(),
        })
}

/// Validates SIWE messages against server expectations and delegates
/// cryptographic checks to a [`SignatureVerifier`].
pub struct SiweVerifier {
    expectations: SiweExpectations,
    signatures: std::sync::Arc<dyn SignatureVerifier>,
}

impl SiweVerifier {
    pub fn new(
        expectations: SiweExpectations,
        signatures: std::sync::Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            expectations,
            signatures,
        }
    }

    /// Parse `message` and check it against the request address and the issued nonce.
    pub fn check_structure(
        &self,
        message: &str,
        address: Address,
        expected_nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<SiweMessage, SiweError> {
        let siwe = SiweMessage::parse(message)?;

        if siwe.version != "1" {
            return Err(SiweError::UnsupportedVersion(siwe.version));
        }
        if siwe.address != address {
            return Err(SiweError::AddressMismatch);
        }
        if siwe.nonce != expected_nonce {
            return Err(SiweError::NonceMismatch);
        }
        if let Some(expected) = &self.expectations.domain {
            if &siwe.domain != expected {
                return Err(SiweError::DomainMismatch {
                    expected: expected.clone(),
                    actual: siwe.domain,
                });
            }
        }
        if let Some(expected) = self.expectations.chain_id {
            if siwe.chain_id != expected {
                return Err(SiweError::ChainIdMismatch {
                    expected,
                    actual: siwe.chain_id,
                });
            }
        }
        if siwe.is_expired_at(now) {
            return Err(SiweError::Expired);
        }
        if siwe.is_not_yet_valid_at(now) {
            return Err(SiweError::NotYetValid);
        }

        Ok(siwe)
    }

    /// Fail-closed boolean form of [`Self::check_structure`] evaluated at the current time.
    pub fn validate_structure(&self, message: &str, address: Address, expected_nonce: &str) -> bool {
        match self.check_structure(message, address, expected_nonce, Utc::now()) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(%address, error = %e, "SIWE message rejected");
                false
            }
        }
    }

    pub async fn verify_signature(&self, message: &str, signature: &str, address: Address) -> bool {
        self.signatures.verify(message, signature, address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::crypto::EoaSignatureVerifier;
    use chrono::Duration;
    use std::sync::Arc;

    const ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    fn build_message(nonce: &str, expiration: Option<DateTime<Utc>>) -> String {
        let mut message = format!(
            "example.com wants you to sign in with your Ethereum account:\n\
{ADDRESS}\n\n\
Sign in to the dashboard\n\n\
URI: https://example.com/login\n\
Version: 1\n\
Chain ID: 1\n\
Nonce: {nonce}\n\
Issued At: {}",
            Utc::now().to_rfc3339()
        );
        if let Some(exp) = expiration {
            message.push_str(&format!("\nExpiration Time: {}", exp.to_rfc3339()));
        }
        message
    }

    fn verifier(expectations: SiweExpectations) -> SiweVerifier {
        SiweVerifier::new(expectations, Arc::new(EoaSignatureVerifier))
    }

    fn address() -> Address {
        parse_address(ADDRESS).unwrap()
    }

    #[test]
    fn test_parse_full_message() {
        let raw = format!(
            "https://example.com wants you to sign in with your Ethereum account:\n\
{ADDRESS}\n\n\
URI: https://example.com\n\
Version: 1\n\
Chain ID: 10\n\
Nonce: abcdef1234\n\
Issued At: 2026-01-01T00:00:00Z\n\
Not Before: 2026-01-01T00:00:00Z\n\
Request ID: req-1\n\
Resources:\n\
- ipfs://bafy\n\
- https://example.com/terms"
        );
        let siwe = SiweMessage::parse(&raw).unwrap();
        assert_eq!(siwe.scheme.as_deref(), Some("https"));
        assert_eq!(siwe.domain, "example.com");
        assert_eq!(siwe.statement, None);
        assert_eq!(siwe.chain_id, 10);
        assert_eq!(siwe.request_id.as_deref(), Some("req-1"));
        assert_eq!(siwe.resources.len(), 2);
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        let raw = build_message("abcdef1234", None).replacen("wants you", "would like you", 1);
        assert_eq!(SiweMessage::parse(&raw), Err(SiweError::InvalidHeader));
    }

    #[test]
    fn test_parse_rejects_missing_nonce() {
        let raw = build_message("abcdef1234", None).replace("Nonce: abcdef1234\n", "");
        assert_eq!(
            SiweMessage::parse(&raw),
            Err(SiweError::MissingField("Nonce"))
        );
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let raw = format!(
            "example.com wants you to sign in with your Ethereum account:\n\
{ADDRESS}\n\n\
URI: https://example.com\n\
Version: 1\n\
Chain ID: 1\n\
Nonce: abcdef1234\n\
Issued At: yesterday"
        );
        assert!(matches!(
            SiweMessage::parse(&raw),
            Err(SiweError::InvalidField { field: "Issued At", .. })
        ));
    }

    #[test]
    fn test_structure_matches_nonce_and_address() {
        let v = verifier(SiweExpectations::default());
        let message = build_message("abcdef1234", None);
        assert!(v.validate_structure(&message, address(), "abcdef1234"));
        assert!(!v.validate_structure(&message, address(), "zzzzzzzz99"));

        let other = parse_address("0x0000000000000000000000000000000000000001").unwrap();
        assert!(!v.validate_structure(&message, other, "abcdef1234"));
    }

    #[test]
    fn test_structure_rejects_expired_message() {
        let v = verifier(SiweExpectations::default());
        let message = build_message("abcdef1234", Some(Utc::now() - Duration::minutes(1)));
        assert_eq!(
            v.check_structure(&message, address(), "abcdef1234", Utc::now()),
            Err(SiweError::Expired)
        );
    }

    #[test]
    fn test_structure_enforces_domain_and_chain() {
        let message = build_message("abcdef1234", None);

        let v = verifier(SiweExpectations {
            domain: Some("evil.example".to_string()),
            chain_id: None,
        });
        assert!(matches!(
            v.check_structure(&message, address(), "abcdef1234", Utc::now()),
            Err(SiweError::DomainMismatch { .. })
        ));

        let v = verifier(SiweExpectations {
            domain: Some("example.com".to_string()),
            chain_id: Some(8453),
        });
        assert!(matches!(
            v.check_structure(&message, address(), "abcdef1234", Utc::now()),
            Err(SiweError::ChainIdMismatch { expected: 8453, actual: 1 })
        ));
    }

    #[test]
    fn test_structure_fails_closed_on_garbage() {
        let v = verifier(SiweExpectations::default());
        assert!(!v.validate_structure("", address(), "abcdef1234"));
        assert!(!v.validate_structure("hello world", address(), "abcdef1234"));
    }
}
