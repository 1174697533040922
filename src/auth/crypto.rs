//! Ethereum address parsing and signature verification
//!
//! Recovers EIP-191 `personal_sign` signers over secp256k1 and, when an RPC
//! endpoint is configured, asks contract wallets via ERC-1271.

use alloy_primitives::{eip191_hash_message, Address, Bytes, Signature, B256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const ERC1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

/// Upper bound on one `eth_call`; the login request waits on it.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

sol! {
    function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4);
}

/// Errors that can occur during address parsing or signature verification
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid address checksum")]
    InvalidChecksum,

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Signature recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("RPC call failed: {0}")]
    Rpc(String),
}

/// Parse a `0x`-prefixed, 20-byte hex account address.
///
/// All-lowercase and all-uppercase forms are accepted as-is; mixed case must
/// carry a valid EIP-55 checksum.
pub fn parse_address(raw: &str) -> Result<Address, CryptoError> {
    let hex_part = raw
        .strip_prefix("0x")
        .ok_or_else(|| CryptoError::InvalidAddressFormat("missing 0x prefix".to_string()))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CryptoError::InvalidAddressFormat(
            "expected 40 hex characters".to_string(),
        ));
    }

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Address::parse_checksummed(raw, None).map_err(|_| CryptoError::InvalidChecksum);
    }

    Address::from_str(raw).map_err(|e| CryptoError::InvalidAddressFormat(e.to_string()))
}

/// Decode a hex signature, with or without `0x`.
pub fn decode_signature(signature: &str) -> Result<Vec<u8>, CryptoError> {
    let hex_sig = signature.strip_prefix("0x").unwrap_or(signature);
    hex::decode(hex_sig).map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))
}

/// Recover the signer of an EIP-191 personal message.
///
/// The signature must be the 65-byte `r || s || v` form.
pub fn recover_personal_sign(message: &[u8], signature: &[u8]) -> Result<Address, CryptoError> {
    if signature.len() != 65 {
        return Err(CryptoError::InvalidSignatureFormat(format!(
            "Signature must be 65 bytes, got {}",
            signature.len()
        )));
    }

    let sig = Signature::try_from(signature)
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    sig.recover_address_from_prehash(&eip191_hash_message(message))
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Checks that `signature` over `message` was produced by `address`.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, message: &str, signature: &str, address: Address) -> bool;
}

/// Verifies signatures of externally owned accounts by key recovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct EoaSignatureVerifier;

impl EoaSignatureVerifier {
    fn verify_sync(message: &str, signature: &str, address: Address) -> bool {
        let recovered = decode_signature(signature)
            .and_then(|bytes| recover_personal_sign(message.as_bytes(), &bytes));

        match recovered {
            Ok(recovered) => recovered == address,
            Err(e) => {
                tracing::debug!(error = %e, "EOA signature recovery failed");
                false
            }
        }
    }
}

#[async_trait]
impl SignatureVerifier for EoaSignatureVerifier {
    async fn verify(&self, message: &str, signature: &str, address: Address) -> bool {
        Self::verify_sync(message, signature, address)
    }
}

/// EOA recovery first, then an ERC-1271 `isValidSignature` call for contract wallets.
#[derive(Debug, Clone)]
pub struct RpcSignatureVerifier {
    client: reqwest::Client,
    rpc_url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

impl RpcSignatureVerifier {
    pub fn new(rpc_url: impl Into<String>) -> Result<Self, CryptoError> {
        Self::with_timeout(rpc_url, DEFAULT_RPC_TIMEOUT)
    }

    pub fn with_timeout(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, CryptoError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CryptoError::Rpc(e.to_string()))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
        })
    }

    async fn is_valid_contract_signature(
        &self,
        address: Address,
        message: &str,
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let hash: B256 = eip191_hash_message(message.as_bytes());
        let call = isValidSignatureCall {
            hash,
            signature: Bytes::copy_from_slice(signature),
        };
        let data = format!("0x{}", hex::encode(call.abi_encode()));

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": address.to_string(), "data": data }, "latest"],
        });

        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CryptoError::Rpc(e.to_string()))?
            .json()
            .await
            .map_err(|e| CryptoError::Rpc(e.to_string()))?;

        if let Some(error) = response.error {
            // Reverts are the normal answer from non-1271 accounts.
            tracing::debug!(%address, ?error, "ERC-1271 call returned an error");
            return Ok(false);
        }

        let result = response.result.unwrap_or_default();
        let bytes = decode_signature(&result).map_err(|e| CryptoError::Rpc(e.to_string()))?;

        Ok(bytes.len() >= 4 && bytes[..4] == ERC1271_MAGIC_VALUE)
    }
}

#[async_trait]
impl SignatureVerifier for RpcSignatureVerifier {
    async fn verify(&self, message: &str, signature: &str, address: Address) -> bool {
        if EoaSignatureVerifier::verify_sync(message, signature, address) {
            return true;
        }

        let Ok(bytes) = decode_signature(signature) else {
            return false;
        };

        match self.is_valid_contract_signature(address, message, &bytes).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(%address, error = %e, "ERC-1271 verification unavailable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOWER: &str = "0x52908400098527886e0f7030069857d2e4169ee7";
    const CHECKSUMMED: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn test_parse_address_accepts_canonical_forms() {
        assert!(parse_address(LOWER).is_ok());
        assert!(parse_address(CHECKSUMMED).is_ok());
        assert_eq!(
            parse_address(LOWER).unwrap(),
            parse_address(CHECKSUMMED).unwrap()
        );
    }

    #[test]
    fn test_parse_address_rejects_bad_checksum() {
        // Same digits, one letter flipped to lowercase
        let broken = "0x52908400098527886E0F7030069857D2E4169Ee7";
        assert!(matches!(
            parse_address(broken),
            Err(CryptoError::InvalidChecksum)
        ));
    }

    #[test]
    fn test_parse_address_rejects_malformed() {
        assert!(parse_address("52908400098527886e0f7030069857d2e4169ee7").is_err());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xZZ908400098527886e0f7030069857d2e4169ee7").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_recover_rejects_short_signature() {
        let result = recover_personal_sign(b"hello", &[0u8; 64]);
        assert!(matches!(result, Err(CryptoError::InvalidSignatureFormat(_))));
    }

    #[tokio::test]
    async fn test_eoa_verifier_rejects_garbage() {
        let address = parse_address(LOWER).unwrap();
        assert!(!EoaSignatureVerifier.verify("hello", "0xnothex", address).await);
        assert!(!EoaSignatureVerifier.verify("hello", "0x00", address).await);
    }

    /// A 65-byte signature no EOA produced, forcing the ERC-1271 path.
    fn contract_signature() -> String {
        format!("0x{}", "11".repeat(65))
    }

    /// Serve `reply` to every `eth_call`; anything else gets a JSON-RPC error.
    async fn json_rpc_server(reply: serde_json::Value) -> String {
        use axum::{routing::post, Json, Router};

        let app = Router::new().route(
            "/",
            post(move |Json(request): Json<serde_json::Value>| {
                let reply = reply.clone();
                async move {
                    if request["method"] == "eth_call" {
                        Json(reply)
                    } else {
                        Json(json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32601 } }))
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn verify_against(reply: serde_json::Value) -> bool {
        let url = json_rpc_server(reply).await;
        let verifier = RpcSignatureVerifier::new(url).unwrap();
        verifier
            .verify("hello", &contract_signature(), parse_address(LOWER).unwrap())
            .await
    }

    #[tokio::test]
    async fn test_contract_wallet_magic_value_is_accepted() {
        let result = format!("0x1626ba7e{}", "0".repeat(56));
        assert!(verify_against(json!({ "jsonrpc": "2.0", "id": 1, "result": result })).await);
    }

    #[tokio::test]
    async fn test_contract_wallet_other_value_is_rejected() {
        let result = format!("0xffffffff{}", "0".repeat(56));
        assert!(!verify_against(json!({ "jsonrpc": "2.0", "id": 1, "result": result })).await);
    }

    #[tokio::test]
    async fn test_contract_wallet_rpc_error_is_rejected() {
        let reply = json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": 3, "message": "execution reverted" } });
        assert!(!verify_against(reply).await);
    }

    #[tokio::test]
    async fn test_contract_wallet_short_or_missing_result_is_rejected() {
        assert!(!verify_against(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x1626" })).await);
        assert!(!verify_against(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x" })).await);
        assert!(!verify_against(json!({ "jsonrpc": "2.0", "id": 1 })).await);
    }

    #[tokio::test]
    async fn test_stalled_rpc_times_out_as_invalid() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let verifier =
            RpcSignatureVerifier::with_timeout(format!("http://{addr}"), Duration::from_millis(200))
                .unwrap();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            verifier.verify("hello", &contract_signature(), parse_address(LOWER).unwrap()),
        )
        .await;

        assert_eq!(outcome, Ok(false));
    }
}
