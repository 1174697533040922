//! Wallet authentication
//!
//! Sign-In-With-Ethereum login over per-address nonces, HS256 session tokens
//! and the cookies that carry them.

pub mod cookies;
mod crypto;
mod jwt;
mod nonce;
mod service;
mod siwe;

pub use cookies::{cookie_key, CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE};
pub use crypto::{
    parse_address, CryptoError, EoaSignatureVerifier, RpcSignatureVerifier, SignatureVerifier,
};
pub use jwt::{Claims, SessionToken, TokenError, TokenIssuer, TokenKind, REFRESH_TOKEN_TYPE};
pub use nonce::{generate_nonce, MemoryNonceStore, NonceError, NonceStore, RedisNonceStore};
pub use service::{AuthError, AuthService, SessionTokens};
pub use siwe::{SiweError, SiweMessage, SiweVerifier};
