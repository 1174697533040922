//! Nonce management for wallet login.
//!
//! A nonce is issued per address and consumed by the next login attempt for
//! that address, successful or not. Issuing again overwrites the previous
//! nonce. Entries older than the configured TTL are treated as absent.

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

/// Length of generated nonces (EIP-4361 requires at least 8 alphanumerics).
pub const NONCE_LENGTH: usize = 32;

/// Errors that can occur during nonce operations.
#[derive(Error, Debug)]
pub enum NonceError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Issues and single-use-consumes per-address login nonces.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Generate a fresh nonce for `address`, replacing any outstanding one.
    async fn issue(&self, address: Address) -> Result<String, NonceError>;

    /// Remove and return the outstanding nonce for `address`.
    async fn consume(&self, address: Address) -> Result<Option<String>, NonceError>;
}

pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone)]
struct NonceEntry {
    nonce: String,
    expires_at: DateTime<Utc>,
}

/// Process-local nonce store for single-instance deployments.
#[derive(Clone)]
pub struct MemoryNonceStore {
    entries: Arc<RwLock<HashMap<Address, NonceEntry>>>,
    ttl: Duration,
}

impl MemoryNonceStore {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Drop expired entries (call periodically)
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Utc::now();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn issue(&self, address: Address) -> Result<String, NonceError> {
        let nonce = generate_nonce();
        let entry = NonceEntry {
            nonce: nonce.clone(),
            expires_at: Utc::now() + self.ttl,
        };

        self.entries.write().await.insert(address, entry);
        debug!(%address, "Issued login nonce");

        Ok(nonce)
    }

    async fn consume(&self, address: Address) -> Result<Option<String>, NonceError> {
        let entry = self.entries.write().await.remove(&address);

        Ok(entry
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.nonce))
    }
}

/// Redis-backed nonce store shared by every instance behind a load balancer.
///
/// Keys expire through Redis TTLs; consumption uses `GETDEL`, so exactly one
/// concurrent login attempt observes the nonce.
pub struct RedisNonceStore {
    /// Redis connection manager (lazily initialized)
    connection: OnceCell<ConnectionManager>,
    redis_url: String,
    key_prefix: String,
    ttl_seconds: u64,
}

impl RedisNonceStore {
    pub fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self, NonceError> {
        if redis_url.is_empty() {
            return Err(NonceError::Configuration(
                "Redis URL cannot be empty".to_string(),
            ));
        }
        if ttl_seconds == 0 {
            return Err(NonceError::Configuration(
                "Nonce TTL must be positive".to_string(),
            ));
        }

        Ok(Self {
            connection: OnceCell::new(),
            redis_url: redis_url.to_string(),
            key_prefix: "wallet-session".to_string(),
            ttl_seconds,
        })
    }

    /// Use a custom key prefix.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    async fn get_connection(&self) -> Result<ConnectionManager, NonceError> {
        self.connection
            .get_or_try_init(|| async {
                let client = redis::Client::open(self.redis_url.as_str())?;
                let manager = ConnectionManager::new(client).await?;
                debug!("Nonce store Redis connection established");
                Ok::<_, NonceError>(manager)
            })
            .await
            .cloned()
    }

    fn nonce_key(&self, address: &Address) -> String {
        format!("{}:siwe:nonce:0x{}", self.key_prefix, hex::encode(address))
    }
}

#[async_trait]
impl NonceStore for RedisNonceStore {
    async fn issue(&self, address: Address) -> Result<String, NonceError> {
        let nonce = generate_nonce();
        let mut conn = self.get_connection().await?;

        let _: () = redis::cmd("SET")
            .arg(self.nonce_key(&address))
            .arg(&nonce)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await?;

        debug!(%address, ttl = self.ttl_seconds, "Issued login nonce");
        Ok(nonce)
    }

    async fn consume(&self, address: Address) -> Result<Option<String>, NonceError> {
        let mut conn = self.get_connection().await?;

        let nonce: Option<String> = redis::cmd("GETDEL")
            .arg(self.nonce_key(&address))
            .query_async(&mut conn)
            .await?;

        Ok(nonce)
    }
}

impl std::fmt::Debug for RedisNonceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisNonceStore")
            .field("key_prefix", &self.key_prefix)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}
