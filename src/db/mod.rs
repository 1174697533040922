//! Database connection, migrations and the wallet user store
//!
//! This module handles PostgreSQL connection pooling and migrations.

use alloy_primitives::Address;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Database connection error
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),

    #[error("Query failed: {0}")]
    QueryError(#[from] sqlx::Error),
}

/// Create a database connection pool
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!("Connecting to database at {}", config.database_url_masked());

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!("Database connection pool created successfully");

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

/// Check database connectivity (for health checks)
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    Ok(())
}

/// Database pool wrapper for use in application state
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn is_healthy(&self) -> bool {
        check_health(&self.pool).await.is_ok()
    }
}

/// Persistence of wallet users.
///
/// Both writes are bookkeeping; callers run them detached and only log failures.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Bump `last_active_at` for an existing user.
    async fn touch_last_active(&self, address: Address) -> Result<(), DbError>;

    /// Create the user on first login, otherwise bump `last_active_at`.
    async fn record_login(&self, address: Address) -> Result<(), DbError>;
}

/// Postgres-backed [`UserStore`] keyed by checksummed wallet address.
#[derive(Clone)]
pub struct PgUserStore {
    db: Database,
}

impl PgUserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn touch_last_active(&self, address: Address) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_active_at = NOW(), updated_at = NOW()
            WHERE wallet_address = $1
            "#,
        )
        .bind(address.to_checksum(None))
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn record_login(&self, address: Address) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (wallet_address, last_active_at)
            VALUES ($1, NOW())
            ON CONFLICT (wallet_address)
            DO UPDATE SET last_active_at = NOW(), updated_at = NOW()
            "#,
        )
        .bind(address.to_checksum(None))
        .execute(self.db.pool())
        .await?;

        Ok(())
    }
}
