//! Wallet session server
//!
//! Serves the single-page app and its API, authenticating wallets with
//! Sign-In-With-Ethereum and keeping them signed in with JWT cookies.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use wallet_session_server::auth::{
    cookie_key, AuthService, CookiePolicy, EoaSignatureVerifier, MemoryNonceStore, NonceStore,
    RedisNonceStore, RpcSignatureVerifier, SignatureVerifier, SiweVerifier, TokenIssuer,
};
use wallet_session_server::config::Config;
use wallet_session_server::db::{self, Database, PgUserStore};
use wallet_session_server::routes::{create_router, RouterOptions};
use wallet_session_server::state::AppState;

const NONCE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing before config so secret fallbacks are logged
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        environment = config.environment.as_str(),
        log_level = %config.log_level,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;
    let database = Database::new(pool);

    let nonces: Arc<dyn NonceStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Using Redis nonce store");
            Arc::new(RedisNonceStore::new(url, config.auth_nonce_ttl_seconds as u64)?)
        }
        None => {
            tracing::info!("Using in-memory nonce store");
            let store = MemoryNonceStore::new(config.auth_nonce_ttl_seconds);
            spawn_nonce_purge(store.clone());
            Arc::new(store)
        }
    };

    let signatures: Arc<dyn SignatureVerifier> = match &config.eth_rpc_url {
        Some(url) => {
            tracing::info!("ERC-1271 contract wallet verification enabled");
            Arc::new(RpcSignatureVerifier::new(url.clone())?)
        }
        None => Arc::new(EoaSignatureVerifier),
    };

    let auth_service = Arc::new(AuthService::new(
        nonces,
        SiweVerifier::new(config.siwe.clone(), signatures),
        TokenIssuer::new(&config.jwt_secret, config.session),
        Arc::new(PgUserStore::new(database.clone())),
    ));

    let is_production = config.environment.is_production();
    let app_state = AppState::new(
        auth_service,
        CookiePolicy::new(is_production, &config.session),
        cookie_key(&config.cookie_secret),
        database,
    );

    let app = create_router(
        app_state,
        RouterOptions {
            cors_allowed_origins: config.cors_allowed_origins.as_deref(),
            static_dir: config.static_dir.as_deref(),
            hsts: is_production,
        },
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn spawn_nonce_purge(store: MemoryNonceStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(NONCE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "Purged expired login nonces");
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
