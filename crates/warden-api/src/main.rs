//! Warden API Server
//!
//! Credential and session lifecycle service over PostgreSQL and Redis.

use std::sync::Arc;
use warden_api::{create_router, serve, state::AppState, SHUTDOWN_GRACE_PERIOD};
use warden_core::{
    AppConfig, CredentialStore, InMemorySessionStore, LoggingConfig, PgCredentialStore,
    SessionStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    config.validate()?;

    // Credential store
    let credentials = PgCredentialStore::new(
        &config.database.postgres_url,
        config.database.postgres_pool_size,
    )
    .await?;
    credentials.ensure_schema().await?;
    tracing::info!("Connected to PostgreSQL");
    let credentials: Arc<dyn CredentialStore> = Arc::new(credentials);

    // Session store
    let sessions = session_store(&config).await?;

    // Create application state
    let state = Arc::new(AppState::new(config.clone(), credentials, sessions)?);

    // Create router
    let app = create_router(state.clone());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Warden API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    serve(
        listener,
        app,
        async move {
            shutdown_signal().await;
            state.set_ready(false);
        },
        SHUTDOWN_GRACE_PERIOD,
    )
    .await?;

    tracing::info!("Warden API Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=info", logging.level).into());

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(feature = "session-redis")]
async fn session_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.database.redis_url.as_deref() {
        Some(url) => {
            let store = warden_core::RedisSessionStore::new(url)?;
            store.ping().await?;
            tracing::info!("Connected to Redis");
            Ok(Arc::new(store))
        }
        None => Ok(in_memory_sessions()),
    }
}

#[cfg(not(feature = "session-redis"))]
async fn session_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    if config.database.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but Redis support is not compiled in");
    }
    Ok(in_memory_sessions())
}

fn in_memory_sessions() -> Arc<dyn SessionStore> {
    tracing::warn!("Using in-memory session store; sessions will not survive a restart");
    Arc::new(InMemorySessionStore::new())
}
