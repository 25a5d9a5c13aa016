use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clipsync_api::{
    config::LogFormat,
    presence::{ConnectionRegistry, MemoryRegistry, RedisRegistry},
    routes::create_router,
    store::{MemoryStore, PostgresStore, Store},
    websocket::WebSocketState,
    AppState, Config,
};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONNECT_ATTEMPTS: usize = 5;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("loading configuration")?;
    init_tracing(config.log_format);

    let store = connect_store(&config).await?;
    let registry = connect_registry(&config).await?;

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, store, registry);
    let ws_state = state.ws_state.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {bind_address}"))?;
    tracing::info!(address = %bind_address, "clipsync API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(ws_state.clone()))
        .await
        .context("serving HTTP")?;

    drain_connections(&ws_state).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,clipsync_api=debug,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(100)
        .max_delay(Duration::from_secs(5))
        .take(CONNECT_ATTEMPTS)
        .map(jitter)
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory store (not durable)");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let max_connections = config.database_max_connections;
    let pool = Retry::spawn(retry_strategy(), || async move {
        clipsync_shared::create_pool(url, max_connections)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Postgres connection failed, retrying"))
    })
    .await
    .context("connecting to Postgres")?;

    clipsync_shared::run_migrations(&pool)
        .await
        .context("running migrations")?;
    tracing::info!("Connected to Postgres, migrations applied");

    Ok(Arc::new(PostgresStore::new(pool)))
}

async fn connect_registry(config: &Config) -> anyhow::Result<Arc<dyn ConnectionRegistry>> {
    let Some(url) = config.redis_url.as_deref() else {
        tracing::warn!("REDIS_URL not set, using in-process presence registry (single node only)");
        return Ok(Arc::new(MemoryRegistry::new()));
    };

    let timeout = config.registry_timeout();
    let registry = Retry::spawn(retry_strategy(), || async move {
        RedisRegistry::connect(url, timeout)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Redis connection failed, retrying"))
    })
    .await
    .context("connecting to Redis")?;
    tracing::info!("Connected to Redis presence registry");

    Ok(Arc::new(registry))
}

/// Resolves on Ctrl-C or SIGTERM and tells every connection task to close
async fn shutdown_signal(ws_state: WebSocketState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, closing WebSocket connections");
    ws_state.close_all();
}

/// Wait for connection tasks to deregister, up to [`DRAIN_TIMEOUT`]
async fn drain_connections(ws_state: &WebSocketState) {
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while ws_state.connection_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            remaining = ws_state.connection_count().await,
            "Timed out waiting for WebSocket connections to close"
        );
    }
}
