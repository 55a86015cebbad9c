use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use boxoffice_api::{app, AppState};
use boxoffice_catalog::InventoryManager;
use boxoffice_core::InventoryLedger;
use boxoffice_store::app_config::{Config, LedgerBackend};
use boxoffice_store::{DbClient, PostgresLedger, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice_api=debug,boxoffice_store=info,boxoffice_catalog=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Boxoffice API on port {} ({:?} ledger)", config.server.port, config.ledger.backend);

    let ledger: Arc<dyn InventoryLedger> = match config.ledger.backend {
        LedgerBackend::Memory => Arc::new(InventoryManager::with_lock_timeout(config.ledger.lock_timeout())),
        LedgerBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .context("ledger.backend = \"postgres\" requires a [database] section")?;
            let db = DbClient::new(&database.url, database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PostgresLedger::new(db.pool, config.ledger.lock_timeout()))
        }
    };

    let mut app_state = AppState::new(ledger);

    if let Some(redis) = &config.redis {
        let redis_client = RedisClient::new(&redis.url)
            .await
            .context("Failed to configure Redis")?;
        app_state = app_state.with_rate_limiter(Arc::new(redis_client), config.rate_limit.clone());
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    )
    .await
    .context("Server terminated unexpectedly")?;

    Ok(())
}
