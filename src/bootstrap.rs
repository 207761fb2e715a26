use std::{sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::{
    api::handler::AppState,
    config::Config,
    error::AppResult,
    ledger::{PgTipRepository, TipRepository},
    node::{LedgerClient, NodeRpcClient},
    settlement::TipSettlement,
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let pool = initialize_database(config).await?;
    let repository: Arc<dyn TipRepository> = Arc::new(PgTipRepository::new(pool));

    let ledger: Arc<dyn LedgerClient> =
        Arc::new(NodeRpcClient::new(config.node_url.clone(), config.rpc_timeout())?);
    info!("✅ Ledger node client configured for {}", config.node_url);

    let policy = config.work_retry_policy();
    info!(
        "Work generation: {} attempts, {:?} timeout",
        policy.max_attempts, policy.timeout
    );

    let settlement = Arc::new(TipSettlement::new(
        ledger,
        repository,
        config.wallet.clone(),
        policy,
        config.denomination(),
    ));

    info!("✓ Tip settlement ready ({})", config.currency_symbol);
    Ok(AppState { settlement })
}

async fn initialize_database(config: &Config) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    info!(
        "✓ Database pool configured: {} max connections",
        config.database_max_connections
    );

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
