//! The harvester: runs migrations, then keeps the snapshot scheduler
//! alive for the life of the process.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use graph_client::{GraphApi, GraphClient};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use limelight_common::Config;
use limelight_insights::{SnapshotEngine, SnapshotScheduler};
use limelight_store::{
    MappingStore, PgMappingStore, PgSnapshotStore, PgTokenStore, SnapshotStore, TokenChain,
    TokenStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Limelight harvester starting...");

    let config = Config::from_env();
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    limelight_store::migrate(&pool).await?;

    let graph: Arc<dyn GraphApi> = Arc::new(GraphClient::new(config.graph_settings()));
    let tokens: Arc<dyn TokenStore> = Arc::new(PgTokenStore::new(pool.clone()));
    let chain = Arc::new(TokenChain::standard(
        tokens.clone(),
        config.fallback_token.clone(),
    ));
    let mappings: Arc<dyn MappingStore> = Arc::new(PgMappingStore::new(pool.clone()));
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(pool));

    let engine = Arc::new(SnapshotEngine::new(graph, chain, mappings, snapshots));
    let every = Duration::from_secs(config.snapshot_interval_hours * 3600);
    let handle = SnapshotScheduler::start(engine, every);

    info!(
        interval_hours = config.snapshot_interval_hours,
        "Snapshot scheduler running; Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;
    handle.stop().await;

    info!("Harvester stopped");
    Ok(())
}
