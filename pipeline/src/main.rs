//! Runs a single fetch -> stage -> merge -> compact cycle and exits.
//!
//! Scheduling lives outside this binary (cron, an orchestrator, ...); it must not
//! start overlapping runs against the same staging table.

use anyhow::{Context, Result};
use shared::{get_db_connection, CoinGeckoClient, Config, PricePipeline, PriceSource, PriceStore, SeaOrmPriceStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(
        "Starting price pipeline {} (git {} on {}, built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        option_env!("GIT_BRANCH").unwrap_or("unknown"),
        option_env!("BUILD_TIME").unwrap_or("unknown"),
    );

    let config = Config::from_env().context("invalid configuration")?;
    let db = get_db_connection(&config.database_url).await?;

    let store = SeaOrmPriceStore::new(Arc::new(db), config.tables.clone());
    store.ensure_schema().await.context("could not prepare price tables")?;

    let source: Arc<dyn PriceSource> = Arc::new(CoinGeckoClient::new(&config.fetcher)?);
    let store: Arc<dyn PriceStore> = Arc::new(store);
    let pipeline = PricePipeline::new(
        source,
        store,
        config.fetcher.assets.clone(),
        config.fetcher.currencies.clone(),
    );

    match pipeline.run_cycle().await {
        Ok(report) => {
            tracing::info!(
                "Run {} finished at {:?}: {} readings staged, {} partitions merged",
                report.run_id,
                report.stage,
                report.rows_staged,
                report.partitions_merged
            );
            Ok(())
        }
        Err(e) => {
            let kind = e.kind();
            Err(anyhow::Error::new(e).context(format!("price pipeline run failed ({})", kind)))
        }
    }
}
