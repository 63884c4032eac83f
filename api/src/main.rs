use anyhow::{Context, Result};
use shared::{get_db_connection, CoinGeckoClient, Config, PricePipeline, PriceSource, PriceStore, SeaOrmPriceStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;

use routes::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting price pipeline API server...");

    let config = Config::from_env().context("invalid configuration")?;
    let db = get_db_connection(&config.database_url).await?;
    info!("Connected to database");

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

    let app = router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    info!("API server listening on http://{}", config.api_bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
