pub mod coingecko;
pub mod compaction;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod shaper;
pub mod store;

pub use coingecko::{CoinGeckoClient, PriceSource};
pub use config::{Config, ConfigError, FetcherConfig, TableConfig};
pub use database::get_db_connection;
pub use error::{FetchError, PipelineError, StoreError};
pub use models::*;
pub use pipeline::{MergeOutcome, PricePipeline, RunReport, RunStage};
pub use store::{PriceStore, SeaOrmPriceStore};
