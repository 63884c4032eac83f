#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use shared::{
    get_db_connection, Config, FetchError, FinalPriceRecord, PriceFilter, PriceSnapshot,
    PriceSource, PriceStore, SeaOrmPriceStore, StagedRow, StagingReading, StoreError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub async fn memory_store() -> Arc<SeaOrmPriceStore> {
    memory_store_with_db().await.1
}

/// Store plus a handle on its connection for raw SQL in tests.
pub async fn memory_store_with_db() -> (Arc<DatabaseConnection>, Arc<SeaOrmPriceStore>) {
    let db = Arc::new(get_db_connection("sqlite::memory:").await.unwrap());
    let store = SeaOrmPriceStore::new(db.clone(), Config::default().tables);
    store.ensure_schema().await.unwrap();
    (db, Arc::new(store))
}

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

pub fn reading(observed_at: DateTime<Utc>, asset: &str, currency: &str, price: i64) -> StagingReading {
    StagingReading {
        observed_at,
        asset_id: asset.to_string(),
        quote_currency: currency.to_string(),
        price: Decimal::from(price),
    }
}

pub fn snapshot(json: &str) -> PriceSnapshot {
    serde_json::from_str(json).unwrap()
}

pub fn assets() -> Vec<String> {
    vec!["bitcoin".to_string(), "ethereum".to_string()]
}

pub fn currencies() -> Vec<String> {
    vec!["usd".to_string(), "inr".to_string()]
}

/// Hands out queued responses, one per fetch.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<PriceSnapshot, FetchError>>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<PriceSnapshot, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<PriceSnapshot, FetchError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Malformed("no scripted response left".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Wraps a real store and fails selected operations while the switch is on.
pub struct FaultyStore {
    pub inner: Arc<SeaOrmPriceStore>,
    pub fail_append: AtomicBool,
    pub fail_upsert: AtomicBool,
    pub fail_truncate: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<SeaOrmPriceStore>) -> Self {
        Self {
            inner,
            fail_append: AtomicBool::new(false),
            fail_upsert: AtomicBool::new(false),
            fail_truncate: AtomicBool::new(false),
        }
    }

    fn injected(what: &str) -> StoreError {
        StoreError::Db(sea_orm::DbErr::Custom(format!("injected {} failure", what)))
    }
}

#[async_trait]
impl PriceStore for FaultyStore {
    async fn append_staging(&self, rows: &[StagingReading]) -> Result<u64, StoreError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(Self::injected("append"));
        }
        self.inner.append_staging(rows).await
    }

    async fn load_staging(&self) -> Result<Vec<StagedRow>, StoreError> {
        self.inner.load_staging().await
    }

    async fn upsert_final(&self, records: &[FinalPriceRecord]) -> Result<u64, StoreError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(Self::injected("upsert"));
        }
        self.inner.upsert_final(records).await
    }

    async fn truncate_staging(&self, up_to_seq: i32) -> Result<u64, StoreError> {
        if self.fail_truncate.load(Ordering::SeqCst) {
            return Err(Self::injected("truncate"));
        }
        self.inner.truncate_staging(up_to_seq).await
    }

    async fn final_records(&self, filter: &PriceFilter) -> Result<Vec<FinalPriceRecord>, StoreError> {
        self.inner.final_records(filter).await
    }

    async fn staging_count(&self) -> Result<u64, StoreError> {
        self.inner.staging_count().await
    }
}
