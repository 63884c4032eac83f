use crate::config::TableConfig;
use crate::error::StoreError;
use crate::models::{FinalPriceRecord, PriceFilter, StagedRow, StagingReading};
use crate::schema::{Prices, Staging, PRICE_SCALE};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Alias, Expr, Func, InsertStatement, OnConflict, Order, Query, SimpleExpr};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, FromQueryResult, QueryResult,
    TransactionTrait,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Rows per INSERT statement when upserting the final table.
const UPSERT_CHUNK: usize = 500;

/// Persistence seam of the pipeline: the staging and final price tables.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Appends all rows in one statement; either every row lands or none does.
    async fn append_staging(&self, rows: &[StagingReading]) -> Result<u64, StoreError>;

    /// Every staging row, in insertion order.
    async fn load_staging(&self) -> Result<Vec<StagedRow>, StoreError>;

    /// Insert-or-update keyed by (run_date, asset, currency), in one transaction.
    async fn upsert_final(&self, records: &[FinalPriceRecord]) -> Result<u64, StoreError>;

    /// Deletes staging rows whose sequence is at most `up_to_seq`.
    async fn truncate_staging(&self, up_to_seq: i32) -> Result<u64, StoreError>;

    async fn final_records(&self, filter: &PriceFilter) -> Result<Vec<FinalPriceRecord>, StoreError>;

    async fn staging_count(&self) -> Result<u64, StoreError>;
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

fn parse_price(value: String) -> Result<Decimal, StoreError> {
    Decimal::from_str(&value).map_err(|source| StoreError::InvalidPrice { value, source })
}

/// Binds a price the way the backend's `price` column stores it.
fn price_value(backend: DatabaseBackend, price: Decimal) -> SimpleExpr {
    match backend {
        DatabaseBackend::Sqlite => price.to_string().into(),
        _ => price.round_dp(PRICE_SCALE).into(),
    }
}

fn read_price(backend: DatabaseBackend, row: &QueryResult) -> Result<Decimal, StoreError> {
    match backend {
        DatabaseBackend::Sqlite => parse_price(row.try_get("", "price")?),
        _ => Ok(row.try_get::<Decimal>("", "price")?.normalize()),
    }
}

fn staged_row(backend: DatabaseBackend, row: &QueryResult) -> Result<StagedRow, StoreError> {
    Ok(StagedRow {
        seq: row.try_get("", "id")?,
        reading: StagingReading {
            observed_at: row.try_get::<DateTime<Utc>>("", "run_ts")?,
            asset_id: row.try_get("", "coin_id")?,
            quote_currency: row.try_get("", "vs_currency")?,
            price: read_price(backend, row)?,
        },
    })
}

fn final_record(backend: DatabaseBackend, row: &QueryResult) -> Result<FinalPriceRecord, StoreError> {
    Ok(FinalPriceRecord {
        run_date: row.try_get::<NaiveDate>("", "run_date")?,
        asset_id: row.try_get("", "coin_id")?,
        quote_currency: row.try_get("", "vs_currency")?,
        price: read_price(backend, row)?,
        last_updated_at: row.try_get::<DateTime<Utc>>("", "last_updated_ts")?,
    })
}

pub struct SeaOrmPriceStore {
    db: Arc<DatabaseConnection>,
    tables: TableConfig,
}

impl SeaOrmPriceStore {
    pub fn new(db: Arc<DatabaseConnection>, tables: TableConfig) -> Self {
        Self { db, tables }
    }

    pub fn tables(&self) -> &TableConfig {
        &self.tables
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        crate::schema::ensure_schema(self.db.as_ref(), &self.tables).await
    }

    fn upsert_statement(
        &self,
        backend: DatabaseBackend,
        records: &[FinalPriceRecord],
    ) -> Result<InsertStatement, StoreError> {
        let mut insert = Query::insert();
        insert.into_table(self.tables.final_ref()).columns([
            Prices::RunDate,
            Prices::CoinId,
            Prices::VsCurrency,
            Prices::Price,
            Prices::LastUpdatedTs,
        ]);
        for record in records {
            insert.values([
                record.run_date.into(),
                record.asset_id.clone().into(),
                record.quote_currency.clone().into(),
                price_value(backend, record.price),
                record.last_updated_at.into(),
            ])?;
        }
        insert.on_conflict(
            OnConflict::columns([Prices::RunDate, Prices::CoinId, Prices::VsCurrency])
                .update_columns([Prices::Price, Prices::LastUpdatedTs])
                .to_owned(),
        );
        Ok(insert)
    }
}

#[async_trait]
impl PriceStore for SeaOrmPriceStore {
    async fn append_staging(&self, rows: &[StagingReading]) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let backend = self.db.get_database_backend();
        let mut insert = Query::insert();
        insert.into_table(self.tables.staging_ref()).columns([
            Staging::RunTs,
            Staging::CoinId,
            Staging::VsCurrency,
            Staging::Price,
        ]);
        for row in rows {
            insert.values([
                row.observed_at.into(),
                row.asset_id.clone().into(),
                row.quote_currency.clone().into(),
                price_value(backend, row.price),
            ])?;
        }

        let result = self.db.execute(backend.build(&insert)).await?;
        debug!("Appended {} staging rows", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn load_staging(&self) -> Result<Vec<StagedRow>, StoreError> {
        let select = Query::select()
            .columns([
                Staging::Id,
                Staging::RunTs,
                Staging::CoinId,
                Staging::VsCurrency,
                Staging::Price,
            ])
            .from(self.tables.staging_ref())
            .order_by(Staging::Id, Order::Asc)
            .to_owned();

        let backend = self.db.get_database_backend();
        let rows = self.db.query_all(backend.build(&select)).await?;

        rows.iter().map(|row| staged_row(backend, row)).collect()
    }

    async fn upsert_final(&self, records: &[FinalPriceRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let backend = self.db.get_database_backend();
        let statements = records
            .chunks(UPSERT_CHUNK)
            .map(|chunk| self.upsert_statement(backend, chunk))
            .collect::<Result<Vec<_>, _>>()?;

        let txn = self.db.begin().await?;
        for insert in &statements {
            if let Err(e) = txn.execute(backend.build(insert)).await {
                txn.rollback().await?;
                return Err(e.into());
            }
        }
        txn.commit().await?;
        Ok(records.len() as u64)
    }

    async fn truncate_staging(&self, up_to_seq: i32) -> Result<u64, StoreError> {
        let delete = Query::delete()
            .from_table(self.tables.staging_ref())
            .and_where(Expr::col(Staging::Id).lte(up_to_seq))
            .to_owned();

        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(&delete)).await?;
        Ok(result.rows_affected())
    }

    async fn final_records(&self, filter: &PriceFilter) -> Result<Vec<FinalPriceRecord>, StoreError> {
        let mut select = Query::select();
        select
            .columns([
                Prices::RunDate,
                Prices::CoinId,
                Prices::VsCurrency,
                Prices::Price,
                Prices::LastUpdatedTs,
            ])
            .from(self.tables.final_ref());
        if let Some(date) = filter.date {
            select.and_where(Expr::col(Prices::RunDate).eq(date));
        }
        if let Some(coin) = &filter.coin {
            select.and_where(Expr::col(Prices::CoinId).eq(coin.as_str()));
        }
        if let Some(currency) = &filter.currency {
            select.and_where(Expr::col(Prices::VsCurrency).eq(currency.as_str()));
        }
        select
            .order_by(Prices::RunDate, Order::Asc)
            .order_by(Prices::CoinId, Order::Asc)
            .order_by(Prices::VsCurrency, Order::Asc);

        let backend = self.db.get_database_backend();
        let rows = self.db.query_all(backend.build(&select)).await?;

        rows.iter().map(|row| final_record(backend, row)).collect()
    }

    async fn staging_count(&self) -> Result<u64, StoreError> {
        let select = Query::select()
            .expr_as(Func::count(Expr::col(Staging::Id)), Alias::new("count"))
            .from(self.tables.staging_ref())
            .to_owned();

        let backend = self.db.get_database_backend();
        let row = CountRow::find_by_statement(backend.build(&select))
            .one(self.db.as_ref())
            .await?;
        Ok(row.map(|r| r.count.max(0) as u64).unwrap_or(0))
    }
}
