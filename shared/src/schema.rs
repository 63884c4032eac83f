//! Table layout for the staging and final price tables.
//!
//! Table names and the schema qualifier come from [`TableConfig`], so DDL and DML
//! are built with sea-query against aliases instead of static entities.

use crate::config::TableConfig;
use crate::error::StoreError;
use sea_orm::sea_query::{
    Alias, ColumnDef, Index, IntoIden, IntoTableRef, Table, TableCreateStatement, TableRef,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DeriveIden};
use tracing::info;

#[derive(DeriveIden, Clone, Copy)]
pub(crate) enum Staging {
    Id,
    RunTs,
    CoinId,
    VsCurrency,
    Price,
}

#[derive(DeriveIden, Clone, Copy)]
pub(crate) enum Prices {
    RunDate,
    CoinId,
    VsCurrency,
    Price,
    LastUpdatedTs,
}

impl TableConfig {
    pub(crate) fn staging_ref(&self) -> TableRef {
        self.table_ref(&self.staging_table)
    }

    pub(crate) fn final_ref(&self) -> TableRef {
        self.table_ref(&self.final_table)
    }

    fn table_ref(&self, table: &str) -> TableRef {
        match &self.schema {
            Some(schema) => (Alias::new(schema.as_str()), Alias::new(table)).into_table_ref(),
            None => Alias::new(table).into_table_ref(),
        }
    }
}

/// Digits kept for prices on backends with a native DECIMAL type.
pub(crate) const PRICE_PRECISION: u32 = 38;
/// Fractional digits kept; wide enough for sub-satoshi small-cap quotes.
pub(crate) const PRICE_SCALE: u32 = 18;

/// `DECIMAL(38, 18)` where the backend has one. SQLite only offers REAL for
/// decimals, so prices are kept there as canonical decimal text instead.
fn price_column<T: IntoIden>(backend: DatabaseBackend, column: T) -> ColumnDef {
    let mut def = ColumnDef::new(column);
    match backend {
        DatabaseBackend::Sqlite => def.string_len(64),
        _ => def.decimal_len(PRICE_PRECISION, PRICE_SCALE),
    };
    def.not_null();
    def
}

/// Creates both tables if they do not exist yet.
pub async fn ensure_schema(db: &DatabaseConnection, tables: &TableConfig) -> Result<(), StoreError> {
    let backend = db.get_database_backend();

    db.execute(backend.build(&staging_table(backend, tables))).await?;
    db.execute(backend.build(&final_table(backend, tables))).await?;

    info!(
        "Schema ready: staging={}, final={}",
        tables.staging_table, tables.final_table
    );
    Ok(())
}

/// Staging: append-only; `id` records insertion order.
fn staging_table(backend: DatabaseBackend, tables: &TableConfig) -> TableCreateStatement {
    Table::create()
        .table(tables.staging_ref())
        .if_not_exists()
        .col(ColumnDef::new(Staging::Id).integer().not_null().auto_increment().primary_key())
        .col(ColumnDef::new(Staging::RunTs).timestamp_with_time_zone().not_null())
        .col(ColumnDef::new(Staging::CoinId).string_len(64).not_null())
        .col(ColumnDef::new(Staging::VsCurrency).string_len(16).not_null())
        .col(&mut price_column(backend, Staging::Price))
        .to_owned()
}

/// Final: one row per (run_date, coin_id, vs_currency).
fn final_table(backend: DatabaseBackend, tables: &TableConfig) -> TableCreateStatement {
    Table::create()
        .table(tables.final_ref())
        .if_not_exists()
        .col(ColumnDef::new(Prices::RunDate).date().not_null())
        .col(ColumnDef::new(Prices::CoinId).string_len(64).not_null())
        .col(ColumnDef::new(Prices::VsCurrency).string_len(16).not_null())
        .col(&mut price_column(backend, Prices::Price))
        .col(ColumnDef::new(Prices::LastUpdatedTs).timestamp_with_time_zone().not_null())
        .primary_key(
            Index::create()
                .col(Prices::RunDate)
                .col(Prices::CoinId)
                .col(Prices::VsCurrency),
        )
        .to_owned()
}
