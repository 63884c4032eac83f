use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One response from the price source: asset id -> quote currency -> price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSnapshot(pub BTreeMap<String, BTreeMap<String, Decimal>>);

impl PriceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of (asset, currency) pairs carried by the snapshot.
    pub fn pair_count(&self) -> usize {
        self.0.values().map(|prices| prices.len()).sum()
    }

    pub fn price(&self, asset_id: &str, quote_currency: &str) -> Option<Decimal> {
        self.0.get(asset_id)?.get(quote_currency).copied()
    }

    /// Configured pairs the source did not return, in configuration order.
    pub fn missing_pairs(&self, assets: &[String], currencies: &[String]) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for asset in assets {
            for currency in currencies {
                if self.price(asset, currency).is_none() {
                    missing.push((asset.clone(), currency.clone()));
                }
            }
        }
        missing
    }
}

/// A raw reading as written to the staging table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingReading {
    pub observed_at: DateTime<Utc>,
    pub asset_id: String,
    pub quote_currency: String,
    pub price: Decimal,
}

impl StagingReading {
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey {
            run_date: self.observed_at.date_naive(),
            asset_id: self.asset_id.clone(),
            quote_currency: self.quote_currency.clone(),
        }
    }
}

/// A staging reading together with its insertion sequence in the staging table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRow {
    pub seq: i32,
    pub reading: StagingReading,
}

/// Granularity of deduplication: UTC calendar day, asset, quote currency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub run_date: NaiveDate,
    pub asset_id: String,
    pub quote_currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalPriceRecord {
    pub run_date: NaiveDate,
    pub asset_id: String,
    pub quote_currency: String,
    pub price: Decimal,
    pub last_updated_at: DateTime<Utc>,
}

impl FinalPriceRecord {
    pub fn from_reading(reading: &StagingReading) -> Self {
        FinalPriceRecord {
            run_date: reading.observed_at.date_naive(),
            asset_id: reading.asset_id.clone(),
            quote_currency: reading.quote_currency.clone(),
            price: reading.price,
            last_updated_at: reading.observed_at,
        }
    }
}

/// Optional filters for reading the final table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PriceFilter {
    pub date: Option<NaiveDate>,
    pub coin: Option<String>,
    pub currency: Option<String>,
}
