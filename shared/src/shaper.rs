//! Flattens a price snapshot into staging rows.

use crate::models::{PriceSnapshot, StagingReading};
use chrono::{DateTime, Utc};

/// One row per (asset, currency) pair present in `snapshot`, all stamped with the
/// same `observed_at`. Rows come out ordered by asset, then currency.
pub fn shape_rows(snapshot: &PriceSnapshot, observed_at: DateTime<Utc>) -> Vec<StagingReading> {
    let mut rows = Vec::with_capacity(snapshot.pair_count());

    for (asset_id, prices) in &snapshot.0 {
        for (quote_currency, price) in prices {
            rows.push(StagingReading {
                observed_at,
                asset_id: asset_id.clone(),
                quote_currency: quote_currency.clone(),
                price: *price,
            });
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_shape_single_asset_two_currencies() {
        let snapshot: PriceSnapshot =
            serde_json::from_str(r#"{"bitcoin":{"usd":100,"inr":8000}}"#).unwrap();

        let rows = shape_rows(&snapshot, ts());

        assert_eq!(rows.len(), 2);
        let usd = StagingReading {
            observed_at: ts(),
            asset_id: "bitcoin".to_string(),
            quote_currency: "usd".to_string(),
            price: Decimal::from(100),
        };
        let inr = StagingReading {
            observed_at: ts(),
            asset_id: "bitcoin".to_string(),
            quote_currency: "inr".to_string(),
            price: Decimal::from(8000),
        };
        assert!(rows.contains(&usd));
        assert!(rows.contains(&inr));
    }

    #[test]
    fn test_shape_shares_one_timestamp() {
        let snapshot: PriceSnapshot = serde_json::from_str(
            r#"{"bitcoin":{"usd":1,"inr":2},"ethereum":{"usd":3,"inr":4}}"#,
        )
        .unwrap();

        let rows = shape_rows(&snapshot, ts());

        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.observed_at == ts()));
    }

    #[test]
    fn test_shape_only_pairs_present() {
        let snapshot: PriceSnapshot =
            serde_json::from_str(r#"{"bitcoin":{"usd":1},"ethereum":{}}"#).unwrap();

        let rows = shape_rows(&snapshot, ts());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asset_id, "bitcoin");
    }

    #[test]
    fn test_shape_empty_snapshot() {
        let rows = shape_rows(&PriceSnapshot::default(), ts());
        assert!(rows.is_empty());
    }
}
