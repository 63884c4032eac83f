//! Partition + select-max phase of the merge.
//!
//! Staging rows are grouped by [`PartitionKey`] and the row with the greatest
//! `observed_at` wins. When several rows share that timestamp, the one with the
//! highest staging sequence (the last inserted) wins, so the choice never depends
//! on the order the store happens to return rows in.

use crate::models::{FinalPriceRecord, PartitionKey, StagedRow};
use std::collections::BTreeMap;

/// Result of compacting a batch of staging rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compacted {
    /// One record per partition, ordered by partition key.
    pub records: Vec<FinalPriceRecord>,
    /// Highest staging sequence that took part in the compaction.
    pub watermark: Option<i32>,
}

impl Compacted {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn select_latest(rows: &[StagedRow]) -> Compacted {
    let mut winners: BTreeMap<PartitionKey, &StagedRow> = BTreeMap::new();

    for row in rows {
        winners
            .entry(row.reading.partition_key())
            .and_modify(|current| {
                if supersedes(row, *current) {
                    *current = row;
                }
            })
            .or_insert(row);
    }

    Compacted {
        records: winners
            .into_values()
            .map(|row| FinalPriceRecord::from_reading(&row.reading))
            .collect(),
        watermark: rows.iter().map(|row| row.seq).max(),
    }
}

fn supersedes(candidate: &StagedRow, current: &StagedRow) -> bool {
    (candidate.reading.observed_at, candidate.seq) > (current.reading.observed_at, current.seq)
}
