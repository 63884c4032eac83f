//! Fetch -> stage -> merge -> compact, one cycle at a time.
//!
//! Each step only runs when the previous one returned `Ok`. The merge upsert and
//! the staging truncate are separate steps: staging is cleared only after the
//! upsert committed, and re-merging rows that were already applied is harmless.

use crate::coingecko::PriceSource;
use crate::compaction::{select_latest, Compacted};
use crate::error::PipelineError;
use crate::models::StagingReading;
use crate::shaper::shape_rows;
use crate::store::PriceStore;
use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStage {
    Pending,
    Fetched,
    Staged,
    Merged,
    Compacted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub observed_at: DateTime<Utc>,
    pub stage: RunStage,
    pub rows_staged: u64,
    pub partitions_merged: u64,
    pub staging_rows_cleared: u64,
    pub missing_pairs: Vec<(String, String)>,
}

/// What a merge step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub partitions: u64,
    pub watermark: Option<i32>,
}

pub struct PricePipeline {
    source: Arc<dyn PriceSource>,
    store: Arc<dyn PriceStore>,
    assets: Vec<String>,
    currencies: Vec<String>,
}

impl PricePipeline {
    pub fn new(
        source: Arc<dyn PriceSource>,
        store: Arc<dyn PriceStore>,
        assets: Vec<String>,
        currencies: Vec<String>,
    ) -> Self {
        Self {
            source,
            store,
            assets,
            currencies,
        }
    }

    pub fn store(&self) -> &Arc<dyn PriceStore> {
        &self.store
    }

    pub async fn run_cycle(&self) -> Result<RunReport, PipelineError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Runs one cycle with `observed_at` as the capture time of the snapshot.
    ///
    /// The capture time is truncated to whole seconds, the precision MySQL keeps
    /// in the timestamp columns, so the partition date never rolls over on write.
    pub async fn run_cycle_at(&self, observed_at: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        let observed_at = observed_at.trunc_subsecs(0);
        let run_id = Uuid::new_v4();
        let span = info_span!("price_run", %run_id, source = self.source.name());

        async move {
            let result = self.execute(run_id, observed_at).await;
            match &result {
                Ok(report) => info!(
                    "Run complete: staged={}, merged={}, cleared={}",
                    report.rows_staged, report.partitions_merged, report.staging_rows_cleared
                ),
                Err(e) => error!(kind = e.kind(), stage = ?e.stage(), "Run halted: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, run_id: Uuid, observed_at: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        let mut report = RunReport {
            run_id,
            observed_at,
            stage: RunStage::Pending,
            rows_staged: 0,
            partitions_merged: 0,
            staging_rows_cleared: 0,
            missing_pairs: Vec::new(),
        };

        let snapshot = self.source.fetch_snapshot().await?;
        report.stage = RunStage::Fetched;
        report.missing_pairs = snapshot.missing_pairs(&self.assets, &self.currencies);
        for (asset, currency) in &report.missing_pairs {
            warn!("Price source returned no {}/{} price", asset, currency);
        }

        let rows = shape_rows(&snapshot, observed_at);
        report.rows_staged = self.stage(&rows).await?;
        report.stage = RunStage::Staged;

        let merged = self.merge().await?;
        report.partitions_merged = merged.partitions;
        report.stage = RunStage::Merged;

        report.staging_rows_cleared = self.compact(&merged).await?;
        report.stage = RunStage::Compacted;

        Ok(report)
    }

    /// Appends shaped rows to staging.
    pub async fn stage(&self, rows: &[StagingReading]) -> Result<u64, PipelineError> {
        let written = self
            .store
            .append_staging(rows)
            .await
            .map_err(PipelineError::StageWrite)?;
        info!("Staged {} readings", written);
        Ok(written)
    }

    /// Upserts the latest staged reading of every partition into the final table.
    /// Staging is left untouched.
    pub async fn merge(&self) -> Result<MergeOutcome, PipelineError> {
        let staged = self.store.load_staging().await.map_err(PipelineError::Merge)?;
        let Compacted { records, watermark } = select_latest(&staged);

        if records.is_empty() {
            info!("Staging is empty, nothing to merge");
            return Ok(MergeOutcome::default());
        }

        let partitions = self
            .store
            .upsert_final(&records)
            .await
            .map_err(PipelineError::Merge)?;
        info!(
            "Merged {} staging rows into {} partitions",
            staged.len(),
            partitions
        );
        Ok(MergeOutcome { partitions, watermark })
    }

    /// Clears the staging rows a successful merge consumed.
    pub async fn compact(&self, merged: &MergeOutcome) -> Result<u64, PipelineError> {
        let Some(watermark) = merged.watermark else {
            return Ok(0);
        };
        let cleared = self
            .store
            .truncate_staging(watermark)
            .await
            .map_err(PipelineError::Truncate)?;
        info!("Cleared {} staging rows", cleared);
        Ok(cleared)
    }
}
