use crate::pipeline::RunStage;
use thiserror::Error;

/// Failure to obtain a snapshot from the price source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("price source did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("network error talking to price source: {0}")]
    Network(#[source] reqwest::Error),

    #[error("price source returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("price source returned a malformed snapshot: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Network(_) => "network",
            FetchError::Status { .. } => "status",
            FetchError::Malformed(_) => "malformed",
        }
    }
}

/// Failure reading or writing the staging/final tables.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("could not build statement: {0}")]
    Statement(#[from] sea_orm::sea_query::error::Error),

    #[error("stored price {value:?} is not a decimal: {source}")]
    InvalidPrice {
        value: String,
        #[source]
        source: rust_decimal::Error,
    },
}

/// A pipeline run that halted. Each variant names the step that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("staging write failed: {0}")]
    StageWrite(#[source] StoreError),

    #[error("merge failed: {0}")]
    Merge(#[source] StoreError),

    #[error("staging truncate failed after a successful merge: {0}")]
    Truncate(#[source] StoreError),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "FetchError",
            PipelineError::StageWrite(_) => "StageWriteError",
            PipelineError::Merge(_) => "MergeError",
            PipelineError::Truncate(_) => "TruncateError",
        }
    }

    /// The last state the run reached before failing.
    pub fn stage(&self) -> RunStage {
        match self {
            PipelineError::Fetch(_) => RunStage::Pending,
            PipelineError::StageWrite(_) => RunStage::Fetched,
            PipelineError::Merge(_) => RunStage::Staged,
            PipelineError::Truncate(_) => RunStage::Merged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fetch_error_kinds() {
        assert_eq!(FetchError::Timeout(Duration::from_secs(30)).kind(), "timeout");
        assert_eq!(
            FetchError::Status { status: 429, body: String::new() }.kind(),
            "status"
        );
        assert_eq!(FetchError::Malformed("eof".to_string()).kind(), "malformed");
    }

    #[test]
    fn test_pipeline_error_reports_stage() {
        let err = PipelineError::from(FetchError::Malformed("eof".to_string()));
        assert_eq!(err.kind(), "FetchError");
        assert_eq!(err.stage(), RunStage::Pending);

        let db = || StoreError::Db(sea_orm::DbErr::Custom("down".to_string()));
        assert_eq!(PipelineError::StageWrite(db()).stage(), RunStage::Fetched);
        assert_eq!(PipelineError::Merge(db()).stage(), RunStage::Staged);
        assert_eq!(PipelineError::Truncate(db()).stage(), RunStage::Merged);
        assert!(PipelineError::Truncate(db()).to_string().contains("down"));
    }
}
