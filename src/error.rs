use thiserror::Error;
use uuid::Uuid;

pub type RankingResult<T> = Result<T, RankingError>;

#[derive(Debug, Error)]
pub enum RankingError {
    /// Window parameters were malformed; raised before any data access.
    #[error("invalid window request: {0}")]
    InvalidWindowRequest(String),

    #[error("work store unavailable for agent {agent_id}: {source}")]
    StoreUnavailable {
        agent_id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("aggregation task failed: {0}")]
    AggregationTask(#[from] tokio::task::JoinError),

    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(#[source] StoreError),

    #[error("archive write failed for sprint {sprint_number}, agent {agent_id}: {source}")]
    ArchiveWriteFailed {
        sprint_number: u32,
        agent_id: Uuid,
        #[source]
        source: StoreError,
    },

    /// Cohort maximum for a metric is zero, so the metric cannot be normalized.
    #[error("degenerate cohort: maximum {metric} is zero")]
    DegenerateCohort { metric: &'static str },
}

impl RankingError {
    pub fn invalid_window(message: impl Into<String>) -> Self {
        Self::InvalidWindowRequest(message.into())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
