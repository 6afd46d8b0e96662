use thiserror::Error;

/// Failure taxonomy for the analytics engine.
///
/// The orchestrator recovers per-task `Store` failures on its own (a failed
/// fetch contributes zeroes, it never aborts a batch); `StoreUnavailable` is
/// reserved for the case where every task in a batch failed, so callers can
/// tell a dead data layer apart from a genuinely quiet period.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store query failed: {0}")]
    Store(String),

    #[error("data store unavailable: all {failed} fetch tasks in the batch failed")]
    StoreUnavailable { failed: usize },
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

impl From<sqlx::Error> for AnalyticsError {
    fn from(err: sqlx::Error) -> Self {
        AnalyticsError::Store(err.to_string())
    }
}
