// ⚠️ Error taxonomy for the metric engine and geo joiner
//
// Every failure aborts the whole computation. Nothing is retried and no
// partial result is ever returned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImpactError {
    /// An aggregate returned zero rows where at least one is required
    #[error("no data: {0}")]
    NoData(String),

    /// A required join key is missing from an intermediate result
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("geography error: {0}")]
    Geography(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ImpactError {
    pub fn no_data(what: impl Into<String>) -> Self {
        ImpactError::NoData(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        ImpactError::Validation(what.into())
    }
}

pub type Result<T> = std::result::Result<T, ImpactError>;
