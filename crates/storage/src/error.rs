//! Storage error types.

use thiserror::Error;

use crate::RecordId;

/// Storage errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No record with this id exists.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// The record exists but belongs to a different caller.
    #[error("record {0} is owned by another caller")]
    NotOwner(RecordId),

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
