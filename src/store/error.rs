//! Store error taxonomy
//! A missing record is not an error - only I/O-level failure is

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open database at {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    #[error("storage failure: {0}")]
    Sled(#[from] sled::Error),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value for {partition}/{key} is not valid utf-8")]
    Corrupt { partition: String, key: String },

    /// Backend-specific failure, also used by test fakes to inject errors
    #[error("backend failure: {0}")]
    Backend(String),

    #[error("storage task did not complete")]
    TaskJoin,
}

pub type StoreResult<T> = Result<T, StoreError>;
