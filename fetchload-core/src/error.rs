use fetchload_client::FetchError;
use std::fmt;
use thiserror::Error;

/// Failures of the SQLite side of a load.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("table '{table}' has no column '{column}'")]
    SchemaMismatch { table: String, column: String },

    #[error("cannot create table '{table}': records have no fields")]
    NoColumns { table: String },

    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("record {index} has no value for merge column '{column}'")]
    MissingMergeColumn { index: usize, column: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Every way a load run can fail. All of them end the run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("HTTP status error: {url} returned {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Pipeline step a [`LoadError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Fetch,
    Decode,
    Storage,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Storage => "storage",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LoadError {
    pub fn stage(&self) -> Stage {
        match self {
            LoadError::Config(_) => Stage::Config,
            LoadError::Network(_) | LoadError::HttpStatus { .. } => Stage::Fetch,
            LoadError::Decode(_) => Stage::Decode,
            LoadError::Storage(_) => Stage::Storage,
        }
    }
}

impl From<FetchError> for LoadError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(e) => LoadError::Network(e),
            FetchError::HttpStatus { url, status } => LoadError::HttpStatus { url, status },
            FetchError::InvalidUrl(msg) => LoadError::Config(msg),
            FetchError::Client(msg) => LoadError::Config(msg),
        }
    }
}

impl From<rusqlite::Error> for LoadError {
    fn from(err: rusqlite::Error) -> Self {
        LoadError::Storage(StorageError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
