use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Unknown folder: {0}")]
    UnknownFolder(String),

    #[error("Folder {0} has no {1} device configured")]
    MissingDevice(String, &'static str),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Record not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, StoreError>;
