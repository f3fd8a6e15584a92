//! Error types for catalog access.

use thiserror::Error;

/// Result type alias using CatalogError.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by catalog implementations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No file with this exact name is registered.
    #[error("file not found in catalog: {0}")]
    FileNotFound(String),

    /// The stored shape text could not be parsed.
    #[error("invalid shape '{shape}' for dataset {dataset}")]
    InvalidShape { dataset: String, shape: String },

    /// A dataset with the same (file_id, parent_path, name) already exists.
    #[error("duplicate dataset {path} in file {file_id}")]
    DuplicateDataset { file_id: i64, path: String },

    /// A dataset references a file that is not registered.
    #[error("unknown file id: {0}")]
    UnknownFile(i64),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::Database(err.to_string())
    }
}
