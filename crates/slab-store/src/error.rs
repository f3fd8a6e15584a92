//! Error types for slab access.

use thiserror::Error;

/// Errors that can occur while reading or writing slabs.
#[derive(Error, Debug)]
pub enum SlabStoreError {
    /// The array, group or store could not be opened.
    #[error("failed to open {path}: {message}")]
    OpenFailed { path: String, message: String },

    /// Chunk retrieval or decoding failed.
    #[error("failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },

    /// Creating or writing an output node failed.
    #[error("failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },

    /// The array element type has no slab representation.
    #[error("unsupported data type {data_type} for {path}")]
    UnsupportedDataType { path: String, data_type: String },

    /// The requested range does not fit the array.
    #[error("invalid range for {path}: {message}")]
    InvalidRange { path: String, message: String },
}

impl SlabStoreError {
    pub fn open_failed(path: impl Into<String>, msg: impl ToString) -> Self {
        Self::OpenFailed {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    pub fn read_failed(path: impl Into<String>, msg: impl ToString) -> Self {
        Self::ReadFailed {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    pub fn write_failed(path: impl Into<String>, msg: impl ToString) -> Self {
        Self::WriteFailed {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    pub fn invalid_range(path: impl Into<String>, msg: impl ToString) -> Self {
        Self::InvalidRange {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// True for errors raised while writing output.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::WriteFailed { .. })
    }
}

/// Result type for slab operations.
pub type Result<T> = std::result::Result<T, SlabStoreError>;
