//! Error types for crop jobs.

use catalog::CatalogError;
use slab_store::SlabStoreError;
use thiserror::Error;

/// Errors that can end a crop job.
#[derive(Error, Debug)]
pub enum CropError {
    /// No file with this name is registered.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Coordinates are missing or their shapes conflict.
    #[error("ambiguous coordinate: {0}")]
    AmbiguousCoordinate(String),

    /// The bounding box violates its invariants.
    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// No coordinate point falls inside the bounding box.
    #[error("bounding box does not intersect {0}")]
    EmptyIntersection(String),

    /// Reading a slab from the source file failed.
    #[error("slab read failed: {0}")]
    SlabRead(#[source] SlabStoreError),

    /// Creating or writing the output failed.
    #[error("output write failed: {0}")]
    OutputWrite(String),

    /// The catalog backend failed.
    #[error("catalog error: {0}")]
    Catalog(#[source] CatalogError),

    /// The job exceeded its time limit.
    #[error("crop job timed out after {0}s")]
    Timeout(u64),
}

impl CropError {
    /// Stable kind name used in responses and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) => "FileNotFound",
            Self::AmbiguousCoordinate(_) => "AmbiguousCoordinate",
            Self::InvalidBoundingBox(_) => "InvalidBoundingBox",
            Self::EmptyIntersection(_) => "EmptyIntersection",
            Self::SlabRead(_) => "SlabReadError",
            Self::OutputWrite(_) => "OutputWriteError",
            Self::Catalog(_) => "CatalogError",
            Self::Timeout(_) => "Timeout",
        }
    }

    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::AmbiguousCoordinate(msg.into())
    }

    pub fn invalid_bbox(msg: impl Into<String>) -> Self {
        Self::InvalidBoundingBox(msg.into())
    }

    pub fn output_write(msg: impl ToString) -> Self {
        Self::OutputWrite(msg.to_string())
    }
}

impl From<CatalogError> for CropError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::FileNotFound(name) => Self::FileNotFound(name),
            other => Self::Catalog(other),
        }
    }
}

impl From<SlabStoreError> for CropError {
    fn from(err: SlabStoreError) -> Self {
        if err.is_write() {
            Self::OutputWrite(err.to_string())
        } else {
            Self::SlabRead(err)
        }
    }
}

/// Result type for crop operations.
pub type Result<T> = std::result::Result<T, CropError>;
