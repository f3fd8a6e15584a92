//! Dataset catalog for chunked array files.
//!
//! Provides a read-only view over:
//! - `files`: one row per source array file and its storage locator
//! - `datasets`: one row per array variable, with its group path, shape and dtype
//!
//! The catalog is populated by an external ingestion step. Engines consume it
//! through the [`DatasetCatalog`] trait and never write to it.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;

pub use catalog::DatasetCatalog;
pub use error::{CatalogError, CatalogResult};
pub use memory::{CatalogManifest, ManifestDataset, ManifestFile, MemoryCatalog, ShapeSpec};
pub use postgres::PgCatalog;
pub use records::{
    format_shape, group_ancestors, join_path, normalize_group_path, parse_shape, DatasetRecord,
    FileRecord,
};
