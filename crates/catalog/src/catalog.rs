//! The read-only catalog contract.

use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::records::{DatasetRecord, FileRecord};

/// Read access to registered files and their datasets.
#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    /// Look up a file by exact, case-sensitive name.
    ///
    /// When several files share a name the lowest `file_id` is returned.
    async fn lookup_file(&self, file_name: &str) -> CatalogResult<FileRecord>;

    /// All datasets of a file ordered by `(parent_path, name)`.
    async fn list_datasets(&self, file_id: i64) -> CatalogResult<Vec<DatasetRecord>>;

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
