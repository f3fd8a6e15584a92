//! In-process catalog.
//!
//! Used by tests and by the service when no database is configured. It can be
//! seeded from a JSON/YAML manifest describing files and datasets.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::catalog::DatasetCatalog;
use crate::error::{CatalogError, CatalogResult};
use crate::records::{join_path, normalize_group_path, parse_shape, DatasetRecord, FileRecord};

#[derive(Default)]
struct Tables {
    files: BTreeMap<i64, FileRecord>,
    /// Keyed by (file_id, parent_path, name), which keeps listing order.
    datasets: BTreeMap<(i64, String, String), DatasetRecord>,
}

/// Catalog held entirely in memory.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: RwLock<Tables>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file. An existing record with the same id is replaced.
    pub async fn insert_file(&self, record: FileRecord) {
        let mut tables = self.tables.write().await;
        tables.files.insert(record.file_id, record);
    }

    /// Register a dataset, enforcing `(file_id, parent_path, name)` uniqueness.
    pub async fn insert_dataset(&self, mut record: DatasetRecord) -> CatalogResult<()> {
        record.parent_path = normalize_group_path(&record.parent_path);

        let mut tables = self.tables.write().await;
        if !tables.files.contains_key(&record.file_id) {
            return Err(CatalogError::UnknownFile(record.file_id));
        }

        let key = (
            record.file_id,
            record.parent_path.clone(),
            record.name.clone(),
        );
        if tables.datasets.contains_key(&key) {
            return Err(CatalogError::DuplicateDataset {
                file_id: record.file_id,
                path: record.full_path(),
            });
        }

        tables.datasets.insert(key, record);
        Ok(())
    }

    /// Build a catalog from a manifest.
    pub async fn from_manifest(manifest: CatalogManifest) -> CatalogResult<Self> {
        let catalog = Self::new();
        for file in manifest.files {
            catalog
                .insert_file(FileRecord {
                    file_id: file.file_id,
                    file_name: file.file_name,
                    storage_path: file.storage_path,
                })
                .await;

            for dataset in file.datasets {
                let parent_path = normalize_group_path(&dataset.parent_path);
                let shape = match dataset.shape {
                    ShapeSpec::Extents(extents) => extents,
                    ShapeSpec::Text(text) => {
                        let path = join_path(&parent_path, &dataset.name);
                        parse_shape(&path, Some(&text))?
                    }
                };
                catalog
                    .insert_dataset(DatasetRecord {
                        file_id: file.file_id,
                        name: dataset.name,
                        parent_path,
                        shape,
                        dtype: dataset.dtype,
                    })
                    .await?;
            }
        }
        Ok(catalog)
    }

    pub async fn file_count(&self) -> usize {
        self.tables.read().await.files.len()
    }
}

#[async_trait]
impl DatasetCatalog for MemoryCatalog {
    async fn lookup_file(&self, file_name: &str) -> CatalogResult<FileRecord> {
        let tables = self.tables.read().await;
        // BTreeMap iteration is ordered by file_id, so the first hit is the lowest id.
        tables
            .files
            .values()
            .find(|f| f.file_name == file_name)
            .cloned()
            .ok_or_else(|| CatalogError::FileNotFound(file_name.to_string()))
    }

    async fn list_datasets(&self, file_id: i64) -> CatalogResult<Vec<DatasetRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .datasets
            .range((file_id, String::new(), String::new())..)
            .take_while(|((id, _, _), _)| *id == file_id)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Serialized catalog contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub file_id: i64,
    pub file_name: String,
    pub storage_path: String,
    #[serde(default)]
    pub datasets: Vec<ManifestDataset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDataset {
    pub name: String,
    #[serde(default = "root_group")]
    pub parent_path: String,
    pub shape: ShapeSpec,
    #[serde(default)]
    pub dtype: String,
}

/// A shape given either as a list of extents or as ingestion text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeSpec {
    Extents(Vec<u64>),
    Text(String),
}

fn root_group() -> String {
    "/".to_string()
}
