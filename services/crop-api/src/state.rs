//! Application state and shared resources.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog::{CatalogManifest, DatasetCatalog, MemoryCatalog, PgCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use slab_store::{SlabReader, ZarrSlabReader};
use subset::Cropper;
use tracing::info;

use crate::config::{CropApiConfig, StorageConfig};
use crate::tracker::JobTracker;

/// Shared application state.
pub struct AppState {
    pub cropper: Cropper,
    pub tracker: JobTracker,
    pub job_timeout: Option<Duration>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(cropper: Cropper) -> Self {
        Self {
            cropper,
            tracker: JobTracker::new(),
            job_timeout: None,
            prometheus: None,
        }
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Build state from configuration, connecting the catalog and storage.
    pub async fn from_config(config: &CropApiConfig) -> Result<Self> {
        let catalog = connect_catalog(config).await?;
        let reader = open_reader(&config.storage)?;
        let cropper = Cropper::new(catalog, reader, config.crop.clone());

        Ok(Self::new(cropper).with_job_timeout(config.job_timeout_secs.map(Duration::from_secs)))
    }
}

/// PostgreSQL catalog if a database is configured, in-memory otherwise.
pub async fn connect_catalog(config: &CropApiConfig) -> Result<Arc<dyn DatasetCatalog>> {
    if let Some(url) = &config.database_url {
        let catalog = PgCatalog::connect(url, config.database_max_connections)
            .await
            .context("Failed to connect to catalog database")?;
        info!(backend = "postgres", "Connected to catalog");
        return Ok(Arc::new(catalog));
    }

    let catalog = match &config.catalog_manifest {
        Some(path) => load_manifest(path).await?,
        None => MemoryCatalog::new(),
    };
    info!(
        backend = "memory",
        files = catalog.file_count().await,
        "Loaded catalog"
    );
    Ok(Arc::new(catalog))
}

/// Seed an in-memory catalog from a JSON or YAML manifest.
pub async fn load_manifest(path: &Path) -> Result<MemoryCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let manifest: CatalogManifest = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    MemoryCatalog::from_manifest(manifest)
        .await
        .with_context(|| format!("Invalid manifest: {:?}", path))
}

/// Slab reader over the configured storage backend.
pub fn open_reader(storage: &StorageConfig) -> Result<Arc<dyn SlabReader>> {
    let reader: Arc<dyn SlabReader> = match storage {
        StorageConfig::Filesystem { root } => {
            info!(root = %root.display(), "Reading source files from filesystem");
            Arc::new(ZarrSlabReader::filesystem(root)?)
        }
        StorageConfig::ObjectStore(store) => {
            info!(endpoint = %store.endpoint, bucket = %store.bucket, "Reading source files from object storage");
            Arc::new(ZarrSlabReader::object_store(store)?)
        }
    };
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manifest_catalog() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(
            &path,
            r#"
files:
  - file_id: 1
    file_name: swath.h5
    storage_path: gpm/swath.h5
    datasets:
      - { name: Latitude, parent_path: /FS, shape: "(100, 50)", dtype: float32 }
      - { name: Longitude, parent_path: /FS, shape: [100, 50], dtype: float32 }
"#,
        )
        .unwrap();

        let config = CropApiConfig {
            catalog_manifest: Some(path),
            ..CropApiConfig::default()
        };
        let catalog = connect_catalog(&config).await.unwrap();
        assert_eq!(catalog.backend_name(), "memory");

        let file = catalog.lookup_file("swath.h5").await.unwrap();
        assert_eq!(file.storage_path, "gpm/swath.h5");
        let datasets = catalog.list_datasets(1).await.unwrap();
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].shape, vec![100, 50]);
    }

    #[tokio::test]
    async fn test_missing_manifest_fails() {
        let config = CropApiConfig {
            catalog_manifest: Some("/nonexistent/catalog.yaml".into()),
            ..CropApiConfig::default()
        };
        assert!(connect_catalog(&config).await.is_err());
    }
}
