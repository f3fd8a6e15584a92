//! S3-compatible object storage backend for slab reads.

use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use serde::{Deserialize, Serialize};
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use crate::error::{Result, SlabStoreError};

/// Blocking executor that works from within a tokio runtime.
///
/// Moves the current task off the async worker with `block_in_place` before
/// driving the future on the current runtime handle.
#[derive(Clone, Copy)]
pub struct TokioBlockOn;

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
    }
}

/// Connection settings for an S3-compatible bucket holding source files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Endpoint URL (e.g., "http://minio:9000")
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Use "us-east-1" for MinIO
    pub region: String,
    /// Required for plain-HTTP endpoints
    pub allow_http: bool,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "array-files".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
        }
    }
}

impl ObjectStoreConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("S3_ENDPOINT").unwrap_or(defaults.endpoint),
            bucket: std::env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            access_key_id: std::env::var("S3_ACCESS_KEY").unwrap_or(defaults.access_key_id),
            secret_access_key: std::env::var("S3_SECRET_KEY")
                .unwrap_or(defaults.secret_access_key),
            region: std::env::var("S3_REGION").unwrap_or(defaults.region),
            allow_http: std::env::var("S3_ALLOW_HTTP")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.allow_http),
        }
    }
}

/// Sync storage adapter over the async S3 store, usable by the `zarrs` API.
pub type ObjectStoreStorage =
    AsyncToSyncStorageAdapter<AsyncObjectStore<object_store::aws::AmazonS3>, TokioBlockOn>;

/// Build the object-store backed storage for slab reads.
pub fn create_object_storage(config: &ObjectStoreConfig) -> Result<Arc<ObjectStoreStorage>> {
    let s3 = AmazonS3Builder::new()
        .with_endpoint(&config.endpoint)
        .with_bucket_name(&config.bucket)
        .with_access_key_id(&config.access_key_id)
        .with_secret_access_key(&config.secret_access_key)
        .with_region(&config.region)
        .with_allow_http(config.allow_http)
        .build()
        .map_err(|e| SlabStoreError::open_failed(&config.bucket, format!("S3 client: {}", e)))?;

    let async_store = Arc::new(AsyncObjectStore::new(s3));
    Ok(Arc::new(AsyncToSyncStorageAdapter::new(
        async_store,
        TokioBlockOn,
    )))
}
