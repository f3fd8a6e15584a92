//! Zarr V3 slab reader.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupCreateError};
use zarrs::storage::ReadableStorageTraits;
use zarrs_filesystem::FilesystemStore;

use crate::error::{Result, SlabStoreError};
use crate::remote::{create_object_storage, ObjectStoreConfig, ObjectStoreStorage};
use crate::types::{Slab, SlabRange, SlabValues};

use super::{node_path, AttributeMap, SlabReader};

/// Slab reader over any `zarrs` readable store.
///
/// The store root holds one hierarchy per file; a file's locator is the
/// prefix of its root group inside the store. Reads are synchronous in
/// `zarrs`, so they run on the blocking pool.
pub struct ZarrSlabReader<S: ReadableStorageTraits> {
    storage: Arc<S>,
}

impl<S: ReadableStorageTraits> Clone for ZarrSlabReader<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl ZarrSlabReader<FilesystemStore> {
    /// Reader over a local directory (or POSIX mount) holding file hierarchies.
    pub fn filesystem(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let store = FilesystemStore::new(root)
            .map_err(|e| SlabStoreError::open_failed(root.display().to_string(), e))?;
        Ok(Self::new(Arc::new(store)))
    }
}

impl ZarrSlabReader<ObjectStoreStorage> {
    /// Reader over an S3-compatible bucket.
    pub fn object_store(config: &ObjectStoreConfig) -> Result<Self> {
        Ok(Self::new(create_object_storage(config)?))
    }
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> ZarrSlabReader<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Open an array and read one subset of it (synchronous).
    fn read_slab_sync(storage: Arc<S>, path: &str, range: &SlabRange) -> Result<Slab> {
        let array =
            Array::open(storage, path).map_err(|e| SlabStoreError::open_failed(path, e))?;

        range.check_within(path, array.shape())?;

        let subset = ArraySubset::new_with_start_shape(range.start.clone(), range.shape.clone())
            .map_err(|e| SlabStoreError::invalid_range(path, e))?;

        if let Ok(Some(chunks)) = array.chunks_in_array_subset(&subset) {
            debug!(
                path = %path,
                elements = subset.num_elements(),
                chunks = chunks.num_elements(),
                "Reading slab"
            );
        }

        macro_rules! retrieve {
            ($variant:ident, $ty:ty) => {
                SlabValues::$variant(
                    array
                        .retrieve_array_subset_elements::<$ty>(&subset)
                        .map_err(|e| SlabStoreError::read_failed(path, e))?,
                )
            };
        }

        let values = match array.data_type() {
            DataType::Int8 => retrieve!(I8, i8),
            DataType::Int16 => retrieve!(I16, i16),
            DataType::Int32 => retrieve!(I32, i32),
            DataType::Int64 => retrieve!(I64, i64),
            DataType::UInt8 => retrieve!(U8, u8),
            DataType::UInt16 => retrieve!(U16, u16),
            DataType::UInt32 => retrieve!(U32, u32),
            DataType::UInt64 => retrieve!(U64, u64),
            DataType::Float32 => retrieve!(F32, f32),
            DataType::Float64 => retrieve!(F64, f64),
            other => {
                return Err(SlabStoreError::UnsupportedDataType {
                    path: path.to_string(),
                    data_type: format!("{:?}", other),
                })
            }
        };

        Slab::new(range.shape.clone(), values)
    }

    /// Read the attributes of an array or group (synchronous).
    fn read_attributes_sync(storage: Arc<S>, path: &str) -> Result<AttributeMap> {
        if let Ok(array) = Array::open(storage.clone(), path) {
            return Ok(array.attributes().clone());
        }

        match Group::open(storage, path) {
            Ok(group) => Ok(group.attributes().clone()),
            Err(GroupCreateError::MissingMetadata) => Ok(AttributeMap::new()),
            Err(e) => Err(SlabStoreError::read_failed(path, e)),
        }
    }
}

#[async_trait]
impl<S: ReadableStorageTraits + Send + Sync + 'static> SlabReader for ZarrSlabReader<S> {
    #[instrument(skip(self, range), fields(start = ?range.start, shape = ?range.shape))]
    async fn read_slab(
        &self,
        locator: &str,
        dataset_path: &str,
        range: &SlabRange,
    ) -> Result<Slab> {
        let path = node_path(locator, dataset_path);
        let storage = self.storage.clone();
        let range = range.clone();
        let task_path = path.clone();

        tokio::task::spawn_blocking(move || Self::read_slab_sync(storage, &task_path, &range))
            .await
            .map_err(|e| SlabStoreError::read_failed(path, format!("read task failed: {}", e)))?
    }

    async fn read_attributes(&self, locator: &str, node: &str) -> Result<AttributeMap> {
        let path = node_path(locator, node);
        let storage = self.storage.clone();
        let task_path = path.clone();

        tokio::task::spawn_blocking(move || Self::read_attributes_sync(storage, &task_path))
            .await
            .map_err(|e| SlabStoreError::read_failed(path, format!("read task failed: {}", e)))?
    }
}
