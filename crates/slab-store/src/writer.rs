//! Zarr V3 writer for output hierarchies.
//!
//! An output file is a directory holding one Zarr V3 hierarchy. Groups are
//! written with their attributes, arrays with the element type of the slab
//! they are created from.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;
use zarrs::array::{ArrayBuilder, ChunkGrid, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;

use crate::config::{Compression, WriterConfig};
use crate::error::{Result, SlabStoreError};
use crate::reader::AttributeMap;
use crate::types::{Slab, SlabValues};

/// Writer for one output hierarchy on the local filesystem.
#[derive(Clone)]
pub struct SlabWriter {
    root: PathBuf,
    store: Arc<FilesystemStore>,
    config: WriterConfig,
}

impl SlabWriter {
    /// Create a new, empty output hierarchy at `root`.
    ///
    /// Fails if anything already exists at `root`.
    pub fn create(root: impl AsRef<Path>, config: WriterConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let root_str = root.display().to_string();

        if root.exists() {
            return Err(SlabStoreError::write_failed(&root_str, "output already exists"));
        }
        std::fs::create_dir_all(&root).map_err(|e| SlabStoreError::write_failed(&root_str, e))?;

        let store =
            FilesystemStore::new(&root).map_err(|e| SlabStoreError::write_failed(&root_str, e))?;

        debug!(root = %root_str, compression = %config.compression, "Created output hierarchy");

        Ok(Self {
            root,
            store: Arc::new(store),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Write group metadata with the given attributes.
    pub fn write_group(&self, path: &str, attributes: AttributeMap) -> Result<()> {
        let group = GroupBuilder::new()
            .attributes(attributes)
            .build(self.store.clone(), path)
            .map_err(|e| SlabStoreError::write_failed(path, e))?;

        group
            .store_metadata()
            .map_err(|e| SlabStoreError::write_failed(path, e))
    }

    /// Create an array shaped like `slab`, store its elements, and attach attributes.
    pub fn write_array(&self, path: &str, slab: &Slab, attributes: AttributeMap) -> Result<()> {
        let chunk_grid: ChunkGrid = self
            .config
            .chunk_shape(&slab.shape)
            .try_into()
            .map_err(|e| {
                SlabStoreError::write_failed(path, format!("invalid chunk grid: {:?}", e))
            })?;

        let (data_type, fill_value) = element_type(&slab.values);

        let mut binding = ArrayBuilder::new(slab.shape.clone(), data_type, chunk_grid, fill_value);
        let mut builder = binding.attributes(attributes);

        if self.config.compression != Compression::None {
            let codec = self.compression_codec(path, slab.values.element_size())?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(self.store.clone(), path)
            .map_err(|e| SlabStoreError::write_failed(path, e))?;

        array
            .store_metadata()
            .map_err(|e| SlabStoreError::write_failed(path, e))?;

        if slab.num_elements() == 0 {
            return Ok(());
        }

        let subset = ArraySubset::new_with_shape(slab.shape.clone());

        macro_rules! store {
            ($values:expr) => {
                array
                    .store_array_subset_elements(&subset, $values.as_slice())
                    .map_err(|e| SlabStoreError::write_failed(path, e))?
            };
        }

        match &slab.values {
            SlabValues::I8(v) => store!(v),
            SlabValues::I16(v) => store!(v),
            SlabValues::I32(v) => store!(v),
            SlabValues::I64(v) => store!(v),
            SlabValues::U8(v) => store!(v),
            SlabValues::U16(v) => store!(v),
            SlabValues::U32(v) => store!(v),
            SlabValues::U64(v) => store!(v),
            SlabValues::F32(v) => store!(v),
            SlabValues::F64(v) => store!(v),
        }

        debug!(path = %path, shape = ?slab.shape, dtype = slab.values.dtype(), "Wrote array");
        Ok(())
    }

    fn compression_codec(
        &self,
        path: &str,
        typesize: usize,
    ) -> Result<Arc<dyn BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| SlabStoreError::write_failed(path, "invalid compression level"))?;

        let (shuffle, typesize) = if self.config.shuffle {
            (BloscShuffleMode::Shuffle, Some(typesize))
        } else {
            (BloscShuffleMode::NoShuffle, None)
        };

        let compressor = match self.config.compression {
            Compression::None => {
                return Err(SlabStoreError::write_failed(path, "no compression configured"))
            }
            Compression::BloscLz4 => BloscCompressor::LZ4,
            Compression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| SlabStoreError::write_failed(path, e))?;

        Ok(Arc::new(codec))
    }
}

/// Zarr data type and fill value for a slab's elements. Floats fill with NaN.
fn element_type(values: &SlabValues) -> (DataType, FillValue) {
    match values {
        SlabValues::I8(_) => (DataType::Int8, FillValue::from(0i8)),
        SlabValues::I16(_) => (DataType::Int16, FillValue::from(0i16)),
        SlabValues::I32(_) => (DataType::Int32, FillValue::from(0i32)),
        SlabValues::I64(_) => (DataType::Int64, FillValue::from(0i64)),
        SlabValues::U8(_) => (DataType::UInt8, FillValue::from(0u8)),
        SlabValues::U16(_) => (DataType::UInt16, FillValue::from(0u16)),
        SlabValues::U32(_) => (DataType::UInt32, FillValue::from(0u32)),
        SlabValues::U64(_) => (DataType::UInt64, FillValue::from(0u64)),
        SlabValues::F32(_) => (DataType::Float32, FillValue::from(f32::NAN)),
        SlabValues::F64(_) => (DataType::Float64, FillValue::from(f64::NAN)),
    }
}
