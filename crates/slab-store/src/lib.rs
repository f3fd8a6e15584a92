//! Slab access for chunked array hierarchies.
//!
//! This crate is the boundary to the storage holding source files:
//! - [`SlabReader`] reads a rectangular slab of one array, or the attributes
//!   of a group or array, addressed by a file locator and a node path
//! - [`ZarrSlabReader`] implements it over any `zarrs` readable store
//!   (local filesystem or S3-compatible object storage)
//! - [`SlabWriter`] creates an output hierarchy and writes slabs into it
//!
//! Only the chunks that intersect the requested slab are fetched and
//! decompressed.

pub mod config;
pub mod error;
pub mod reader;
pub mod remote;
pub mod types;
pub mod writer;

pub use config::{Compression, WriterConfig};
pub use error::{Result, SlabStoreError};
pub use reader::{node_path, AttributeMap, SlabReader, ZarrSlabReader};
pub use remote::{create_object_storage, ObjectStoreConfig, ObjectStoreStorage, TokioBlockOn};
pub use types::{Slab, SlabRange, SlabValues};
pub use writer::SlabWriter;
