//! Slab reader trait and implementations.

mod zarr;

pub use zarr::ZarrSlabReader;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Slab, SlabRange};

/// JSON attributes of a group or array.
pub type AttributeMap = serde_json::Map<String, serde_json::Value>;

/// Trait for selective reads from a chunked array file.
///
/// A file is addressed by its catalog locator; nodes inside it by an absolute
/// path such as `/FS/SLV/precipRate`.
#[async_trait]
pub trait SlabReader: Send + Sync {
    /// Read one rectangular slab of an array.
    ///
    /// Only the chunks intersecting `range` are fetched.
    ///
    /// # Arguments
    /// * `locator` - Storage locator of the file (catalog `storage_path`)
    /// * `dataset_path` - Absolute path of the array inside the file
    /// * `range` - Per-axis start and extent; must lie inside the array
    async fn read_slab(&self, locator: &str, dataset_path: &str, range: &SlabRange)
        -> Result<Slab>;

    /// Read the attributes of a group or array.
    ///
    /// A node without explicit metadata yields an empty map.
    async fn read_attributes(&self, locator: &str, node_path: &str) -> Result<AttributeMap>;
}

/// Store-level node path for a node inside a file.
///
/// `node_path("swath.h5", "/FS/Latitude")` is `/swath.h5/FS/Latitude`.
pub fn node_path(locator: &str, path: &str) -> String {
    let locator = locator.trim_matches('/');
    let path = path.trim_matches('/');
    match (locator.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", path),
        (false, true) => format!("/{}", locator),
        (false, false) => format!("/{}/{}", locator, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_path() {
        assert_eq!(node_path("swath.h5", "/FS/Latitude"), "/swath.h5/FS/Latitude");
        assert_eq!(node_path("/gpm/swath.h5/", "FS"), "/gpm/swath.h5/FS");
        assert_eq!(node_path("swath.h5", "/"), "/swath.h5");
        assert_eq!(node_path("", "/lat"), "/lat");
        assert_eq!(node_path("", "/"), "/");
    }
}
