//! A temporary storage root with a catalog and reader over it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use catalog::MemoryCatalog;
use slab_store::{SlabReader, ZarrSlabReader};
use tempfile::TempDir;

use crate::fixtures::FileFixture;

/// Storage root, output directory and catalog for one test.
///
/// Everything lives in a temporary directory removed on drop.
pub struct FixtureStore {
    dir: TempDir,
    pub catalog: Arc<MemoryCatalog>,
}

impl FixtureStore {
    /// # Panics
    /// If the temporary directory cannot be created.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("data")).expect("create data dir");
        Self {
            dir,
            catalog: Arc::new(MemoryCatalog::new()),
        }
    }

    /// Root the reader resolves locators against.
    pub fn data_root(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Directory for crop outputs; not created up front.
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A filesystem reader over [`FixtureStore::data_root`].
    ///
    /// # Panics
    /// If the store cannot be opened.
    pub fn reader(&self) -> Arc<dyn SlabReader> {
        Arc::new(ZarrSlabReader::filesystem(self.data_root()).expect("open fixture store"))
    }

    /// Write `fixture` and register it as `file_id`.
    pub async fn install(&self, fixture: &FileFixture, file_id: i64) {
        fixture
            .install(&self.data_root(), &self.catalog, file_id)
            .await;
    }
}

impl Default for FixtureStore {
    fn default() -> Self {
        Self::new()
    }
}
