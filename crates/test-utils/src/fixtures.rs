//! On-disk file fixtures.
//!
//! A [`FileFixture`] describes a small hierarchical file (groups, arrays and
//! their attributes), writes it as a Zarr hierarchy under a storage root, and
//! registers matching records in a [`MemoryCatalog`].

use std::collections::BTreeMap;
use std::path::Path;

use catalog::{
    group_ancestors, normalize_group_path, CatalogResult, DatasetRecord, FileRecord,
    MemoryCatalog,
};
use serde_json::{json, Value};
use slab_store::{AttributeMap, Compression, Slab, SlabValues, SlabWriter, WriterConfig};

use crate::generators::{axis_centers, index_cube, swath_latitudes, swath_longitudes};

/// Shape of the swath fixture's coordinate arrays.
pub const SWATH_SHAPE: [u64; 2] = [100, 50];

/// Scan rows of the swath fixture inside [`swath_bbox`].
pub const SWATH_ROWS_IN_BBOX: std::ops::RangeInclusive<u64> = 30..=45;

/// Bounding box `(lat_min, lat_max, lon_min, lon_max)` used with the swath fixture.
pub fn swath_bbox() -> (f64, f64, f64, f64) {
    (10.0, 20.0, 150.0, 160.0)
}

#[derive(Debug, Clone)]
struct FixtureArray {
    path: String,
    slab: Slab,
    attributes: AttributeMap,
}

/// Builder for a test file.
#[derive(Debug, Clone)]
pub struct FileFixture {
    file_name: String,
    locator: String,
    groups: BTreeMap<String, AttributeMap>,
    arrays: Vec<FixtureArray>,
    writer: WriterConfig,
}

impl FileFixture {
    /// A new, empty file stored under its own name.
    pub fn new(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            locator: file_name.clone(),
            file_name,
            groups: BTreeMap::new(),
            arrays: Vec::new(),
            writer: WriterConfig {
                chunk_size: 16,
                compression: Compression::None,
                ..WriterConfig::default()
            },
        }
    }

    /// Store the file under a different locator than its name.
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = locator.into();
        self
    }

    pub fn with_writer_config(mut self, config: WriterConfig) -> Self {
        self.writer = config;
        self
    }

    /// Attributes of a group. Groups on array paths are created without
    /// attributes unless listed here.
    pub fn group(mut self, path: &str, attributes: Value) -> Self {
        self.groups
            .insert(normalize_group_path(path), to_attributes(attributes));
        self
    }

    /// Add an `f32` array.
    pub fn array(self, path: &str, shape: Vec<u64>, values: Vec<f32>) -> Self {
        self.typed_array(path, shape, SlabValues::F32(values), json!({}))
    }

    /// Add an array of any element type with attributes.
    ///
    /// # Panics
    /// If `values` does not match `shape`.
    pub fn typed_array(
        mut self,
        path: &str,
        shape: Vec<u64>,
        values: SlabValues,
        attributes: Value,
    ) -> Self {
        let slab = Slab::new(shape, values).expect("fixture values must match shape");
        self.arrays.push(FixtureArray {
            path: normalize_group_path(path),
            slab,
            attributes: to_attributes(attributes),
        });
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Write the hierarchy under `root`.
    pub fn write(&self, root: &Path) -> slab_store::Result<()> {
        let writer = SlabWriter::create(root.join(&self.locator), self.writer.clone())?;

        let mut groups = self.groups.clone();
        for array in &self.arrays {
            let (parent, _) = split_path(&array.path);
            for ancestor in group_ancestors(&parent) {
                groups.entry(ancestor).or_default();
            }
        }
        for (path, attributes) in groups {
            writer.write_group(&path, attributes)?;
        }

        for array in &self.arrays {
            writer.write_array(&array.path, &array.slab, array.attributes.clone())?;
        }
        Ok(())
    }

    /// Catalog records for this file.
    pub fn records(&self, file_id: i64) -> (FileRecord, Vec<DatasetRecord>) {
        let file = FileRecord {
            file_id,
            file_name: self.file_name.clone(),
            storage_path: self.locator.clone(),
        };
        let datasets = self
            .arrays
            .iter()
            .map(|array| {
                let (parent, name) = split_path(&array.path);
                DatasetRecord::new(
                    file_id,
                    &parent,
                    name,
                    array.slab.shape.clone(),
                    array.slab.values.dtype(),
                )
            })
            .collect();
        (file, datasets)
    }

    /// Register this file and its datasets in `catalog`.
    pub async fn register(&self, catalog: &MemoryCatalog, file_id: i64) -> CatalogResult<()> {
        let (file, datasets) = self.records(file_id);
        catalog.insert_file(file).await;
        for dataset in datasets {
            catalog.insert_dataset(dataset).await?;
        }
        Ok(())
    }

    /// Write under `root` and register as `file_id`.
    ///
    /// # Panics
    /// If writing or registration fails.
    pub async fn install(&self, root: &Path, catalog: &MemoryCatalog, file_id: i64) {
        self.write(root).expect("write fixture");
        self.register(catalog, file_id)
            .await
            .expect("register fixture");
    }
}

/// Satellite swath file `swath.h5`.
///
/// - `/FS/Latitude`, `/FS/Longitude`: `(100, 50)` from the swath generators
/// - `/FS/SLV/precipRate`: `(100, 50, 5)` holding its flat index
/// - `/FS/scanTime`: `(100,)`, incompatible with the coordinates
/// - `/FS/flags`: `(100, 50)` of `u8`
/// - attributes on `/`, `/FS`, `/FS/SLV` and on `precipRate`
pub fn swath_fixture() -> FileFixture {
    let [rows, cols] = SWATH_SHAPE;
    let data_shape = vec![rows, cols, 5];
    let flags: Vec<u8> = (0..rows * cols).map(|i| (i % 7) as u8).collect();

    FileFixture::new("swath.h5")
        .group("/", json!({ "FileHeader": "AlgorithmID=2A;", "granule": 42 }))
        .group("/FS", json!({ "SwathHeader": "NumberScansGranule=100;" }))
        .group("/FS/SLV", json!({ "level": "surface" }))
        .typed_array(
            "/FS/Latitude",
            SWATH_SHAPE.to_vec(),
            SlabValues::F32(swath_latitudes(rows as usize, cols as usize)),
            json!({ "units": "degrees_north" }),
        )
        .typed_array(
            "/FS/Longitude",
            SWATH_SHAPE.to_vec(),
            SlabValues::F32(swath_longitudes(rows as usize, cols as usize)),
            json!({ "units": "degrees_east" }),
        )
        .typed_array(
            "/FS/SLV/precipRate",
            data_shape.clone(),
            SlabValues::F32(index_cube(&data_shape)),
            json!({ "units": "mm/hr", "_FillValue": -9999.9 }),
        )
        .typed_array(
            "/FS/scanTime",
            vec![rows],
            SlabValues::F64((0..rows).map(|i| i as f64 * 1.5).collect()),
            json!({}),
        )
        .typed_array(
            "/FS/flags",
            SWATH_SHAPE.to_vec(),
            SlabValues::U8(flags),
            json!({}),
        )
}

/// Gridded file `grid.nc` with 1-D axes at the root.
///
/// - `/lat`: 36 cell centres from -87.5 to 87.5
/// - `/lon`: 72 cell centres from -177.5 to 177.5
/// - `/sst`: `(2, 36, 72)` holding its flat index
/// - `/mask`: `(36, 72)` of `i16`
pub fn gridded_fixture() -> FileFixture {
    let lat = axis_centers(-90.0, 5.0, 36);
    let lon = axis_centers(-180.0, 5.0, 72);
    let sst_shape = vec![2, 36, 72];

    FileFixture::new("grid.nc")
        .group("/", json!({ "Conventions": "CF-1.8" }))
        .typed_array(
            "/lat",
            vec![36],
            SlabValues::F64(lat),
            json!({ "units": "degrees_north" }),
        )
        .typed_array(
            "/lon",
            vec![72],
            SlabValues::F64(lon),
            json!({ "units": "degrees_east" }),
        )
        .typed_array(
            "/sst",
            sst_shape.clone(),
            SlabValues::F32(index_cube(&sst_shape)),
            json!({ "units": "K" }),
        )
        .typed_array(
            "/mask",
            vec![36, 72],
            SlabValues::I16((0..36 * 72).map(|i| (i % 3) as i16).collect()),
            json!({}),
        )
}

fn to_attributes(value: Value) -> AttributeMap {
    match value {
        Value::Object(map) => map,
        _ => AttributeMap::new(),
    }
}

/// Split `/a/b/c` into `("/a/b", "c")`.
fn split_path(path: &str) -> (String, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (normalize_group_path(parent), name),
        None => ("/".to_string(), path),
    }
}
