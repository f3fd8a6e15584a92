//! End-to-end crop tests over Zarr fixtures on the local filesystem.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use slab_store::{Compression, SlabRange, SlabReader, ZarrSlabReader};
use subset::{BoundingBox, CropConfig, CropError, CropOptions, Cropper};
use test_utils::{
    flat_index, gridded_fixture, swath_bbox, swath_fixture, CountingSlabReader,
    FailingSlabReader, FixtureStore,
};

fn config(store: &FixtureStore) -> CropConfig {
    CropConfig {
        output_dir: store.output_dir(),
        output_chunk_size: 8,
        compression: Compression::None,
        ..CropConfig::default()
    }
}

fn cropper(store: &FixtureStore, reader: Arc<dyn SlabReader>) -> Cropper {
    Cropper::new(store.catalog.clone(), reader, config(store))
}

fn swath_box() -> BoundingBox {
    let (lat_min, lat_max, lon_min, lon_max) = swath_bbox();
    BoundingBox::new(lat_min, lat_max, lon_min, lon_max).unwrap()
}

/// Shape recorded in an output array's metadata.
fn stored_shape(output: &Path, dataset: &str) -> Vec<u64> {
    let metadata = output
        .join(dataset.trim_start_matches('/'))
        .join("zarr.json");
    let text = std::fs::read_to_string(&metadata)
        .unwrap_or_else(|e| panic!("missing {}: {}", metadata.display(), e));
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    serde_json::from_value(json["shape"].clone()).unwrap()
}

/// Reader over the directory holding an output, plus the output's locator.
fn open_output(path: &Path) -> (Arc<dyn SlabReader>, String) {
    let parent = path.parent().unwrap();
    let locator = path.file_name().unwrap().to_string_lossy().into_owned();
    let reader: Arc<dyn SlabReader> = Arc::new(ZarrSlabReader::filesystem(parent).unwrap());
    (reader, locator)
}

fn output_is_empty(dir: &Path) -> bool {
    !dir.exists() || std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_swath_crop_keeps_only_selected_scans() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let options = CropOptions::new("swath.h5", swath_box()).with_data_group("/FS/SLV");
    let report = cropper.crop_file(&options).await.unwrap();

    assert!(report.output_path.is_absolute());
    assert_eq!(
        report.copied,
        vec!["/FS/Latitude", "/FS/Longitude", "/FS/SLV/precipRate"]
    );
    assert!(report.skipped.is_empty());
    assert_eq!(report.selected_points, 16 * 50);
    assert_eq!(report.total_points, 100 * 50);

    let out = &report.output_path;
    assert_eq!(stored_shape(out, "/FS/Latitude"), vec![16, 50]);
    assert_eq!(stored_shape(out, "/FS/Longitude"), vec![16, 50]);
    assert_eq!(stored_shape(out, "/FS/SLV/precipRate"), vec![16, 50, 5]);

    let (reader, locator) = open_output(out);
    let lat = reader
        .read_slab(&locator, "/FS/Latitude", &SlabRange::full(&[16, 50]))
        .await
        .unwrap()
        .values
        .to_f64();
    assert_eq!(lat[0], 10.0);
    assert_eq!(lat[15 * 50], 20.0);

    let precip = reader
        .read_slab(&locator, "/FS/SLV/precipRate", &SlabRange::full(&[16, 50, 5]))
        .await
        .unwrap()
        .values
        .to_f64();
    let source_shape = [100, 50, 5];
    assert_eq!(precip[0], flat_index(&source_shape, &[30, 0, 0]) as f64);
    assert_eq!(
        precip[precip.len() - 1],
        flat_index(&source_shape, &[45, 49, 4]) as f64
    );
}

#[tokio::test]
async fn test_output_name_is_timestamped_copy_of_input() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let report = cropper
        .crop_file(&CropOptions::new("swath.h5", swath_box()))
        .await
        .unwrap();

    let name = report
        .output_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(name.starts_with("swath_cropped_"), "{}", name);
    assert!(name.ends_with(".h5"), "{}", name);
    // swath_cropped_ + YYYYMMDDHHMMSS + .h5
    assert_eq!(name.len(), "swath_cropped_".len() + 14 + 3);
    assert_eq!(report.output_path.parent().unwrap(), store.output_dir());
}

#[tokio::test]
async fn test_default_data_group_skips_incompatible_datasets() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let options = CropOptions::new("swath.h5", swath_box()).with_output_name("default.h5");
    let report = cropper.crop_file(&options).await.unwrap();

    assert_eq!(
        report.copied,
        vec!["/FS/Latitude", "/FS/Longitude", "/FS/flags"]
    );
    assert_eq!(report.skipped, vec!["/FS/scanTime"]);
    assert_eq!(stored_shape(&report.output_path, "/FS/flags"), vec![16, 50]);
    assert!(!report.output_path.join("FS").join("scanTime").exists());

    let (reader, locator) = open_output(&report.output_path);
    let flags = reader
        .read_slab(&locator, "/FS/flags", &SlabRange::full(&[16, 50]))
        .await
        .unwrap();
    assert_eq!(flags.values.dtype(), "uint8");
    assert_eq!(flags.values.to_f64()[0], ((30 * 50) % 7) as f64);
}

#[tokio::test]
async fn test_full_coverage_reproduces_source() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let bbox = BoundingBox::new(-90.0, 90.0, -180.0, 180.0).unwrap();
    let options = CropOptions::new("swath.h5", bbox)
        .with_data_group("/FS/SLV")
        .with_output_name("whole.h5");
    let report = cropper.crop_file(&options).await.unwrap();

    assert_eq!(report.selected_points, report.total_points);
    assert_eq!(
        stored_shape(&report.output_path, "/FS/SLV/precipRate"),
        vec![100, 50, 5]
    );

    let (reader, locator) = open_output(&report.output_path);
    for (dataset, shape) in [
        ("/FS/Latitude", vec![100, 50]),
        ("/FS/Longitude", vec![100, 50]),
        ("/FS/SLV/precipRate", vec![100, 50, 5]),
    ] {
        let full = SlabRange::full(&shape);
        let source = store
            .reader()
            .read_slab("swath.h5", dataset, &full)
            .await
            .unwrap();
        let copy = reader.read_slab(&locator, dataset, &full).await.unwrap();
        assert_eq!(source, copy, "{}", dataset);
    }
}

#[tokio::test]
async fn test_prepared_job_runs_with_resolved_binding() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let options = CropOptions::new("swath.h5", swath_box())
        .with_data_group("/FS/SLV")
        .with_output_name("prepared.h5");
    let (job, datasets) = cropper.prepare(&options).await.unwrap();
    assert_eq!(job.binding.data_group, "/FS/SLV");
    assert_eq!(job.output_path, store.output_dir().join("prepared.h5"));
    assert!(datasets.iter().any(|d| d.full_path() == "/FS/SLV/precipRate"));
    assert!(!job.output_path.exists());

    let report = cropper.crop(&job).await.unwrap();
    assert_eq!(
        report.copied,
        vec!["/FS/Latitude", "/FS/Longitude", "/FS/SLV/precipRate"]
    );
    assert_eq!(report.output_path, job.output_path);
    assert_eq!(stored_shape(&report.output_path, "/FS/SLV/precipRate"), vec![16, 50, 5]);
}

#[tokio::test]
async fn test_empty_intersection_writes_nothing() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let bbox = BoundingBox::new(-60.0, -50.0, 150.0, 160.0).unwrap();
    let err = cropper
        .crop_file(&CropOptions::new("swath.h5", bbox))
        .await
        .unwrap_err();

    assert!(matches!(err, CropError::EmptyIntersection(_)), "{:?}", err);
    assert!(output_is_empty(&store.output_dir()));
}

#[tokio::test]
async fn test_reads_only_the_selected_window() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let counting = Arc::new(CountingSlabReader::new(store.reader()));
    let cropper = cropper(&store, counting.clone());

    let options = CropOptions::new("swath.h5", swath_box())
        .with_data_group("/FS/SLV")
        .with_output_name("minimal.h5");
    let report = cropper.crop_file(&options).await.unwrap();

    assert_eq!(
        counting.reads_of("/FS/SLV/precipRate"),
        vec![SlabRange::new(vec![30, 0, 0], vec![16, 50, 5])]
    );
    assert_eq!(
        counting.reads_of("/FS/Latitude"),
        vec![SlabRange::full(&[100, 50])]
    );
    assert_eq!(counting.reads_of("/FS/Longitude").len(), 1);
    assert_eq!(counting.elements_read(), 2 * 5000 + 16 * 50 * 5);
    assert_eq!(report.elements_read, counting.elements_read());
}

#[tokio::test]
async fn test_failed_read_removes_partial_output() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let failing = Arc::new(FailingSlabReader::new(store.reader(), "/FS/SLV/precipRate"));
    let cropper = cropper(&store, failing);

    let options = CropOptions::new("swath.h5", swath_box())
        .with_data_vars(["/FS/flags", "SLV/precipRate"])
        .with_output_name("failed.h5");
    let err = cropper.crop_file(&options).await.unwrap_err();

    assert_eq!(err.kind(), "SlabReadError");
    assert!(!store.output_dir().join("failed.h5").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_after_output_created_removes_output() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let stalled = FailingSlabReader::new(store.reader(), "/FS/SLV/precipRate")
        .with_delay(Duration::from_secs(10));
    let cropper = cropper(&store, Arc::new(stalled));

    let options = CropOptions::new("swath.h5", swath_box())
        .with_data_group("/FS/SLV")
        .with_output_name("stalled.h5");
    let job = tokio::spawn(async move {
        tokio::time::timeout(Duration::from_secs(2), cropper.crop_file(&options)).await
    });

    let out = store.output_dir().join("stalled.h5");
    let mut created = false;
    for _ in 0..150 {
        if out.join("FS").join("Latitude").exists() {
            created = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(created, "output was never written");

    assert!(job.await.unwrap().is_err());
    assert!(!out.exists());
}

#[tokio::test]
async fn test_invalid_compression_is_output_write_error() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let config = CropConfig {
        compression: Compression::BloscZstd,
        compression_level: 12,
        ..config(&store)
    };
    let cropper = Cropper::new(store.catalog.clone(), store.reader(), config);

    let options = CropOptions::new("swath.h5", swath_box()).with_output_name("bad_codec.h5");
    let err = cropper.crop_file(&options).await.unwrap_err();

    assert_eq!(err.kind(), "OutputWriteError");
    assert!(!store.output_dir().join("bad_codec.h5").exists());
}

#[tokio::test]
async fn test_attributes_are_copied() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let options = CropOptions::new("swath.h5", swath_box())
        .with_data_group("/FS/SLV")
        .with_output_name("attrs.h5");
    let report = cropper.crop_file(&options).await.unwrap();
    let (reader, locator) = open_output(&report.output_path);

    let root = reader.read_attributes(&locator, "/").await.unwrap();
    assert_eq!(root["FileHeader"], "AlgorithmID=2A;");
    assert_eq!(root["granule"], 42);

    let fs = reader.read_attributes(&locator, "/FS").await.unwrap();
    assert_eq!(fs["SwathHeader"], "NumberScansGranule=100;");

    let slv = reader.read_attributes(&locator, "/FS/SLV").await.unwrap();
    assert_eq!(slv["level"], "surface");

    let precip = reader
        .read_attributes(&locator, "/FS/SLV/precipRate")
        .await
        .unwrap();
    assert_eq!(precip["units"], "mm/hr");

    let lat = reader.read_attributes(&locator, "/FS/Latitude").await.unwrap();
    assert_eq!(lat["units"], "degrees_north");
}

#[tokio::test]
async fn test_requested_vars_relative_to_data_group() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let options = CropOptions::new("swath.h5", swath_box())
        .with_data_vars(["SLV/precipRate", "missing", "Latitude"])
        .with_output_name("vars.h5");
    let report = cropper.crop_file(&options).await.unwrap();

    assert_eq!(
        report.copied,
        vec!["/FS/Latitude", "/FS/Longitude", "/FS/SLV/precipRate"]
    );
    assert_eq!(report.skipped, vec!["/FS/missing"]);
    assert!(!report.output_path.join("FS").join("flags").exists());
}

#[tokio::test]
async fn test_gridded_crop() {
    let store = FixtureStore::new();
    store.install(&gridded_fixture(), 3).await;
    let cropper = cropper(&store, store.reader());

    let bbox = BoundingBox::new(0.0, 20.0, -10.0, 10.0).unwrap();
    let report = cropper
        .crop_file(&CropOptions::new("grid.nc", bbox).with_output_name("grid_box.nc"))
        .await
        .unwrap();

    assert_eq!(report.copied, vec!["/lat", "/lon", "/mask", "/sst"]);
    assert_eq!(report.selected_points, 16);
    assert_eq!(report.total_points, 36 * 72);

    let out = &report.output_path;
    assert_eq!(stored_shape(out, "/lat"), vec![4]);
    assert_eq!(stored_shape(out, "/lon"), vec![4]);
    assert_eq!(stored_shape(out, "/sst"), vec![2, 4, 4]);
    assert_eq!(stored_shape(out, "/mask"), vec![4, 4]);

    let (reader, locator) = open_output(out);
    let lat = reader
        .read_slab(&locator, "/lat", &SlabRange::full(&[4]))
        .await
        .unwrap()
        .values
        .to_f64();
    assert_eq!(lat, vec![2.5, 7.5, 12.5, 17.5]);

    let sst = reader
        .read_slab(&locator, "/sst", &SlabRange::full(&[2, 4, 4]))
        .await
        .unwrap()
        .values
        .to_f64();
    assert_eq!(sst[0], flat_index(&[2, 36, 72], &[0, 18, 34]) as f64);
    assert_eq!(sst[16], flat_index(&[2, 36, 72], &[1, 18, 34]) as f64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_jobs_are_independent() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    store.install(&gridded_fixture(), 2).await;
    let cropper = cropper(&store, store.reader());

    let swath = CropOptions::new("swath.h5", swath_box())
        .with_data_group("/FS/SLV")
        .with_output_name("a.h5");
    let grid = CropOptions::new("grid.nc", BoundingBox::new(0.0, 20.0, -10.0, 10.0).unwrap())
        .with_output_name("b.nc");
    let swath_again = CropOptions::new("swath.h5", swath_box())
        .with_data_group("/FS/SLV")
        .with_output_name("c.h5");

    let (a, b, c) = tokio::join!(
        cropper.crop_file(&swath),
        cropper.crop_file(&grid),
        cropper.crop_file(&swath_again),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_ne!(a.output_path, c.output_path);
    assert_eq!(stored_shape(&a.output_path, "/FS/SLV/precipRate"), vec![16, 50, 5]);
    assert_eq!(stored_shape(&c.output_path, "/FS/SLV/precipRate"), vec![16, 50, 5]);
    assert_eq!(stored_shape(&b.output_path, "/sst"), vec![2, 4, 4]);
}

#[tokio::test]
async fn test_unknown_file() {
    let store = FixtureStore::new();
    let cropper = cropper(&store, store.reader());

    let err = cropper
        .crop_file(&CropOptions::new("nope.h5", swath_box()))
        .await
        .unwrap_err();
    assert!(matches!(err, CropError::FileNotFound(ref name) if name == "nope.h5"));
    assert!(output_is_empty(&store.output_dir()));
}

#[tokio::test]
async fn test_existing_output_is_not_replaced() {
    let store = FixtureStore::new();
    store.install(&swath_fixture(), 1).await;
    let cropper = cropper(&store, store.reader());

    let existing = store.output_dir().join("taken.h5");
    std::fs::create_dir_all(&existing).unwrap();
    std::fs::write(existing.join("keep.txt"), "mine").unwrap();

    let options = CropOptions::new("swath.h5", swath_box()).with_output_name("taken.h5");
    let err = cropper.crop_file(&options).await.unwrap_err();

    assert_eq!(err.kind(), "OutputWriteError");
    assert_eq!(
        std::fs::read_to_string(existing.join("keep.txt")).unwrap(),
        "mine"
    );
}

#[tokio::test]
async fn test_nested_locator() {
    let store = FixtureStore::new();
    let fixture = swath_fixture().with_locator("gpm/2024/swath_granule.zarr");
    store.install(&fixture, 9).await;
    let cropper = cropper(&store, store.reader());

    let (file, binding) = cropper.inspect("swath.h5", None).await.unwrap();
    assert_eq!(file.storage_path, "gpm/2024/swath_granule.zarr");
    assert_eq!(binding.lat_dataset.full_path(), "/FS/Latitude");
    assert_eq!(binding.data_group, "/FS");

    let options = CropOptions::new("swath.h5", swath_box())
        .with_data_group("/FS/SLV")
        .with_output_name("nested.h5");
    let report = cropper.crop_file(&options).await.unwrap();
    assert_eq!(stored_shape(&report.output_path, "/FS/SLV/precipRate"), vec![16, 50, 5]);
}
