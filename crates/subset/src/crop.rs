//! The subsetting engine.
//!
//! A crop job:
//! 1. reads the latitude and longitude arrays in full
//! 2. computes the index window selected by the bounding box
//! 3. plans one slab read per selected data variable
//! 4. writes coordinates, data slabs and the attributes of every group on
//!    their paths into a new output hierarchy
//!
//! Output is removed again if anything fails once writing started.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use catalog::{
    group_ancestors, join_path, normalize_group_path, DatasetCatalog, DatasetRecord, FileRecord,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use slab_store::{Slab, SlabRange, SlabReader, SlabWriter};
use tracing::{debug, info, instrument, warn};

use crate::config::CropConfig;
use crate::error::{CropError, Result};
use crate::guard::{AbandonSignal, OutputGuard};
use crate::inference::{resolve_binding, CoordinateBinding, DataGroupPolicy};
use crate::job::{CropJob, CropOptions, CropPhase, CropReport};
use crate::mask::SelectionWindow;
use crate::naming::output_path;

/// One data variable to copy and the slab to read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCopy {
    pub dataset: DatasetRecord,
    pub range: SlabRange,
}

/// Data variables selected for a job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyPlan {
    pub copies: Vec<PlannedCopy>,
    pub skipped: Vec<String>,
}

impl CopyPlan {
    /// Select data variables of `datasets` for a job.
    ///
    /// Requested names are absolute paths or paths relative to the data group.
    /// Without a request, every dataset directly in the data group is a
    /// candidate. Missing or incompatible datasets are skipped.
    pub fn build(
        binding: &CoordinateBinding,
        datasets: &[DatasetRecord],
        window: &SelectionWindow,
        data_vars: Option<&[String]>,
    ) -> Self {
        let by_path: BTreeMap<String, &DatasetRecord> =
            datasets.iter().map(|d| (d.full_path(), d)).collect();

        let candidates: Vec<(String, Option<&DatasetRecord>)> = match data_vars {
            Some(vars) => {
                let mut seen = BTreeSet::new();
                vars.iter()
                    .map(|var| resolve_var_path(&binding.data_group, var))
                    .filter(|path| seen.insert(path.clone()))
                    .map(|path| {
                        let record = by_path.get(&path).copied();
                        (path, record)
                    })
                    .collect()
            }
            None => datasets
                .iter()
                .filter(|d| d.parent_path == binding.data_group)
                .map(|d| (d.full_path(), Some(d)))
                .collect(),
        };

        let mut plan = CopyPlan::default();
        for (path, record) in candidates {
            let Some(record) = record else {
                warn!(dataset = %path, "Requested dataset not in catalog, skipping");
                plan.skipped.push(path);
                continue;
            };
            if binding.is_coordinate(record) {
                continue;
            }
            match window.range_for_shape(&record.shape) {
                Some(range) => plan.copies.push(PlannedCopy {
                    dataset: record.clone(),
                    range,
                }),
                None => {
                    warn!(
                        dataset = %path,
                        shape = ?record.shape,
                        "Dataset shape incompatible with coordinates, skipping"
                    );
                    plan.skipped.push(path);
                }
            }
        }
        plan
    }
}

/// Absolute dataset path for a requested name.
fn resolve_var_path(data_group: &str, var: &str) -> String {
    if var.starts_with('/') {
        normalize_group_path(var)
    } else {
        join_path(data_group, var)
    }
}

/// Runs crop jobs against a catalog and a slab reader.
#[derive(Clone)]
pub struct Cropper {
    catalog: Arc<dyn DatasetCatalog>,
    reader: Arc<dyn SlabReader>,
    config: CropConfig,
}

impl Cropper {
    pub fn new(
        catalog: Arc<dyn DatasetCatalog>,
        reader: Arc<dyn SlabReader>,
        config: CropConfig,
    ) -> Self {
        Self {
            catalog,
            reader,
            config,
        }
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn DatasetCatalog> {
        &self.catalog
    }

    fn policy_for(&self, data_group: Option<&str>) -> DataGroupPolicy {
        match data_group {
            Some(group) => DataGroupPolicy::Explicit(group.to_string()),
            None => self.config.data_group_policy.clone(),
        }
    }

    /// Look up a file and infer its coordinate binding.
    pub async fn inspect(
        &self,
        file_name: &str,
        data_group: Option<&str>,
    ) -> Result<(FileRecord, CoordinateBinding)> {
        let file = self.catalog.lookup_file(file_name).await?;
        let (binding, _) =
            resolve_binding(self.catalog.as_ref(), &file, &self.policy_for(data_group)).await?;
        Ok((file, binding))
    }

    /// Resolve a request into a job.
    pub async fn prepare(&self, options: &CropOptions) -> Result<(CropJob, Vec<DatasetRecord>)> {
        let file = self.catalog.lookup_file(&options.file_name).await?;
        let policy = self.policy_for(options.data_group.as_deref());
        let (binding, datasets) = resolve_binding(self.catalog.as_ref(), &file, &policy).await?;

        let output_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| self.config.output_dir.clone());
        let output_path = absolute(output_path(
            &output_dir,
            &file.file_name,
            options.output_name.as_deref(),
            Utc::now(),
        ));

        let job = CropJob {
            file,
            binding,
            bbox: options.bbox,
            output_path,
            data_vars: options.data_vars.clone(),
        };
        Ok((job, datasets))
    }

    /// Resolve and run a crop request.
    #[instrument(skip(self, options), fields(file = %options.file_name, bbox = %options.bbox))]
    pub async fn crop_file(&self, options: &CropOptions) -> Result<CropReport> {
        let started = Instant::now();
        log_phase(CropPhase::Created, &options.file_name);

        let result = match self.prepare(options).await {
            Ok((job, datasets)) => self.run(&job, &datasets).await,
            Err(e) => Err(e),
        };
        finish(&options.file_name, started, result)
    }

    /// Run a job whose binding is already resolved.
    #[instrument(skip(self, job), fields(file = %job.file.file_name, bbox = %job.bbox))]
    pub async fn crop(&self, job: &CropJob) -> Result<CropReport> {
        let started = Instant::now();
        log_phase(CropPhase::Created, &job.file.file_name);

        let result = match self.catalog.list_datasets(job.file.file_id).await {
            Ok(datasets) => self.run(job, &datasets).await,
            Err(e) => Err(e.into()),
        };
        finish(&job.file.file_name, started, result)
    }

    async fn run(&self, job: &CropJob, datasets: &[DatasetRecord]) -> Result<CropReport> {
        let locator = job.file.storage_path.as_str();
        let binding = &job.binding;
        log_phase(CropPhase::CoordinatesResolved, &job.file.file_name);

        let lat_path = binding.lat_dataset.full_path();
        let lon_path = binding.lon_dataset.full_path();
        let lat_full = SlabRange::full(&binding.lat_dataset.shape);
        let lon_full = SlabRange::full(&binding.lon_dataset.shape);
        let (lat, lon) = futures::try_join!(
            self.reader.read_slab(locator, &lat_path, &lat_full),
            self.reader.read_slab(locator, &lon_path, &lon_full),
        )?;
        let mut elements_read = (lat.num_elements() + lon.num_elements()) as u64;

        let window = SelectionWindow::compute(&lat, &lon, &job.bbox)?;
        log_phase(CropPhase::RangeComputed, &job.file.file_name);
        info!(
            rows = ?window.rows,
            cols = ?window.cols,
            selected = window.selected_points,
            total = window.layout.total_points(),
            "Computed selection window"
        );

        let plan = CopyPlan::build(binding, datasets, &window, job.data_vars.as_deref());

        let (guard, writer) = self.create_output(&job.output_path)?;
        let signal = guard.signal();
        log_phase(CropPhase::Writing, &job.file.file_name);

        let mut groups: BTreeSet<String> = group_ancestors(&binding.coordinate_group)
            .into_iter()
            .collect();
        for copy in &plan.copies {
            groups.extend(group_ancestors(&copy.dataset.parent_path));
        }
        // Lexicographic order writes every parent before its children.
        for group in &groups {
            let attributes = self.reader.read_attributes(locator, group).await?;
            let group = group.clone();
            run_blocking(&writer, &signal, move |w| w.write_group(&group, attributes)).await?;
        }

        let (lat_range, lon_range) = window.coordinate_ranges();
        for (path, slab, range) in [(&lat_path, &lat, lat_range), (&lon_path, &lon, lon_range)] {
            let sub = slab.subslab(&range)?;
            copy_slab(self.reader.as_ref(), &writer, &signal, locator, path, sub).await?;
        }

        let mut copied = vec![lat_path.clone(), lon_path.clone()];

        // Build owned copy tasks, then run them with bounded concurrency
        let cancelled = Arc::new(AtomicBool::new(false));
        let tasks: Vec<_> = plan
            .copies
            .iter()
            .cloned()
            .map(|copy| {
                let reader = self.reader.clone();
                let writer = writer.clone();
                let signal = signal.clone();
                let cancelled = cancelled.clone();
                let locator = locator.to_string();
                async move {
                    // Stop starting new copies once one failed; in-flight ones finish.
                    if cancelled.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                    let path = copy.dataset.full_path();
                    let result = copy_range(
                        reader.as_ref(),
                        &writer,
                        &signal,
                        &locator,
                        &path,
                        &copy.range,
                    )
                    .await;
                    match result {
                        Ok(elements) => Ok(Some((path, elements))),
                        Err(e) => {
                            cancelled.store(true, Ordering::SeqCst);
                            Err(e)
                        }
                    }
                }
            })
            .collect();

        let results: Vec<Result<Option<(String, u64)>>> = stream::iter(tasks)
            .buffer_unordered(self.config.max_concurrent_reads.max(1))
            .collect()
            .await;

        let mut data_copied = Vec::with_capacity(results.len());
        for result in results {
            if let Some((path, elements)) = result? {
                data_copied.push(path);
                elements_read += elements;
            }
        }
        data_copied.sort();
        copied.extend(data_copied);

        counter!("crop_slab_elements_read_total").increment(elements_read);

        let output_path = guard.disarm();
        log_phase(CropPhase::Completed, &job.file.file_name);

        Ok(CropReport {
            output_path,
            copied,
            skipped: plan.skipped,
            selected_points: window.selected_points,
            total_points: window.layout.total_points(),
            elements_read,
        })
    }

    /// Create the output hierarchy and arm its cleanup guard.
    fn create_output(&self, path: &Path) -> Result<(OutputGuard, SlabWriter)> {
        if path.exists() {
            return Err(CropError::output_write(format!(
                "output {} already exists",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CropError::output_write(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let writer = SlabWriter::create(path, self.config.writer_config())?;
        Ok((OutputGuard::new(path), writer))
    }
}

/// Read one slab of a source dataset and copy it into the output.
///
/// Returns the number of elements read.
async fn copy_range(
    reader: &dyn SlabReader,
    writer: &SlabWriter,
    signal: &AbandonSignal,
    locator: &str,
    path: &str,
    range: &SlabRange,
) -> Result<u64> {
    let slab = reader.read_slab(locator, path, range).await?;
    let elements = slab.num_elements() as u64;
    copy_slab(reader, writer, signal, locator, path, slab).await?;
    Ok(elements)
}

/// Write one slab into the output with the source dataset's attributes.
async fn copy_slab(
    reader: &dyn SlabReader,
    writer: &SlabWriter,
    signal: &AbandonSignal,
    locator: &str,
    path: &str,
    slab: Slab,
) -> Result<()> {
    let attributes = reader.read_attributes(locator, path).await?;
    debug!(dataset = %path, shape = ?slab.shape, "Copying slab");

    let path = path.to_string();
    run_blocking(writer, signal, move |w| w.write_array(&path, &slab, attributes)).await
}

/// Run a write on the blocking pool unless the job was abandoned.
async fn run_blocking<F>(writer: &SlabWriter, signal: &AbandonSignal, write: F) -> Result<()>
where
    F: FnOnce(&SlabWriter) -> slab_store::Result<()> + Send + 'static,
{
    let writer = writer.clone();
    let signal = signal.clone();
    tokio::task::spawn_blocking(move || {
        if signal.is_abandoned() {
            return Err(CropError::output_write("job abandoned"));
        }
        let result = write(&writer);
        signal.sweep();
        result.map_err(CropError::from)
    })
    .await
    .map_err(|e| CropError::output_write(format!("write task failed: {}", e)))?
}

fn log_phase(phase: CropPhase, file_name: &str) {
    info!(phase = %phase, file = %file_name, "Crop phase");
}

/// Record metrics and the terminal phase of a job.
fn finish(file_name: &str, started: Instant, result: Result<CropReport>) -> Result<CropReport> {
    let elapsed = started.elapsed().as_secs_f64();
    histogram!("crop_job_duration_seconds").record(elapsed);

    match &result {
        Ok(report) => {
            counter!("crop_jobs_total", "outcome" => "completed").increment(1);
            info!(
                file = %file_name,
                output = %report.output_path.display(),
                copied = report.copied.len(),
                skipped = report.skipped.len(),
                elapsed_secs = elapsed,
                "Crop completed"
            );
        }
        Err(e) => {
            counter!("crop_jobs_total", "outcome" => e.kind()).increment(1);
            warn!(
                phase = %CropPhase::Failed,
                file = %file_name,
                kind = e.kind(),
                error = %e,
                "Crop failed"
            );
        }
    }
    result
}

/// Make a path absolute against the working directory.
fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;
    use crate::inference::infer_binding;
    use slab_store::SlabValues;

    fn ds(group: &str, name: &str, shape: Vec<u64>) -> DatasetRecord {
        DatasetRecord::new(1, group, name, shape, "float32")
    }

    fn swath_datasets() -> Vec<DatasetRecord> {
        vec![
            ds("/FS", "Latitude", vec![10, 4]),
            ds("/FS", "Longitude", vec![10, 4]),
            ds("/FS", "flags", vec![10, 4, 3]),
            ds("/FS", "scanTime", vec![10]),
            ds("/FS/SLV", "precipRate", vec![10, 4, 5]),
        ]
    }

    fn window() -> SelectionWindow {
        let lat: Vec<f64> = (0..40).map(|i| (i / 4) as f64).collect();
        let lon: Vec<f64> = (0..40).map(|i| (i % 4) as f64).collect();
        let lat = Slab::new(vec![10, 4], SlabValues::F64(lat)).unwrap();
        let lon = Slab::new(vec![10, 4], SlabValues::F64(lon)).unwrap();
        let bbox = BoundingBox::new(2.0, 5.0, 1.0, 2.0).unwrap();
        SelectionWindow::compute(&lat, &lon, &bbox).unwrap()
    }

    fn binding(datasets: &[DatasetRecord], policy: DataGroupPolicy) -> CoordinateBinding {
        infer_binding(1, datasets, &policy).unwrap()
    }

    #[test]
    fn test_default_plan_uses_data_group_and_skips_incompatible() {
        let datasets = swath_datasets();
        let binding = binding(&datasets, DataGroupPolicy::SameAsCoordinates);
        let plan = CopyPlan::build(&binding, &datasets, &window(), None);

        let copied: Vec<String> = plan.copies.iter().map(|c| c.dataset.full_path()).collect();
        assert_eq!(copied, vec!["/FS/flags"]);
        assert_eq!(plan.skipped, vec!["/FS/scanTime"]);
        assert_eq!(plan.copies[0].range.start, vec![2, 1, 0]);
        assert_eq!(plan.copies[0].range.shape, vec![4, 2, 3]);
    }

    #[test]
    fn test_requested_vars_absolute_and_relative() {
        let datasets = swath_datasets();
        let binding = binding(&datasets, DataGroupPolicy::SameAsCoordinates);
        let vars = vec![
            "SLV/precipRate".to_string(),
            "/FS/flags".to_string(),
            "missing".to_string(),
            "/FS/SLV/precipRate".to_string(),
        ];
        let plan = CopyPlan::build(&binding, &datasets, &window(), Some(&vars));

        let copied: Vec<String> = plan.copies.iter().map(|c| c.dataset.full_path()).collect();
        assert_eq!(copied, vec!["/FS/SLV/precipRate", "/FS/flags"]);
        assert_eq!(plan.skipped, vec!["/FS/missing"]);
    }

    #[test]
    fn test_requested_coordinates_not_duplicated() {
        let datasets = swath_datasets();
        let binding = binding(&datasets, DataGroupPolicy::SameAsCoordinates);
        let vars = vec!["Latitude".to_string()];
        let plan = CopyPlan::build(&binding, &datasets, &window(), Some(&vars));
        assert!(plan.copies.is_empty());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_explicit_data_group() {
        let datasets = swath_datasets();
        let binding = binding(&datasets, DataGroupPolicy::Explicit("/FS/SLV".to_string()));
        let plan = CopyPlan::build(&binding, &datasets, &window(), None);

        let copied: Vec<String> = plan.copies.iter().map(|c| c.dataset.full_path()).collect();
        assert_eq!(copied, vec!["/FS/SLV/precipRate"]);
    }

    #[test]
    fn test_resolve_var_path() {
        assert_eq!(resolve_var_path("/FS", "precipRate"), "/FS/precipRate");
        assert_eq!(resolve_var_path("/FS", "SLV/precipRate"), "/FS/SLV/precipRate");
        assert_eq!(resolve_var_path("/FS", "/NS/x/"), "/NS/x");
        assert_eq!(resolve_var_path("/", "x"), "/x");
    }
}
