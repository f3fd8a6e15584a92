//! Crop job description, phases and result.

use std::path::PathBuf;

use catalog::FileRecord;
use serde::Serialize;

use crate::bbox::BoundingBox;
use crate::inference::CoordinateBinding;

/// Lifecycle of a crop job.
///
/// `Created -> CoordinatesResolved -> RangeComputed -> Writing -> Completed`,
/// with `Failed` reachable from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CropPhase {
    Created,
    CoordinatesResolved,
    RangeComputed,
    Writing,
    Completed,
    Failed,
}

impl CropPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::CoordinatesResolved => "coordinates_resolved",
            Self::RangeComputed => "range_computed",
            Self::Writing => "writing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for CropPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully resolved crop job.
#[derive(Debug, Clone)]
pub struct CropJob {
    pub file: FileRecord,
    pub binding: CoordinateBinding,
    pub bbox: BoundingBox,
    pub output_path: PathBuf,
    /// Absolute or data-group relative dataset paths; `None` selects every
    /// compatible dataset of the data group.
    pub data_vars: Option<Vec<String>>,
}

/// A crop request before catalog resolution.
#[derive(Debug, Clone)]
pub struct CropOptions {
    pub file_name: String,
    pub bbox: BoundingBox,
    pub data_vars: Option<Vec<String>>,
    /// Overrides the configured output directory.
    pub output_dir: Option<PathBuf>,
    /// Overrides the configured data group policy.
    pub data_group: Option<String>,
    /// Explicit output name instead of the timestamped default.
    pub output_name: Option<String>,
}

impl CropOptions {
    pub fn new(file_name: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            file_name: file_name.into(),
            bbox,
            data_vars: None,
            output_dir: None,
            data_group: None,
            output_name: None,
        }
    }

    pub fn with_data_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_vars = Some(vars.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_data_group(mut self, group: impl Into<String>) -> Self {
        self.data_group = Some(group.into());
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}

/// Outcome of a successful crop.
#[derive(Debug, Clone, Serialize)]
pub struct CropReport {
    pub output_path: PathBuf,
    /// Coordinate and data datasets written, by absolute path.
    pub copied: Vec<String>,
    /// Requested or candidate datasets left out (missing or incompatible).
    pub skipped: Vec<String>,
    /// Coordinate points inside the bounding box.
    pub selected_points: u64,
    /// Coordinate points in the source file.
    pub total_points: u64,
    /// Elements read from the source across all slabs.
    pub elements_read: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(CropPhase::CoordinatesResolved.to_string(), "coordinates_resolved");
        assert!(CropPhase::Failed.is_terminal());
        assert!(!CropPhase::Writing.is_terminal());
    }

    #[test]
    fn test_options_builder() {
        let bbox = BoundingBox::new(10.0, 20.0, 150.0, 160.0).unwrap();
        let options = CropOptions::new("swath.h5", bbox)
            .with_data_vars(["precipRate"])
            .with_data_group("/FS/SLV")
            .with_output_name("mine.h5");

        assert_eq!(options.data_vars, Some(vec!["precipRate".to_string()]));
        assert_eq!(options.data_group.as_deref(), Some("/FS/SLV"));
        assert_eq!(options.output_name.as_deref(), Some("mine.h5"));
        assert!(options.output_dir.is_none());
    }
}
