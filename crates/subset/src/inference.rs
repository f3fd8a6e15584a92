//! Coordinate inference from catalog metadata.
//!
//! Latitude and longitude datasets are found by matching dataset names against
//! a small rule table. No file content is read.

use catalog::{normalize_group_path, DatasetCatalog, DatasetRecord, FileRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CropError, Result};

/// Semantic role of a coordinate dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateRole {
    Latitude,
    Longitude,
}

impl std::fmt::Display for CoordinateRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latitude => write!(f, "latitude"),
            Self::Longitude => write!(f, "longitude"),
        }
    }
}

/// Name patterns for one role, matched case-insensitively as substrings.
#[derive(Debug, Clone, Copy)]
pub struct RoleRule {
    pub role: CoordinateRole,
    pub patterns: &'static [&'static str],
}

impl RoleRule {
    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p))
    }

    pub fn matches_exactly(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.patterns.iter().any(|p| lower == *p)
    }
}

pub const LATITUDE_RULE: RoleRule = RoleRule {
    role: CoordinateRole::Latitude,
    patterns: &["latitude", "lat"],
};

pub const LONGITUDE_RULE: RoleRule = RoleRule {
    role: CoordinateRole::Longitude,
    patterns: &["longitude", "lon"],
};

/// Where associated data variables live.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", content = "group", rename_all = "snake_case")]
pub enum DataGroupPolicy {
    /// Data lives in the group holding the coordinates.
    #[default]
    SameAsCoordinates,
    /// Data lives in a fixed group.
    Explicit(String),
}

/// Resolved coordinate datasets of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinateBinding {
    pub file_id: i64,
    pub lat_dataset: DatasetRecord,
    pub lon_dataset: DatasetRecord,
    /// Group holding both coordinate datasets.
    pub coordinate_group: String,
    /// Group scoping associated data variables.
    pub data_group: String,
}

impl CoordinateBinding {
    /// True if `record` is one of the two coordinate datasets.
    pub fn is_coordinate(&self, record: &DatasetRecord) -> bool {
        let path = record.full_path();
        path == self.lat_dataset.full_path() || path == self.lon_dataset.full_path()
    }
}

/// Pick the best candidate for a role among `datasets`.
///
/// Ranking: exact name match first, then shorter name, then smaller
/// `parent_path`, then smaller `name`.
fn best_candidate<'a>(
    rule: &RoleRule,
    datasets: impl Iterator<Item = &'a DatasetRecord>,
) -> (Option<&'a DatasetRecord>, usize) {
    let mut candidates: Vec<&DatasetRecord> = datasets.filter(|d| rule.matches(&d.name)).collect();
    let count = candidates.len();

    candidates.sort_by(|a, b| {
        let key_a = (!rule.matches_exactly(&a.name), a.name.len(), &a.parent_path, &a.name);
        let key_b = (!rule.matches_exactly(&b.name), b.name.len(), &b.parent_path, &b.name);
        key_a.cmp(&key_b)
    });

    (candidates.first().copied(), count)
}

/// Infer the coordinate binding of a file from its dataset records.
pub fn infer_binding(
    file_id: i64,
    datasets: &[DatasetRecord],
    policy: &DataGroupPolicy,
) -> Result<CoordinateBinding> {
    let (lat, lat_candidates) = best_candidate(&LATITUDE_RULE, datasets.iter());
    let lat = lat.ok_or_else(|| {
        CropError::ambiguous(format!(
            "no {} dataset found in file {}",
            CoordinateRole::Latitude,
            file_id
        ))
    })?;
    let coordinate_group = lat.parent_path.clone();

    let (lon, lon_candidates) = best_candidate(
        &LONGITUDE_RULE,
        datasets.iter().filter(|d| d.parent_path == coordinate_group),
    );
    let lon = lon.ok_or_else(|| {
        CropError::ambiguous(format!(
            "no {} dataset found in group {} of file {}",
            CoordinateRole::Longitude,
            coordinate_group,
            file_id
        ))
    })?;

    let data_group = match policy {
        DataGroupPolicy::SameAsCoordinates => coordinate_group.clone(),
        DataGroupPolicy::Explicit(group) => normalize_group_path(group),
    };

    debug!(
        file_id,
        lat = %lat.full_path(),
        lon = %lon.full_path(),
        lat_candidates,
        lon_candidates,
        coordinate_group = %coordinate_group,
        data_group = %data_group,
        "Resolved coordinate binding"
    );

    Ok(CoordinateBinding {
        file_id,
        lat_dataset: lat.clone(),
        lon_dataset: lon.clone(),
        coordinate_group,
        data_group,
    })
}

/// Fetch a file's datasets from the catalog and infer its binding.
pub async fn resolve_binding(
    catalog: &dyn DatasetCatalog,
    file: &FileRecord,
    policy: &DataGroupPolicy,
) -> Result<(CoordinateBinding, Vec<DatasetRecord>)> {
    let datasets = catalog.list_datasets(file.file_id).await?;
    let binding = infer_binding(file.file_id, &datasets, policy)?;
    Ok((binding, datasets))
}
