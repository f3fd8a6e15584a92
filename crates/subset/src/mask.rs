//! Bounding-box masks and the index window they select.
//!
//! Coordinates come in two layouts:
//! - swath: 2-D latitude and longitude arrays of identical shape `(R, C)`,
//!   masked element-wise
//! - gridded: 1-D latitude and longitude axes, masked independently
//!
//! The window is the minimal rectangle containing every selected point.

use serde::Serialize;
use slab_store::{Slab, SlabRange};

use crate::bbox::BoundingBox;
use crate::error::{CropError, Result};

/// Layout of the coordinate arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum CoordinateLayout {
    Swath { rows: u64, cols: u64 },
    Gridded { lat_len: u64, lon_len: u64 },
}

impl CoordinateLayout {
    /// Extents of the two coordinate axes, in (row/lat, col/lon) order.
    pub fn extents(&self) -> (u64, u64) {
        match *self {
            Self::Swath { rows, cols } => (rows, cols),
            Self::Gridded { lat_len, lon_len } => (lat_len, lon_len),
        }
    }

    pub fn total_points(&self) -> u64 {
        let (a, b) = self.extents();
        a * b
    }

    /// Locate the two coordinate axes inside a dataset shape.
    ///
    /// Swath: the first adjacent axis pair with extents `(R, C)`, otherwise
    /// the first axis of extent `R` and the first other axis of extent `C`.
    /// Gridded: the first axis with the latitude length, then the first other
    /// axis with the longitude length.
    pub fn axes_in(&self, shape: &[u64]) -> Option<(usize, usize)> {
        let (first, second) = self.extents();

        if let Self::Swath { .. } = self {
            if let Some(i) = shape.windows(2).position(|w| w[0] == first && w[1] == second) {
                return Some((i, i + 1));
            }
        }

        let row_axis = shape.iter().position(|&n| n == first)?;
        let col_axis = shape
            .iter()
            .enumerate()
            .position(|(i, &n)| i != row_axis && n == second)?;
        Some((row_axis, col_axis))
    }
}

/// A contiguous index range on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisRange {
    pub start: u64,
    pub len: u64,
}

/// Tracks the smallest and largest index hit on one axis.
#[derive(Default)]
struct Extent {
    bounds: Option<(u64, u64)>,
}

impl Extent {
    fn hit(&mut self, index: u64) {
        self.bounds = Some(match self.bounds {
            None => (index, index),
            Some((lo, hi)) => (lo.min(index), hi.max(index)),
        });
    }

    fn range(&self) -> Option<AxisRange> {
        self.bounds.map(|(lo, hi)| AxisRange {
            start: lo,
            len: hi - lo + 1,
        })
    }
}

/// The index window selected by a bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionWindow {
    pub layout: CoordinateLayout,
    /// Row range (swath) or latitude-axis range (gridded).
    pub rows: AxisRange,
    /// Column range (swath) or longitude-axis range (gridded).
    pub cols: AxisRange,
    /// Number of coordinate points inside the bounding box.
    pub selected_points: u64,
}

impl SelectionWindow {
    /// Compute the window from fully read coordinate arrays.
    pub fn compute(lat: &Slab, lon: &Slab, bbox: &BoundingBox) -> Result<Self> {
        match (lat.shape.as_slice(), lon.shape.as_slice()) {
            ([rows, cols], [lon_rows, lon_cols]) if rows == lon_rows && cols == lon_cols => {
                Self::compute_swath(*rows, *cols, lat, lon, bbox)
            }
            ([lat_len], [lon_len]) => Self::compute_gridded(*lat_len, *lon_len, lat, lon, bbox),
            (lat_shape, lon_shape) => Err(CropError::ambiguous(format!(
                "conflicting coordinate shapes: latitude {:?}, longitude {:?}",
                lat_shape, lon_shape
            ))),
        }
    }

    fn compute_swath(
        rows: u64,
        cols: u64,
        lat: &Slab,
        lon: &Slab,
        bbox: &BoundingBox,
    ) -> Result<Self> {
        let lat_values = lat.values.to_f64();
        let lon_values = lon.values.to_f64();

        let mut row_extent = Extent::default();
        let mut col_extent = Extent::default();
        let mut selected = 0u64;

        for (i, (&la, &lo)) in lat_values.iter().zip(&lon_values).enumerate() {
            if bbox.contains(la, lo) {
                let i = i as u64;
                row_extent.hit(i / cols);
                col_extent.hit(i % cols);
                selected += 1;
            }
        }

        let (Some(rows_range), Some(cols_range)) = (row_extent.range(), col_extent.range()) else {
            return Err(CropError::EmptyIntersection(format!(
                "swath of {}x{} points for {}",
                rows, cols, bbox
            )));
        };

        Ok(Self {
            layout: CoordinateLayout::Swath { rows, cols },
            rows: rows_range,
            cols: cols_range,
            selected_points: selected,
        })
    }

    fn compute_gridded(
        lat_len: u64,
        lon_len: u64,
        lat: &Slab,
        lon: &Slab,
        bbox: &BoundingBox,
    ) -> Result<Self> {
        let mut lat_extent = Extent::default();
        let mut lat_hits = 0u64;
        for (i, value) in lat.values.to_f64().into_iter().enumerate() {
            if bbox.contains_lat(value) {
                lat_extent.hit(i as u64);
                lat_hits += 1;
            }
        }

        let mut lon_extent = Extent::default();
        let mut lon_hits = 0u64;
        for (i, value) in lon.values.to_f64().into_iter().enumerate() {
            if bbox.contains_lon(value) {
                lon_extent.hit(i as u64);
                lon_hits += 1;
            }
        }

        let empty = |axis: &str| {
            CropError::EmptyIntersection(format!("{} axis of grid for {}", axis, bbox))
        };
        let rows = lat_extent.range().ok_or_else(|| empty("latitude"))?;
        let cols = lon_extent.range().ok_or_else(|| empty("longitude"))?;

        Ok(Self {
            layout: CoordinateLayout::Gridded { lat_len, lon_len },
            rows,
            cols,
            selected_points: lat_hits * lon_hits,
        })
    }

    /// Output ranges of the latitude and longitude datasets themselves.
    pub fn coordinate_ranges(&self) -> (SlabRange, SlabRange) {
        match self.layout {
            CoordinateLayout::Swath { .. } => {
                let range = SlabRange::new(
                    vec![self.rows.start, self.cols.start],
                    vec![self.rows.len, self.cols.len],
                );
                (range.clone(), range)
            }
            CoordinateLayout::Gridded { .. } => (
                SlabRange::new(vec![self.rows.start], vec![self.rows.len]),
                SlabRange::new(vec![self.cols.start], vec![self.cols.len]),
            ),
        }
    }

    /// The slab to read from a data variable of the given shape.
    ///
    /// Coordinate axes are narrowed to the window, other axes stay whole.
    /// `None` when the shape is not compatible with the coordinates.
    pub fn range_for_shape(&self, shape: &[u64]) -> Option<SlabRange> {
        let (row_axis, col_axis) = self.layout.axes_in(shape)?;

        let mut range = SlabRange::full(shape);
        range.start[row_axis] = self.rows.start;
        range.shape[row_axis] = self.rows.len;
        range.start[col_axis] = self.cols.start;
        range.shape[col_axis] = self.cols.len;
        Some(range)
    }
}
