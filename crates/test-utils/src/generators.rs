//! Generators for synthetic coordinate and data arrays.
//!
//! Values follow simple closed forms so tests can predict exactly which
//! indices fall inside a bounding box and which values a cropped slab holds.

/// Swath latitudes for a `(rows, cols)` grid in row-major order.
///
/// Latitude depends only on the scan row: `10 + (row - 30) * 2/3`. Rows 30
/// through 45 lie in `[10, 20]`; the rows either side fall just outside.
///
/// # Example
///
/// ```
/// use test_utils::swath_latitudes;
///
/// let lat = swath_latitudes(100, 50);
/// assert_eq!(lat.len(), 5000);
/// assert_eq!(lat[30 * 50], 10.0);
/// assert_eq!(lat[45 * 50 + 7], 20.0);
/// ```
pub fn swath_latitudes(rows: usize, cols: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        let lat = 10.0 + (row as f64 - 30.0) * 2.0 / 3.0;
        data.extend(std::iter::repeat(lat as f32).take(cols));
    }
    data
}

/// Swath longitudes for a `(rows, cols)` grid: `150 + col * 0.2`.
///
/// With 50 columns every longitude lies in `[150, 160)`.
pub fn swath_longitudes(rows: usize, cols: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for _ in 0..rows {
        for col in 0..cols {
            data.push((150.0 + col as f64 * 0.2) as f32);
        }
    }
    data
}

/// Cell-centred axis values: `start + (i + 0.5) * step`.
///
/// ```
/// use test_utils::axis_centers;
///
/// let lat = axis_centers(-90.0, 5.0, 36);
/// assert_eq!(lat[0], -87.5);
/// assert_eq!(lat[35], 87.5);
/// ```
pub fn axis_centers(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + (i as f64 + 0.5) * step).collect()
}

/// A row-major array whose value is its flat index.
///
/// A cropped slab can then be checked against the indices it came from.
pub fn index_cube(shape: &[u64]) -> Vec<f32> {
    let count: u64 = shape.iter().product();
    (0..count).map(|i| i as f32).collect()
}

/// Flat row-major index of `indices` in an array of `shape`.
pub fn flat_index(shape: &[u64], indices: &[u64]) -> u64 {
    shape
        .iter()
        .zip(indices)
        .fold(0, |acc, (extent, index)| acc * extent + index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swath_latitude_rows() {
        let lat = swath_latitudes(100, 50);
        let at = |row: usize| lat[row * 50] as f64;

        assert!(at(29) < 10.0);
        assert_eq!(at(30), 10.0);
        assert_eq!(at(45), 20.0);
        assert!(at(46) > 20.0);
    }

    #[test]
    fn test_swath_longitudes_stay_in_range() {
        let lon = swath_longitudes(3, 50);
        assert_eq!(lon.len(), 150);
        assert!(lon.iter().all(|&v| (150.0..160.0).contains(&v)));
        assert_eq!(lon[0], lon[50]);
    }

    #[test]
    fn test_index_cube() {
        let shape = [4, 3, 2];
        let cube = index_cube(&shape);
        assert_eq!(cube.len(), 24);
        assert_eq!(cube[flat_index(&shape, &[2, 1, 1]) as usize], 15.0);
    }
}
