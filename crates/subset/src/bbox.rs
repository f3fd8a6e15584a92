//! Geographic bounding box.

use serde::Serialize;

use crate::error::{CropError, Result};

/// Latitude/longitude selection rectangle in degrees.
///
/// Always valid once constructed: finite, `min < max` on both axes, latitude
/// within [-90, 90] and longitude within [-180, 180]. Out-of-range values are
/// rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self> {
        let values = [
            ("lat_min", lat_min),
            ("lat_max", lat_max),
            ("lon_min", lon_min),
            ("lon_max", lon_max),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(CropError::invalid_bbox(format!("{} is not finite", name)));
            }
        }

        if !(-90.0..=90.0).contains(&lat_min) || !(-90.0..=90.0).contains(&lat_max) {
            return Err(CropError::invalid_bbox(format!(
                "latitude range [{}, {}] outside [-90, 90]",
                lat_min, lat_max
            )));
        }
        if !(-180.0..=180.0).contains(&lon_min) || !(-180.0..=180.0).contains(&lon_max) {
            return Err(CropError::invalid_bbox(format!(
                "longitude range [{}, {}] outside [-180, 180]",
                lon_min, lon_max
            )));
        }
        if lat_min >= lat_max {
            return Err(CropError::invalid_bbox(format!(
                "lat_min {} must be less than lat_max {}",
                lat_min, lat_max
            )));
        }
        if lon_min >= lon_max {
            return Err(CropError::invalid_bbox(format!(
                "lon_min {} must be less than lon_max {}",
                lon_min, lon_max
            )));
        }

        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    pub fn lat_min(&self) -> f64 {
        self.lat_min
    }

    pub fn lat_max(&self) -> f64 {
        self.lat_max
    }

    pub fn lon_min(&self) -> f64 {
        self.lon_min
    }

    pub fn lon_max(&self) -> f64 {
        self.lon_max
    }

    /// Inclusive latitude test. NaN never matches.
    pub fn contains_lat(&self, lat: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max
    }

    /// Inclusive longitude test. NaN never matches.
    pub fn contains_lon(&self, lon: f64) -> bool {
        lon >= self.lon_min && lon <= self.lon_max
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.contains_lat(lat) && self.contains_lon(lon)
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lat [{}, {}] lon [{}, {}]",
            self.lat_min, self.lat_max, self.lon_min, self.lon_max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_bbox() {
        let bbox = BoundingBox::new(10.0, 20.0, 150.0, 160.0).unwrap();
        assert!(bbox.contains(10.0, 160.0));
        assert!(bbox.contains(15.0, 155.0));
        assert!(!bbox.contains(9.99, 155.0));
        assert!(!bbox.contains(15.0, f64::NAN));
        assert!(!bbox.contains(f64::NAN, 155.0));
    }

    #[test]
    fn test_whole_globe_is_valid() {
        assert!(BoundingBox::new(-90.0, 90.0, -180.0, 180.0).is_ok());
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        assert!(BoundingBox::new(20.0, 10.0, 0.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 1.0, 170.0, -170.0).is_err());
        assert!(BoundingBox::new(5.0, 5.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_out_of_range_rejected_not_clamped() {
        for (a, b, c, d) in [
            (-91.0, 0.0, 0.0, 1.0),
            (0.0, 90.5, 0.0, 1.0),
            (0.0, 1.0, -181.0, 0.0),
            (0.0, 1.0, 0.0, 360.0),
        ] {
            let err = BoundingBox::new(a, b, c, d).unwrap_err();
            assert_eq!(err.kind(), "InvalidBoundingBox");
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(BoundingBox::new(f64::NAN, 1.0, 0.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 1.0, 0.0, f64::INFINITY).is_err());
    }
}
