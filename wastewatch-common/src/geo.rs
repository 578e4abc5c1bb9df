//! Geodesy helpers
//!
//! All proximity checks in WasteWatch use great-circle (haversine) distance on
//! latitude/longitude in degrees with a spherical Earth of radius 6371 km.
//! SQLite has no trigonometric functions by default, so queries first narrow
//! candidates with a [`BoundingBox`] and the exact distance is computed here.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude on the reference sphere
const KM_PER_DEGREE_LAT: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// Relative padding applied to bounding boxes so the SQL prefilter never
/// drops a point the exact haversine check would accept
const BBOX_PADDING: f64 = 1.01;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Construct a point, rejecting coordinates outside the valid ranges
    pub fn validated(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude {} out of range [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude {} out of range [-180, 180]",
                longitude
            )));
        }
        Ok(Self::new(latitude, longitude))
    }

    /// Great-circle distance to `other` in kilometres
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Haversine great-circle distance in kilometres between two points given in degrees
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Clamp guards against rounding pushing `a` marginally above 1.0
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Axis-aligned lat/lon rectangle that contains every point within a radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Conservative box around `center` covering `radius_km`.
    ///
    /// Near the poles the longitude span is widened to the full range.
    pub fn around(center: &GeoPoint, radius_km: f64) -> Self {
        let padded_km = radius_km * BBOX_PADDING;
        let lat_delta = padded_km / KM_PER_DEGREE_LAT;
        let min_latitude = (center.latitude - lat_delta).max(-90.0);
        let max_latitude = (center.latitude + lat_delta).min(90.0);

        let cos_lat = center.latitude.to_radians().cos();
        let (min_longitude, max_longitude) = if cos_lat < 1e-6 || max_latitude >= 90.0 || min_latitude <= -90.0 {
            (-180.0, 180.0)
        } else {
            let lon_delta = padded_km / (KM_PER_DEGREE_LAT * cos_lat);
            let min = center.longitude - lon_delta;
            let max = center.longitude + lon_delta;
            // A box crossing the antimeridian is widened rather than split
            if lon_delta >= 180.0 || min < -180.0 || max > 180.0 {
                (-180.0, 180.0)
            } else {
                (min, max)
            }
        };

        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }
}

/// Coarse grid cell used to serialize work on a geographic neighbourhood.
///
/// Cell edge is `cell_degrees` in both axes. With 0.01° cells, any two points
/// less than 0.5 km apart share a cell or sit in adjacent cells (below ~60°
/// latitude, where a 0.01° longitude step is still wider than 0.5 km).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub row: i64,
    pub col: i64,
}

impl GridCell {
    pub fn containing(point: &GeoPoint, cell_degrees: f64) -> Self {
        Self {
            row: (point.latitude / cell_degrees).floor() as i64,
            col: (point.longitude / cell_degrees).floor() as i64,
        }
    }

    /// This cell and its eight neighbours, sorted so that every caller
    /// acquires overlapping sets in the same order.
    pub fn neighborhood(&self) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity(9);
        for d_row in -1..=1 {
            for d_col in -1..=1 {
                cells.push(GridCell {
                    row: self.row + d_row,
                    col: self.col + d_col,
                });
            }
        }
        cells.sort();
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let d = haversine_km(-8.5569, 125.5603, -8.5569, 125.5603);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude along a meridian is ~111.19 km on a 6371 km sphere
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = GeoPoint::new(-8.5569, 125.5603);
        let b = GeoPoint::new(-8.5600, 125.5650);
        assert!((a.distance_km(&b) - b.distance_km(&a)).abs() < 1e-12);
    }

    #[test]
    fn test_validated_rejects_out_of_range() {
        assert!(GeoPoint::validated(91.0, 0.0).is_err());
        assert!(GeoPoint::validated(0.0, -180.5).is_err());
        assert!(GeoPoint::validated(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::validated(-8.55, 125.56).is_ok());
    }

    #[test]
    fn test_bounding_box_contains_radius() {
        let center = GeoPoint::new(-8.5569, 125.5603);
        let bbox = BoundingBox::around(&center, 0.5);

        // Points exactly 0.5 km north/east must fall inside the box
        let north = GeoPoint::new(center.latitude + 0.5 / 111.19, center.longitude);
        assert!(north.latitude <= bbox.max_latitude);

        let east_delta = 0.5 / (111.19 * center.latitude.to_radians().cos());
        let east = GeoPoint::new(center.latitude, center.longitude + east_delta);
        assert!(east.longitude <= bbox.max_longitude);
        assert!(bbox.min_longitude < center.longitude);
    }

    #[test]
    fn test_bounding_box_near_pole_spans_all_longitudes() {
        let bbox = BoundingBox::around(&GeoPoint::new(89.999, 10.0), 1.0);
        assert_eq!(bbox.min_longitude, -180.0);
        assert_eq!(bbox.max_longitude, 180.0);
    }

    #[test]
    fn test_bounding_box_across_antimeridian_is_widened() {
        let bbox = BoundingBox::around(&GeoPoint::new(-16.5, 179.999), 0.5);
        assert_eq!(bbox.min_longitude, -180.0);
        assert_eq!(bbox.max_longitude, 180.0);
    }

    #[test]
    fn test_grid_neighborhood_is_sorted_and_overlapping() {
        let a = GridCell::containing(&GeoPoint::new(-8.5569, 125.5603), 0.01);
        let b = GridCell::containing(&GeoPoint::new(-8.5530, 125.5640), 0.01);

        let na = a.neighborhood();
        assert_eq!(na.len(), 9);
        assert!(na.windows(2).all(|w| w[0] < w[1]));

        let nb = b.neighborhood();
        assert!(na.iter().any(|c| nb.contains(c)));
    }
}
