//! WGS84 coordinate value type and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by [`Coordinate::distance_to`], in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors produced when constructing a [`Coordinate`].
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    /// Latitude outside `[-90, 90]` (or not finite).
    #[error("latitude {0} must be between -90 and 90")]
    Latitude(f64),

    /// Longitude outside `[-180, 180]` (or not finite).
    #[error("longitude {0} must be between -180 and 180")]
    Longitude(f64),

    /// The `(0.0, 0.0)` pair, which stands for "no known location".
    #[error("coordinate cannot be 0.0 / 0.0")]
    Null,
}

/// A latitude/longitude pair in decimal degrees.
///
/// The exact pair `(0.0, 0.0)` is the null-coordinate sentinel: the upstream
/// dataset has no providers at null island, so the row mapper uses it for
/// rows without a location and distance queries skip it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
}

impl Coordinate {
    /// The null-coordinate sentinel, `(0.0, 0.0)`.
    pub const NULL: Self = Self {
        latitude: 0.0,
        longitude: 0.0,
    };

    /// Creates a coordinate after validating both ranges. The null sentinel
    /// is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] if either component is out of range or
    /// not finite.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Like [`Self::new`] but also rejects the null sentinel. Used for query
    /// reference points.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::Null`] for `(0.0, 0.0)`, or a range error.
    pub fn new_located(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        let coord = Self::new(latitude, longitude)?;
        if coord.is_null() {
            return Err(CoordinateError::Null);
        }
        Ok(coord)
    }

    /// Whether this is the `(0.0, 0.0)` "no location" sentinel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// Great-circle distance to `other` in kilometers (haversine formula).
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}
