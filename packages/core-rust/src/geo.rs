//! Geographic coordinates and great-circle distance.
//!
//! [`Coordinate`] can only be built through its validating constructor, so
//! every stored coordinate is in range.
//! [`haversine_km`] is total over valid coordinates: it never fails and never
//! returns NaN, infinity or a negative value.

use serde::Serialize;

use crate::error::ValidationError;

/// Mean Earth radius used by the haversine formula, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated (latitude, longitude) pair in decimal degrees.
///
/// Serializes as `{"lat": f64, "lon": f64}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonFiniteCoordinate`] for NaN or infinite
    /// input, [`ValidationError::LatitudeOutOfRange`] when `lat` is outside
    /// `[-90, 90]` and [`ValidationError::LongitudeOutOfRange`] when `lon` is
    /// outside `[-180, 180]`.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Latitude in decimal degrees.
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in decimal degrees.
    #[must_use]
    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// Great-circle distance between two coordinates in kilometers.
///
/// The intermediate haversine term is clamped to `[0, 1]` because rounding can
/// push it just outside that range for identical or near-antipodal points.
/// Any non-finite intermediate or final value collapses to `0.0`.
#[must_use]
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let half_lat = (delta_lat / 2.0).sin();
    let half_lon = (delta_lon / 2.0).sin();
    let a = (half_lat * half_lat + lat1.cos() * lat2.cos() * half_lon * half_lon).clamp(0.0, 1.0);

    let sqrt_a = a.sqrt();
    let sqrt_one_minus_a = (1.0 - a).sqrt();
    if !sqrt_a.is_finite() || !sqrt_one_minus_a.is_finite() {
        return 0.0;
    }

    let distance = EARTH_RADIUS_KM * 2.0 * sqrt_a.atan2(sqrt_one_minus_a);
    if distance.is_finite() {
        distance
    } else {
        0.0
    }
}

/// Pluggable distance function used to rank candidate workers.
///
/// Implementations must be total and return finite, non-negative values.
pub trait DistanceMetric: Send + Sync {
    /// Distance between two coordinates, in kilometers.
    fn distance_km(&self, from: Coordinate, to: Coordinate) -> f64;
}

/// Default metric: great-circle distance via the haversine formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceMetric for Haversine {
    fn distance_km(&self, from: Coordinate, to: Coordinate) -> f64 {
        haversine_km(from, to)
    }
}
