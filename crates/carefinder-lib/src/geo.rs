//! Great-circle distance between geographic coordinates.
//!
//! Distances are computed with the Haversine formula on a spherical Earth of
//! radius [`EARTH_RADIUS_KM`]. Full precision is kept for ranking; use
//! [`round_km`] only when presenting a value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const EXTERNAL_MAPS_BASE: &str = "https://www.google.com/maps/dir/";

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting NaN and out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(Error::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    /// Build a coordinate without validation.
    pub const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true when latitude is in [-90, 90] and longitude in [-180, 180].
    ///
    /// NaN components are never valid.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.latitude, self.longitude)
    }
}

/// A position fix reported by the host location API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeolocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres.
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl GeolocationFix {
    /// Validate the fix and return the search origin.
    pub fn origin(&self) -> Result<Coordinate> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Great-circle distance in kilometres between `a` and `b`.
///
/// Inputs are expected to be valid coordinates; NaN components propagate to a
/// NaN result.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Round a distance to one decimal place for display.
pub fn round_km(distance: f64) -> f64 {
    (distance * 10.0).round() / 10.0
}

/// Directions link to an external maps application, offered when a route
/// cannot be computed in-app.
pub fn external_maps_link(origin: Coordinate, destination: Coordinate) -> String {
    format!(
        "{EXTERNAL_MAPS_BASE}?api=1&origin={origin}&destination={destination}&travelmode=driving"
    )
}
