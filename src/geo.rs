//! Geographic coordinate type shared by every module.
//!
//! Internally coordinates are always (latitude, longitude). The routing
//! backend speaks `[lng, lat]`; conversion happens in [`LatLng::from_wire`]
//! and [`LatLng::to_wire`] and nowhere else.

use serde::{Deserialize, Serialize};

/// Number of decimal places used when comparing coordinates for equality.
pub const KEY_DECIMALS: i32 = 6;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a coordinate from the backend's `[lng, lat]` order.
    pub fn from_wire(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[1],
            lng: pair[0],
        }
    }

    /// Returns the backend's `[lng, lat]` order.
    pub fn to_wire(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    /// Shifts both axes by the same amount of degrees.
    pub fn offset(self, delta: f64) -> Self {
        Self {
            lat: self.lat + delta,
            lng: self.lng + delta,
        }
    }

    /// Rounded key used to detect coincident coordinates.
    pub fn key(self) -> CoordinateKey {
        let scale = 10f64.powi(KEY_DECIMALS);
        CoordinateKey {
            lat: (self.lat * scale).round() as i64,
            lng: (self.lng * scale).round() as i64,
        }
    }

    pub fn is_valid(self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for (f64, f64) {
    fn from(point: LatLng) -> Self {
        (point.lat, point.lng)
    }
}

/// Coordinate rounded to [`KEY_DECIMALS`] places, hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateKey {
    lat: i64,
    lng: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_order_is_lng_lat() {
        let point = LatLng::new(36.17, -115.14);
        assert_eq!(point.to_wire(), [-115.14, 36.17]);
        assert_eq!(LatLng::from_wire([-115.14, 36.17]), point);
    }

    #[test]
    fn test_key_ignores_sub_micro_degree_noise() {
        let a = LatLng::new(36.1234561, -115.1234561);
        let b = LatLng::new(36.1234564, -115.1234564);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_separates_one_micro_degree() {
        let a = LatLng::new(36.123456, -115.123456);
        assert_ne!(a.key(), a.offset(1e-6).key());
    }

    #[test]
    fn test_is_valid() {
        assert!(LatLng::new(90.0, -180.0).is_valid());
        assert!(!LatLng::new(91.0, 0.0).is_valid());
        assert!(!LatLng::new(0.0, 180.5).is_valid());
    }
}
