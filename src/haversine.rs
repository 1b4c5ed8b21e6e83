//! Great-circle geometry over [`LatLng`] paths.
//!
//! All distances are meters. Unit conversion for display belongs to callers.

use crate::geo::LatLng;

/// Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points in meters.
pub fn haversine_m(from: LatLng, to: LatLng) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Total length of a path in meters.
pub fn path_length_m(path: &[LatLng]) -> f64 {
    path.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

/// Distance from each vertex to the end of the path, following the path.
///
/// `result[i]` is the sum of consecutive-vertex distances from `path[i]` to
/// the last vertex; the last entry is always zero.
pub fn remaining_lengths_m(path: &[LatLng]) -> Vec<f64> {
    let mut remaining = vec![0.0; path.len()];
    for i in (0..path.len().saturating_sub(1)).rev() {
        remaining[i] = remaining[i + 1] + haversine_m(path[i], path[i + 1]);
    }
    remaining
}

/// Initial bearing (forward azimuth) from `from` to `to`, in degrees [0, 360).
pub fn bearing_deg(from: LatLng, to: LatLng) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlng = (to.lng - from.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 { 0.0 } else { bearing }
}

/// Unclamped position of `point` along the segment `a -> b`, as a multiple of
/// the segment length. Negative means before `a`, above one means past `b`.
///
/// Planar approximation scaled by latitude cosine; accurate for the short
/// segments a road polyline is made of.
pub fn along_segment(point: LatLng, a: LatLng, b: LatLng) -> f64 {
    let cos_lat = ((a.lat + b.lat) / 2.0).to_radians().cos();

    let dx = (b.lng - a.lng) * cos_lat;
    let dy = b.lat - a.lat;
    let px = (point.lng - a.lng) * cos_lat;
    let py = point.lat - a.lat;

    let seg_len_sq = dx * dx + dy * dy;
    if seg_len_sq < 1e-20 {
        return 0.0;
    }

    (px * dx + py * dy) / seg_len_sq
}

/// Convert meters traveled over seconds into km/h.
pub fn speed_kmh(distance_m: f64, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    distance_m / seconds * 3.6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let p = LatLng::new(36.1, -115.1);
        assert!(haversine_m(p, p) < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Las Vegas to Los Angeles, ~370 km
        let dist = haversine_m(LatLng::new(36.17, -115.14), LatLng::new(34.05, -118.24));
        assert!(
            dist > 350_000.0 && dist < 400_000.0,
            "LV to LA should be ~370km, got {}",
            dist
        );
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = LatLng::new(36.1, -115.1);
        let b = LatLng::new(36.2, -115.2);
        assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_remaining_lengths() {
        let path = vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 0.01), LatLng::new(0.0, 0.02)];
        let remaining = remaining_lengths_m(&path);
        assert_eq!(remaining.len(), 3);
        assert_eq!(remaining[2], 0.0);
        assert!((remaining[0] - path_length_m(&path)).abs() < 1e-6);
        assert!((remaining[0] - 2.0 * remaining[1]).abs() < 1e-6);
    }

    #[test]
    fn test_remaining_lengths_empty() {
        assert!(remaining_lengths_m(&[]).is_empty());
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = LatLng::new(0.0, 0.0);
        assert!((bearing_deg(origin, LatLng::new(1.0, 0.0)) - 0.0).abs() < 1e-6);
        assert!((bearing_deg(origin, LatLng::new(0.0, 1.0)) - 90.0).abs() < 1e-6);
        assert!((bearing_deg(origin, LatLng::new(-1.0, 0.0)) - 180.0).abs() < 1e-6);
        assert!((bearing_deg(origin, LatLng::new(0.0, -1.0)) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_along_segment() {
        let a = LatLng::new(48.0, 16.0);
        let b = LatLng::new(48.0, 17.0);
        assert!((along_segment(LatLng::new(48.1, 16.5), a, b) - 0.5).abs() < 1e-9);
        assert!(along_segment(LatLng::new(48.0, 15.5), a, b) < 0.0);
        assert!(along_segment(LatLng::new(48.0, 17.5), a, b) > 1.0);
        assert_eq!(along_segment(LatLng::new(48.0, 16.5), a, a), 0.0);
    }

    #[test]
    fn test_speed_kmh() {
        assert!((speed_kmh(1000.0, 60.0) - 60.0).abs() < 1e-9);
        assert_eq!(speed_kmh(10.0, 0.0), 0.0);
    }
}
