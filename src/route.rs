//! Route model and routing-backend wire types.
//!
//! A [`Route`] is rebuilt wholesale from every backend response. Legs are
//! decoded in parallel, ordered by their `order` field, and concatenated into
//! a single path for the progress tracker.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::LatLng;
use crate::haversine::path_length_m;
use crate::polyline;
use crate::waypoint::{PointType, WaypointSequence};

/// Request body submitted to the routing backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Points in `[lng, lat]` order.
    pub points: Vec<[f64; 2]>,
    pub point_types: Vec<PointType>,
    pub vehicle_type_id: i64,
}

impl RouteRequest {
    pub fn new(sequence: &WaypointSequence, vehicle_type_id: i64) -> Self {
        Self {
            points: sequence.coordinates().map(LatLng::to_wire).collect(),
            point_types: sequence.types.clone(),
            vehicle_type_id,
        }
    }
}

/// A toll charged along a leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toll {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub category: String,
    pub amount: f64,
}

/// One leg as returned by the backend, geometry still in wire form.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentPayload {
    pub order: u8,
    #[serde(default)]
    pub start_label: String,
    #[serde(default)]
    pub end_label: String,
    /// Explicit `[lng, lat]` vertices.
    #[serde(default)]
    pub path: Option<Vec<[f64; 2]>>,
    /// Encoded polyline, used when `path` is absent.
    #[serde(default)]
    pub encoded_polyline: Option<String>,
    #[serde(default)]
    pub distance_meters: f64,
    #[serde(default)]
    pub tolls: Vec<Toll>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Response body of the routing backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteResponse {
    pub segments: Vec<SegmentPayload>,
    #[serde(default)]
    pub total_distance: f64,
    #[serde(default)]
    pub total_toll_amount: f64,
    #[serde(default)]
    pub total_toll_count: u32,
    /// Estimated driving time, when the backend provides one.
    #[serde(default)]
    pub total_duration_seconds: Option<f64>,
}

/// One decoded leg of the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub order: u8,
    pub start_label: String,
    pub end_label: String,
    pub path: Vec<LatLng>,
    pub distance_meters: f64,
    pub tolls: Vec<Toll>,
    /// Backend payload passed through untouched for audit and export.
    pub raw_backend_payload: serde_json::Value,
}

impl From<SegmentPayload> for RouteSegment {
    fn from(payload: SegmentPayload) -> Self {
        let path = match (payload.path, payload.encoded_polyline) {
            (Some(path), _) => path.into_iter().map(LatLng::from_wire).collect(),
            (None, Some(encoded)) => polyline::decode(&encoded).into_points(),
            (None, None) => Vec::new(),
        };

        Self {
            order: payload.order,
            start_label: payload.start_label,
            end_label: payload.end_label,
            path,
            distance_meters: payload.distance_meters,
            tolls: payload.tolls,
            raw_backend_payload: payload.raw,
        }
    }
}

/// A complete route: legs plus the flattened path the tracker follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub segments: Vec<RouteSegment>,
    pub path: Vec<LatLng>,
    /// Length of `path` in meters.
    pub path_length_m: f64,
    /// Distance reported by the backend, in meters.
    pub total_distance_m: f64,
    pub total_estimated_time_s: f64,
    pub total_toll_amount: f64,
    pub total_toll_count: u32,
}

impl Route {
    /// Builds a route from decoded legs.
    ///
    /// `assumed_speed_kmh` estimates the driving time when the backend gave
    /// none.
    pub fn from_segments(
        mut segments: Vec<RouteSegment>,
        backend_duration_s: Option<f64>,
        assumed_speed_kmh: f64,
    ) -> Self {
        segments.sort_by_key(|segment| segment.order);

        let path = flatten(&segments);
        let path_length_m = path_length_m(&path);
        let total_distance_m = segments.iter().map(|s| s.distance_meters).sum();
        let total_toll_amount = segments
            .iter()
            .flat_map(|s| s.tolls.iter())
            .map(|toll| toll.amount)
            .sum();
        let total_toll_count = segments.iter().map(|s| s.tolls.len() as u32).sum();

        let total_estimated_time_s = match backend_duration_s {
            Some(seconds) if seconds > 0.0 => seconds,
            _ => estimate_seconds(path_length_m, assumed_speed_kmh),
        };

        Self {
            segments,
            path,
            path_length_m,
            total_distance_m,
            total_estimated_time_s,
            total_toll_amount,
            total_toll_count,
        }
    }

    /// Converts a backend response, decoding legs in parallel.
    pub fn from_response(response: RouteResponse, assumed_speed_kmh: f64) -> Self {
        let RouteResponse {
            segments,
            total_distance,
            total_toll_amount,
            total_toll_count,
            total_duration_seconds,
        } = response;

        let segments: Vec<RouteSegment> =
            segments.into_par_iter().map(RouteSegment::from).collect();
        let mut route = Self::from_segments(segments, total_duration_seconds, assumed_speed_kmh);

        // Backend totals win over per-leg sums when present.
        if total_distance > 0.0 {
            route.total_distance_m = total_distance;
        }
        if total_toll_count > 0 {
            route.total_toll_amount = total_toll_amount;
            route.total_toll_count = total_toll_count;
        }

        debug!(
            segments = route.segments.len(),
            vertices = route.path.len(),
            path_length_m = route.path_length_m,
            "route assembled"
        );
        route
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Concatenates leg paths, skipping the join vertex repeated at the start of
/// each following leg.
fn flatten(segments: &[RouteSegment]) -> Vec<LatLng> {
    let capacity = segments.iter().map(|s| s.path.len()).sum();
    let mut path: Vec<LatLng> = Vec::with_capacity(capacity);
    for segment in segments {
        for &point in &segment.path {
            if path.last() != Some(&point) {
                path.push(point);
            }
        }
    }
    path
}

fn estimate_seconds(distance_m: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    (distance_m / 1000.0 / speed_kmh * 3600.0).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::{BasePoints, PointKind, RoutePoint, build_request};

    fn segment(order: u8, path: Vec<LatLng>) -> RouteSegment {
        RouteSegment {
            order,
            start_label: String::new(),
            end_label: String::new(),
            path,
            distance_meters: 1000.0,
            tolls: Vec::new(),
            raw_backend_payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_request_uses_wire_order() {
        let base = BasePoints::new(
            RoutePoint::new(PointKind::Depot, LatLng::new(1.0, 2.0), "D"),
            RoutePoint::new(PointKind::Pickup, LatLng::new(3.0, 4.0), "P"),
            RoutePoint::new(PointKind::Delivery, LatLng::new(5.0, 6.0), "L"),
        );
        let sequence = build_request(&base, &[]).unwrap();
        let request = RouteRequest::new(&sequence, 7);
        assert_eq!(request.points[0], [2.0, 1.0]);
        assert_eq!(request.point_types.len(), request.points.len());

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["point_types"][3], "Depot");
        assert_eq!(json["vehicle_type_id"], 7);
    }

    #[test]
    fn test_flatten_orders_legs_and_skips_joins() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(0.0, 0.01);
        let c = LatLng::new(0.0, 0.02);
        let route = Route::from_segments(
            vec![segment(1, vec![b, c]), segment(0, vec![a, b])],
            None,
            40.0,
        );
        assert_eq!(route.path, vec![a, b, c]);
        assert_eq!(route.segments[0].order, 0);
        assert_eq!(route.total_distance_m, 2000.0);
    }

    #[test]
    fn test_estimated_time_falls_back_to_assumed_speed() {
        let route = Route::from_segments(
            vec![segment(0, vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 0.1)])],
            None,
            40.0,
        );
        // ~11.1 km at 40 km/h is ~1000 s
        assert!((route.total_estimated_time_s - 1001.0).abs() < 2.0);

        let timed = Route::from_segments(route.segments.clone(), Some(600.0), 40.0);
        assert_eq!(timed.total_estimated_time_s, 600.0);
    }

    #[test]
    fn test_segment_prefers_explicit_path() {
        let payload: SegmentPayload = serde_json::from_value(serde_json::json!({
            "order": 0,
            "path": [[-120.2, 38.5]],
            "encoded_polyline": "_p~iF~ps|U_ulLnnqC",
        }))
        .unwrap();
        let segment = RouteSegment::from(payload);
        assert_eq!(segment.path, vec![LatLng::new(38.5, -120.2)]);
    }
}
