//! Test fixtures for route-nav.
//!
//! Provides real Las Vegas dispatch locations, route builders and mock
//! collaborators for driving a navigation session deterministically.

#![allow(dead_code)]

pub mod locations;
pub mod mocks;

use route_nav::geo::LatLng;
use route_nav::route::{Route, RouteSegment};

/// A single-leg route along the equator with `vertices` points spaced
/// `step_deg` degrees of longitude apart (0.001 deg is ~111 m).
pub fn straight_route(vertices: usize, step_deg: f64) -> Route {
    let path = (0..vertices)
        .map(|i| LatLng::new(0.0, i as f64 * step_deg))
        .collect();
    Route::from_segments(vec![segment(0, path)], Some(600.0), 40.0)
}

pub fn segment(order: u8, path: Vec<LatLng>) -> RouteSegment {
    RouteSegment {
        order,
        start_label: format!("leg {} start", order),
        end_label: format!("leg {} end", order),
        path,
        distance_meters: 0.0,
        tolls: Vec::new(),
        raw_backend_payload: serde_json::Value::Null,
    }
}
