//! Progress of a moving agent along a decoded route path.
//!
//! Each [`ProgressTracker::tick`] projects a position onto the path, derives
//! remaining distance and time, resolves the current instruction and updates
//! bearing and smoothed speed. The tracker keeps only the state needed across
//! ticks (last vertex reached, previous position, smoothed speed); session
//! bookkeeping lives in [`session`](crate::session).

use serde::{Deserialize, Serialize};

use crate::geo::LatLng;
use crate::haversine::{along_segment, bearing_deg, haversine_m, remaining_lengths_m};
use crate::route::Route;

/// Movement below this many meters does not update the bearing.
const MIN_BEARING_DISPLACEMENT_M: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Remaining distance below which the agent has arrived.
    pub arrival_threshold_m: f64,
    /// Weight of the newest speed sample in the exponential smoothing.
    pub speed_alpha: f64,
    pub max_speed_kmh: f64,
    /// Vertices this close to the best match are considered equally good;
    /// the earliest one wins so a closed loop does not snap to its end.
    pub projection_tolerance_m: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            arrival_threshold_m: 50.0,
            speed_alpha: 0.3,
            max_speed_kmh: 120.0,
            projection_tolerance_m: 20.0,
        }
    }
}

/// Read-only view of progress after a committed tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub position: LatLng,
    /// Path vertex closest to `position`.
    pub closest_index: usize,
    /// Distance from `position` to the closest vertex.
    pub off_route_m: f64,
    pub remaining_distance_m: f64,
    /// Whole seconds.
    pub remaining_time_s: u64,
    pub progress_fraction: f64,
    pub instruction_index: usize,
    pub bearing_deg: f64,
    pub smoothed_speed_kmh: f64,
    pub arrived: bool,
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    config: TrackerConfig,
    path: Vec<LatLng>,
    /// Along-path distance from each vertex to the end.
    remaining: Vec<f64>,
    total_distance_m: f64,
    total_estimated_time_s: f64,
    instruction_count: usize,
    /// Earliest vertex still considered by the projection.
    floor_index: usize,
    previous: Option<LatLng>,
    bearing_deg: f64,
    smoothed_speed_kmh: f64,
}

impl ProgressTracker {
    pub fn new(
        path: Vec<LatLng>,
        total_estimated_time_s: f64,
        instruction_count: usize,
        config: TrackerConfig,
    ) -> Self {
        let remaining = remaining_lengths_m(&path);
        let total_distance_m = remaining.first().copied().unwrap_or(0.0);

        Self {
            config,
            path,
            remaining,
            total_distance_m,
            total_estimated_time_s,
            instruction_count,
            floor_index: 0,
            previous: None,
            bearing_deg: 0.0,
            smoothed_speed_kmh: 0.0,
        }
    }

    pub fn for_route(route: &Route, instruction_count: usize, config: TrackerConfig) -> Self {
        Self::new(
            route.path.clone(),
            route.total_estimated_time_s,
            instruction_count,
            config,
        )
    }

    pub fn path(&self) -> &[LatLng] {
        &self.path
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn total_estimated_time_s(&self) -> f64 {
        self.total_estimated_time_s
    }

    pub fn smoothed_speed_kmh(&self) -> f64 {
        self.smoothed_speed_kmh
    }

    /// Commits one position update and returns the resulting snapshot.
    ///
    /// `instantaneous_speed_kmh` is the device speed or the simulated
    /// displacement rate; `None` leaves the smoothed speed unchanged.
    pub fn tick(
        &mut self,
        position: LatLng,
        instantaneous_speed_kmh: Option<f64>,
    ) -> ProgressSnapshot {
        let (closest_index, off_route_m) = self.closest_vertex(position);
        let remaining_distance_m = self.remaining_distance_m(position, closest_index, off_route_m);
        let progress_fraction = self.progress_fraction(remaining_distance_m);

        self.bearing_deg = self.next_bearing(position, closest_index);
        if let Some(speed) = instantaneous_speed_kmh {
            self.smoothed_speed_kmh = self.smooth_speed(speed);
        }
        self.floor_index = closest_index;
        self.previous = Some(position);

        ProgressSnapshot {
            position,
            closest_index,
            off_route_m,
            remaining_distance_m,
            remaining_time_s: self.remaining_time_s(progress_fraction),
            progress_fraction,
            instruction_index: self.instruction_index(progress_fraction),
            bearing_deg: self.bearing_deg,
            smoothed_speed_kmh: self.smoothed_speed_kmh,
            arrived: remaining_distance_m < self.config.arrival_threshold_m,
        }
    }

    /// Index of the path vertex nearest to `position` and its distance.
    ///
    /// Only vertices from the last committed one onward are scanned. Among
    /// vertices within the projection tolerance of the best distance the
    /// earliest is taken, then refined forward while the next vertex is
    /// strictly closer.
    pub fn closest_vertex(&self, position: LatLng) -> (usize, f64) {
        let start = self.floor_index.min(self.path.len().saturating_sub(1));
        let distances: Vec<f64> = self.path[start..]
            .iter()
            .map(|&vertex| haversine_m(position, vertex))
            .collect();

        let Some(min) = distances.iter().copied().reduce(f64::min) else {
            return (0, 0.0);
        };

        let threshold = min + self.config.projection_tolerance_m;
        let mut best = distances.iter().position(|&d| d <= threshold).unwrap_or(0);
        while best + 1 < distances.len() && distances[best + 1] < distances[best] {
            best += 1;
        }

        (start + best, distances[best])
    }

    /// Along-path distance from `position` to the end of the path.
    ///
    /// Measured through the next vertex ahead of the position, so the value
    /// shrinks continuously while moving forward between vertices.
    pub fn remaining_distance_m(
        &self,
        position: LatLng,
        closest_index: usize,
        closest_distance_m: f64,
    ) -> f64 {
        let Some(&tail) = self.remaining.get(closest_index) else {
            return 0.0;
        };
        let next = closest_index + 1;
        if next < self.path.len()
            && along_segment(position, self.path[closest_index], self.path[next]) > 0.0
        {
            haversine_m(position, self.path[next]) + self.remaining[next]
        } else {
            closest_distance_m + tail
        }
    }

    /// Traveled share of the route in [0, 1].
    pub fn progress_fraction(&self, remaining_distance_m: f64) -> f64 {
        if self.total_distance_m <= 0.0 {
            return 1.0;
        }
        (1.0 - remaining_distance_m / self.total_distance_m).clamp(0.0, 1.0)
    }

    /// Estimated time left, rounded to whole seconds.
    pub fn remaining_time_s(&self, progress_fraction: f64) -> u64 {
        (self.total_estimated_time_s * (1.0 - progress_fraction)).max(0.0).round() as u64
    }

    /// Instruction covering the given progress. Each instruction owns an
    /// equal share of the route.
    pub fn instruction_index(&self, progress_fraction: f64) -> usize {
        if self.instruction_count == 0 {
            return 0;
        }
        let step = (progress_fraction * self.instruction_count as f64).floor() as usize;
        step.min(self.instruction_count - 1)
    }

    fn smooth_speed(&self, instantaneous_kmh: f64) -> f64 {
        let alpha = self.config.speed_alpha;
        let smoothed = (1.0 - alpha) * self.smoothed_speed_kmh + alpha * instantaneous_kmh;
        smoothed.clamp(0.0, self.config.max_speed_kmh)
    }

    fn next_bearing(&self, position: LatLng, closest_index: usize) -> f64 {
        match self.previous {
            Some(previous) if haversine_m(previous, position) >= MIN_BEARING_DISPLACEMENT_M => {
                bearing_deg(previous, position)
            }
            Some(_) => self.bearing_deg,
            None => self.path_bearing(closest_index),
        }
    }

    /// Heading of the path at a vertex, used before any movement is seen.
    fn path_bearing(&self, index: usize) -> f64 {
        if index + 1 < self.path.len() {
            bearing_deg(self.path[index], self.path[index + 1])
        } else if index > 0 && index < self.path.len() {
            bearing_deg(self.path[index - 1], self.path[index])
        } else {
            self.bearing_deg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_path() -> Vec<LatLng> {
        vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 0.01), LatLng::new(0.0, 0.02)]
    }

    fn tracker(path: Vec<LatLng>) -> ProgressTracker {
        ProgressTracker::new(path, 200.0, 3, TrackerConfig::default())
    }

    #[test]
    fn test_midpoint_is_half_way() {
        let mut tracker = tracker(straight_path());
        let total = tracker.total_distance_m();
        let snapshot = tracker.tick(LatLng::new(0.0, 0.01), None);

        assert_eq!(snapshot.closest_index, 1);
        assert!(
            (snapshot.remaining_distance_m - total / 2.0).abs() < 0.01,
            "expected {}, got {}",
            total / 2.0,
            snapshot.remaining_distance_m
        );
        assert!((snapshot.progress_fraction - 0.5).abs() < 1e-6);
        assert_eq!(snapshot.remaining_time_s, 100);
        assert_eq!(snapshot.instruction_index, 1);
        assert!(!snapshot.arrived);
    }

    #[test]
    fn test_start_and_end() {
        let mut tracker = tracker(straight_path());
        let start = tracker.tick(LatLng::new(0.0, 0.0), None);
        assert_eq!(start.progress_fraction, 0.0);
        assert_eq!(start.instruction_index, 0);
        assert!((start.bearing_deg - 90.0).abs() < 1e-6);

        let end = tracker.tick(LatLng::new(0.0, 0.02), None);
        assert!(end.remaining_distance_m < 0.01);
        assert_eq!(end.progress_fraction, 1.0);
        assert_eq!(end.instruction_index, 2);
        assert_eq!(end.remaining_time_s, 0);
        assert!(end.arrived);
    }

    #[test]
    fn test_remaining_distance_is_monotone_between_vertices() {
        let mut tracker = tracker(straight_path());
        let mut last = f64::MAX;
        for step in 0..=40 {
            let position = LatLng::new(0.0, 0.0005 * step as f64);
            let snapshot = tracker.tick(position, None);
            assert!(
                snapshot.remaining_distance_m <= last + 1e-6,
                "remaining grew at step {}: {} > {}",
                step,
                snapshot.remaining_distance_m,
                last
            );
            last = snapshot.remaining_distance_m;
        }
    }

    #[test]
    fn test_closed_loop_does_not_snap_to_end() {
        // Out and back: the last vertex sits next to the first.
        let path = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 0.01),
            LatLng::new(0.01, 0.01),
            LatLng::new(0.0000001, 0.0000001),
        ];
        let mut tracker = tracker(path);
        // A few meters off the depot, slightly closer to the return vertex.
        let snapshot = tracker.tick(LatLng::new(0.00002, 0.00002), None);
        assert_eq!(snapshot.closest_index, 0);
        assert!(snapshot.progress_fraction < 0.01);
        assert!(!snapshot.arrived);
    }

    #[test]
    fn test_projection_never_moves_backwards() {
        let mut tracker = tracker(straight_path());
        tracker.tick(LatLng::new(0.0, 0.02), None);
        let snapshot = tracker.tick(LatLng::new(0.0, 0.0), None);
        assert_eq!(snapshot.closest_index, 2);
    }

    #[test]
    fn test_speed_smoothing_and_clamp() {
        let mut tracker = tracker(straight_path());
        let first = tracker.tick(LatLng::new(0.0, 0.0), Some(100.0));
        assert!((first.smoothed_speed_kmh - 30.0).abs() < 1e-9);
        let second = tracker.tick(LatLng::new(0.0, 0.001), Some(100.0));
        assert!((second.smoothed_speed_kmh - 51.0).abs() < 1e-9);
        let unchanged = tracker.tick(LatLng::new(0.0, 0.002), None);
        assert_eq!(unchanged.smoothed_speed_kmh, second.smoothed_speed_kmh);

        for _ in 0..50 {
            tracker.tick(LatLng::new(0.0, 0.002), Some(900.0));
        }
        assert_eq!(tracker.smoothed_speed_kmh(), 120.0);
        let negative = tracker.tick(LatLng::new(0.0, 0.002), Some(-10_000.0));
        assert_eq!(negative.smoothed_speed_kmh, 0.0);
    }

    #[test]
    fn test_bearing_follows_movement() {
        let mut tracker = tracker(straight_path());
        tracker.tick(LatLng::new(0.0, 0.005), None);
        let north = tracker.tick(LatLng::new(0.001, 0.005), None);
        assert!(north.bearing_deg.abs() < 1e-6);
        // Jitter below the displacement floor keeps the heading.
        let still = tracker.tick(LatLng::new(0.001, 0.005000001), None);
        assert_eq!(still.bearing_deg, north.bearing_deg);
    }

    #[test]
    fn test_single_vertex_path() {
        let mut tracker = tracker(vec![LatLng::new(0.0, 0.0)]);
        let snapshot = tracker.tick(LatLng::new(0.0, 0.0), None);
        assert_eq!(snapshot.progress_fraction, 1.0);
        assert!(snapshot.arrived);
    }

    #[test]
    fn test_no_instructions() {
        let tracker = ProgressTracker::new(straight_path(), 0.0, 0, TrackerConfig::default());
        assert_eq!(tracker.instruction_index(0.7), 0);
    }
}
