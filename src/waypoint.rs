//! Waypoint sequencing for route requests.
//!
//! Turns the three mandatory base points plus user stopovers into the exact
//! ordered point/type lists the routing backend expects:
//!
//! ```text
//! Depot, [leg 0 stopovers], Pickup, [leg 1 stopovers], Delivery, [leg 2 stopovers], DepotReturn
//! ```
//!
//! Only a missing or duplicated base point is an error. Everything else
//! (bad leg indices, coincident coordinates) is normalized so that a request
//! can always be submitted once the base set is complete.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WaypointError;
use crate::geo::{CoordinateKey, LatLng};

/// Offset applied to the depot to derive the return point.
pub const DEPOT_RETURN_OFFSET: f64 = 1e-6;

/// Per-index nudge applied to coincident coordinates.
pub const DEDUP_NUDGE: f64 = 1e-7;

/// Upper bound on nudges for a single point before it is accepted as is.
const MAX_NUDGES: usize = 32;

/// Number of legs a stopover can be inserted into.
pub const LEG_COUNT: u8 = 3;

/// Role of a waypoint in the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointKind {
    Depot,
    Pickup,
    Delivery,
    Stopover,
    /// Derived copy of the depot closing the loop. Never user supplied.
    DepotReturn,
}

impl PointKind {
    /// Type reported to the routing backend.
    pub fn point_type(self) -> PointType {
        match self {
            PointKind::Depot | PointKind::DepotReturn => PointType::Depot,
            PointKind::Pickup => PointType::Pickup,
            PointKind::Delivery => PointType::Delivery,
            PointKind::Stopover => PointType::Stopover,
        }
    }

    /// Whether at most one point of this kind may be submitted.
    fn is_unique(self) -> bool {
        matches!(self, PointKind::Depot | PointKind::Pickup | PointKind::Delivery)
    }
}

/// Point type as understood by the routing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointType {
    Depot,
    Pickup,
    Delivery,
    Stopover,
}

/// A named geographic waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub kind: PointKind,
    pub coordinates: LatLng,
    pub label: String,
    pub address: String,
    /// Leg a stopover belongs to: 0 depot->pickup, 1 pickup->delivery,
    /// 2 delivery->depot. Ignored for other kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<u8>,
}

impl RoutePoint {
    pub fn new(kind: PointKind, coordinates: LatLng, label: impl Into<String>) -> Self {
        Self {
            kind,
            coordinates,
            label: label.into(),
            address: String::new(),
            segment_index: None,
        }
    }

    pub fn stopover(coordinates: LatLng, label: impl Into<String>, segment_index: u8) -> Self {
        Self {
            segment_index: Some(segment_index),
            ..Self::new(PointKind::Stopover, coordinates, label)
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Leg index with out-of-range or missing values folded to leg 0.
    pub fn leg(&self) -> usize {
        match self.segment_index {
            Some(index) if index < LEG_COUNT => index as usize,
            _ => 0,
        }
    }

    fn depot_return(depot: &RoutePoint) -> Self {
        Self {
            kind: PointKind::DepotReturn,
            coordinates: depot.coordinates.offset(DEPOT_RETURN_OFFSET),
            label: format!("{} (return)", depot.label),
            address: depot.address.clone(),
            segment_index: None,
        }
    }
}

/// The mandatory depot, pickup and delivery points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasePoints {
    pub depot: Option<RoutePoint>,
    pub pickup: Option<RoutePoint>,
    pub delivery: Option<RoutePoint>,
}

impl BasePoints {
    pub fn new(depot: RoutePoint, pickup: RoutePoint, delivery: RoutePoint) -> Self {
        Self {
            depot: Some(depot),
            pickup: Some(pickup),
            delivery: Some(delivery),
        }
    }

    /// Picks the base points out of a mixed list by kind.
    ///
    /// Points of any other kind are ignored; a second depot, pickup or
    /// delivery is rejected.
    pub fn from_points(points: &[RoutePoint]) -> Result<Self, WaypointError> {
        let mut base = BasePoints::default();
        for point in points {
            let slot = match point.kind {
                PointKind::Depot => &mut base.depot,
                PointKind::Pickup => &mut base.pickup,
                PointKind::Delivery => &mut base.delivery,
                PointKind::Stopover | PointKind::DepotReturn => continue,
            };
            if slot.is_some() {
                return Err(WaypointError::Duplicate(point.kind));
            }
            *slot = Some(point.clone());
        }
        Ok(base)
    }

    fn require(&self) -> Result<(&RoutePoint, &RoutePoint, &RoutePoint), WaypointError> {
        let depot = self.depot.as_ref().ok_or(WaypointError::Missing(PointKind::Depot))?;
        let pickup = self.pickup.as_ref().ok_or(WaypointError::Missing(PointKind::Pickup))?;
        let delivery = self
            .delivery
            .as_ref()
            .ok_or(WaypointError::Missing(PointKind::Delivery))?;
        Ok((depot, pickup, delivery))
    }
}

/// Ordered points and their backend types, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointSequence {
    pub points: Vec<RoutePoint>,
    pub types: Vec<PointType>,
}

impl WaypointSequence {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn coordinates(&self) -> impl Iterator<Item = LatLng> + '_ {
        self.points.iter().map(|point| point.coordinates)
    }
}

/// Builds the ordered, deduplicated request sequence.
pub fn build_request(
    base: &BasePoints,
    stopovers: &[RoutePoint],
) -> Result<WaypointSequence, WaypointError> {
    let (depot, pickup, delivery) = base.require()?;

    let mut legs: [Vec<&RoutePoint>; LEG_COUNT as usize] = Default::default();
    for stopover in stopovers {
        legs[stopover.leg()].push(stopover);
    }
    for leg in legs.iter_mut() {
        leg.sort_by(|a, b| compare_ordinal_labels(&a.label, &b.label));
    }

    let depot_return = RoutePoint::depot_return(depot);
    let anchors = [
        (depot, PointKind::Depot),
        (pickup, PointKind::Pickup),
        (delivery, PointKind::Delivery),
    ];

    let mut emitted = Vec::with_capacity(stopovers.len() + 4);
    for ((anchor, kind), leg) in anchors.into_iter().zip(legs.iter()) {
        // The slot decides the role, whatever kind the caller tagged.
        let mut point = anchor.clone();
        if point.kind != kind {
            debug!(label = %point.label, tagged = ?point.kind, ?kind, "retyping base point");
            point.kind = kind;
            point.segment_index = None;
        }
        emitted.push(point);
        for stopover in leg {
            let mut point = (*stopover).clone();
            point.kind = PointKind::Stopover;
            point.segment_index = Some(stopover.leg() as u8);
            emitted.push(point);
        }
    }
    emitted.push(depot_return);

    Ok(deduplicate(emitted))
}

/// Drops repeated unique kinds and nudges coincident coordinates apart.
fn deduplicate(emitted: Vec<RoutePoint>) -> WaypointSequence {
    let mut seen_keys: HashSet<CoordinateKey> = HashSet::with_capacity(emitted.len());
    let mut seen_kinds: HashSet<PointKind> = HashSet::new();
    let mut sequence = WaypointSequence::default();

    for (index, mut point) in emitted.into_iter().enumerate() {
        if point.kind.is_unique() && !seen_kinds.insert(point.kind) {
            debug!(kind = ?point.kind, label = %point.label, "dropping repeated waypoint type");
            continue;
        }

        let mut key = point.coordinates.key();
        let mut nudges = 0;
        while seen_keys.contains(&key) && nudges < MAX_NUDGES {
            point.coordinates = point.coordinates.offset(index.max(1) as f64 * DEDUP_NUDGE);
            key = point.coordinates.key();
            nudges += 1;
        }
        if nudges > 0 {
            debug!(label = %point.label, index, nudges, "nudged coincident waypoint");
        }
        seen_keys.insert(key);

        sequence.types.push(point.kind.point_type());
        sequence.points.push(point);
    }

    sequence
}

/// Orders labels by their trailing number ("Stopover 2" before "Stopover 10"),
/// falling back to plain string order when either label has none.
fn compare_ordinal_labels(a: &str, b: &str) -> Ordering {
    match (ordinal_suffix(a), ordinal_suffix(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn ordinal_suffix(label: &str) -> Option<u64> {
    let trimmed = label.trim_end();
    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    trimmed[digits_start..].parse().ok()
}

/// Stopovers for the route being edited.
///
/// Owned by whoever owns the editing session and passed to
/// [`WaypointSequencer::build_request`]; every change means a full rebuild of
/// the request, never an incremental patch.
#[derive(Debug, Clone, Default)]
pub struct WaypointSequencer {
    stopovers: Vec<RoutePoint>,
    next_ordinal: u64,
}

impl WaypointSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopovers(&self) -> &[RoutePoint] {
        &self.stopovers
    }

    /// Adds a stopover to a leg and returns its generated label.
    pub fn add_stopover(
        &mut self,
        coordinates: LatLng,
        address: impl Into<String>,
        segment_index: u8,
    ) -> String {
        self.next_ordinal += 1;
        let label = format!("Stopover {}", self.next_ordinal);
        let stopover =
            RoutePoint::stopover(coordinates, label.clone(), segment_index).with_address(address);
        self.stopovers.push(stopover);
        label
    }

    /// Inserts a caller-built stopover, keeping future generated labels
    /// after its ordinal.
    pub fn insert(&mut self, mut stopover: RoutePoint) {
        stopover.kind = PointKind::Stopover;
        if let Some(ordinal) = ordinal_suffix(&stopover.label) {
            self.next_ordinal = self.next_ordinal.max(ordinal);
        }
        self.stopovers.push(stopover);
    }

    pub fn remove_stopover(&mut self, label: &str) -> Option<RoutePoint> {
        let position = self.stopovers.iter().position(|s| s.label == label)?;
        Some(self.stopovers.remove(position))
    }

    /// Moves a stopover to another leg. Returns false if the label is unknown.
    pub fn move_stopover(&mut self, label: &str, segment_index: u8) -> bool {
        match self.stopovers.iter_mut().find(|s| s.label == label) {
            Some(stopover) => {
                stopover.segment_index = Some(segment_index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.stopovers.clear();
        self.next_ordinal = 0;
    }

    pub fn build_request(&self, base: &BasePoints) -> Result<WaypointSequence, WaypointError> {
        build_request(base, &self.stopovers)
    }
}
