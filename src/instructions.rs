//! Turn-by-turn instructions derived from route geometry.
//!
//! Used when the caller has no instruction list of its own. Vertices where
//! the heading changes by less than [`STRAIGHT_THRESHOLD_DEG`] are folded into
//! the following maneuver.

use serde::{Deserialize, Serialize};

use crate::geo::LatLng;
use crate::haversine::{bearing_deg, haversine_m};

/// Heading change below which a vertex is not a maneuver.
pub const STRAIGHT_THRESHOLD_DEG: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Path vertex the maneuver happens at.
    pub path_index: usize,
    /// Distance from the previous instruction, in meters.
    pub distance_m: f64,
    pub turn: Turn,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Turn {
    Start,
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
    SlightRight,
    Right,
    SharpRight,
    UTurn,
    Arrive,
}

impl Turn {
    /// Classifies a signed heading change (positive = right) in degrees.
    pub fn from_angle(angle: f64) -> Self {
        let abs_angle = angle.abs();
        let right = angle > 0.0;

        if abs_angle > 170.0 {
            Turn::UTurn
        } else if abs_angle > 120.0 {
            if right { Turn::SharpRight } else { Turn::SharpLeft }
        } else if abs_angle > 60.0 {
            if right { Turn::Right } else { Turn::Left }
        } else if abs_angle > STRAIGHT_THRESHOLD_DEG {
            if right { Turn::SlightRight } else { Turn::SlightLeft }
        } else {
            Turn::Straight
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            Turn::Start => "start navigation",
            Turn::Straight => "continue straight",
            Turn::SlightLeft => "keep slightly left",
            Turn::Left => "turn left",
            Turn::SharpLeft => "turn sharp left",
            Turn::SlightRight => "keep slightly right",
            Turn::Right => "turn right",
            Turn::SharpRight => "turn sharp right",
            Turn::UTurn => "make a U-turn",
            Turn::Arrive => "arrive at destination",
        }
    }
}

/// Generates start, maneuver and arrival instructions for a path.
///
/// Paths with fewer than two distinct vertices yield no instructions.
pub fn generate_instructions(path: &[LatLng]) -> Vec<Instruction> {
    if path.len() < 2 {
        return Vec::new();
    }

    let mut instructions = vec![Instruction {
        path_index: 0,
        distance_m: 0.0,
        turn: Turn::Start,
        text: "Start navigation".to_string(),
    }];

    let mut since_last = 0.0;
    for i in 1..path.len() - 1 {
        since_last += haversine_m(path[i - 1], path[i]);
        let turn = Turn::from_angle(heading_change(path[i - 1], path[i], path[i + 1]));
        if turn == Turn::Straight {
            continue;
        }
        instructions.push(Instruction {
            path_index: i,
            distance_m: since_last,
            turn,
            text: format!("In {}, {}", format_distance(since_last), turn.phrase()),
        });
        since_last = 0.0;
    }

    let last = path.len() - 1;
    since_last += haversine_m(path[last - 1], path[last]);
    instructions.push(Instruction {
        path_index: last,
        distance_m: since_last,
        turn: Turn::Arrive,
        text: format!("In {}, {}", format_distance(since_last), Turn::Arrive.phrase()),
    });

    instructions
}

/// Signed heading change at `b`, normalized to [-180, 180].
fn heading_change(a: LatLng, b: LatLng, c: LatLng) -> f64 {
    let angle = bearing_deg(b, c) - bearing_deg(a, b);
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Presentation-only formatting of a distance.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        // round to 10 m
        format!("{} m", ((meters / 10.0).round() * 10.0) as i64)
    }
}
