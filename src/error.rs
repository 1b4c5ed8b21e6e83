//! Error taxonomy.
//!
//! Waypoint problems fail fast, geometry problems degrade to partial results,
//! and session-level I/O problems end the session cleanly.

use serde::{Deserialize, Serialize};

use crate::polyline::Polyline;
use crate::session::SessionMode;
use crate::waypoint::PointKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Waypoint(#[from] WaypointError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaypointError {
    #[error("missing {0:?} waypoint")]
    Missing(PointKind),
    #[error("more than one {0:?} waypoint")]
    Duplicate(PointKind),
}

/// Malformed polyline input; `partial` holds every point decoded before the
/// input ran out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("polyline truncated at byte {position} after {} points", .partial.len())]
pub struct DecodeError {
    pub position: usize,
    pub partial: Polyline,
}

impl DecodeError {
    pub fn partial_count(&self) -> usize {
        self.partial.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("routing service unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
    #[error("routing service answered with status {0}")]
    Status(u16),
    #[error("routing service returned no usable geometry")]
    EmptyRoute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("position source failed: {message}")]
pub struct PositionSourceError {
    pub message: String,
}

impl PositionSourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no route loaded")]
    NoRoute,
    #[error("route has no geometry")]
    EmptyRoute,
    #[error("cannot {action} while {from:?}")]
    InvalidTransition {
        from: SessionMode,
        action: &'static str,
    },
    #[error("unsupported simulation speed x{0}")]
    UnsupportedSpeed(u8),
    #[error(transparent)]
    PositionSource(#[from] PositionSourceError),
}
