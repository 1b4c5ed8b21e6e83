//! Seams to the collaborators the engine does not own.
//!
//! The routing backend, the device position stream, the simulation timer,
//! the wall clock and whatever redraws the map all live outside this crate.
//! Implement these for the host platform.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PositionSourceError, RoutingError};
use crate::route::{RouteRequest, RouteResponse};
use crate::session::SessionEvent;

/// Computes a route for an ordered waypoint list.
pub trait RoutingService {
    fn suggest_route(&self, request: &RouteRequest) -> Result<RouteResponse, RoutingError>;
}

/// Identifies one subscription or timer started by a session.
///
/// Events must be delivered back with the token they were started with;
/// events carrying a token the session no longer holds are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceToken(pub u64);

/// Handle to a running subscription or timer.
pub trait SubscriptionHandle {
    /// Stops delivery. Must take effect before returning.
    fn cancel(&mut self);
}

/// One reading from a device position stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f64,
    /// Device-reported ground speed, if the device has one.
    pub speed_mps: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Device geolocation. Fixes are pushed to
/// [`NavigationSession::on_position`](crate::session::NavigationSession::on_position).
pub trait PositionSource {
    type Handle: SubscriptionHandle;

    fn subscribe(&mut self, token: SourceToken) -> Result<Self::Handle, PositionSourceError>;
}

/// Periodic timer driving a simulation. Ticks are pushed to
/// [`NavigationSession::on_timer_tick`](crate::session::NavigationSession::on_timer_tick).
pub trait TickSource {
    type Handle: SubscriptionHandle;

    fn start(&mut self, token: SourceToken, period: Duration) -> Self::Handle;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Receives events after each committed session transition.
pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: FnMut(&SessionEvent),
{
    fn on_event(&mut self, event: &SessionEvent) {
        (self)(event)
    }
}
