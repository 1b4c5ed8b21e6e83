//! route-nav: waypoint sequencing, polyline decoding and navigation progress
//! tracking for dispatch routes.
//!
//! Data flows leaf-first: [`waypoint`] builds the request, an external
//! [`traits::RoutingService`] answers it, [`route`] decodes the legs with
//! [`polyline`], and [`session`] drives a [`tracker::ProgressTracker`] from
//! a device position stream or a simulation timer.

pub mod error;
pub mod geo;
pub mod haversine;
pub mod instructions;
pub mod polyline;
pub mod route;
pub mod routing;
pub mod session;
pub mod tracker;
pub mod traits;
pub mod waypoint;

pub use error::Error;
