//! HTTP adapter for the route-suggestion backend.

use tracing::{info, warn};

use crate::error::{Error, RoutingError};
use crate::route::{Route, RouteRequest, RouteResponse};
use crate::traits::RoutingService;
use crate::waypoint::{BasePoints, WaypointSequencer};

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub base_url: String,
    /// Path of the route-suggestion endpoint, appended to `base_url`.
    pub route_path: String,
    pub timeout_secs: u64,
    pub vehicle_type_id: i64,
    /// Speed used to estimate driving time when the backend reports none.
    pub assumed_speed_kmh: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            route_path: "/api/routes/suggest".to_string(),
            timeout_secs: 10,
            vehicle_type_id: 1,
            assumed_speed_kmh: 40.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingClient {
    config: RoutingConfig,
    client: reqwest::blocking::Client,
}

impl RoutingClient {
    pub fn new(config: RoutingConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// [`fetch_route`] against this client with its own configuration.
    pub fn fetch(&self, base: &BasePoints, sequencer: &WaypointSequencer) -> Result<Route, Error> {
        fetch_route(self, base, sequencer, &self.config)
    }

    fn url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.route_path.trim_start_matches('/')
        )
    }
}

impl RoutingService for RoutingClient {
    fn suggest_route(&self, request: &RouteRequest) -> Result<RouteResponse, RoutingError> {
        let response = self.client.post(self.url()).json(request).send()?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "routing service rejected request");
            return Err(RoutingError::Status(status.as_u16()));
        }

        Ok(response.json::<RouteResponse>()?)
    }
}

/// Sequences the waypoints, asks the backend for a route and decodes it.
///
/// No retry is attempted; a failed call leaves any previous route in place
/// for the caller to keep or discard.
pub fn fetch_route<S: RoutingService + ?Sized>(
    service: &S,
    base: &BasePoints,
    sequencer: &WaypointSequencer,
    config: &RoutingConfig,
) -> Result<Route, Error> {
    let sequence = sequencer.build_request(base)?;
    let request = RouteRequest::new(&sequence, config.vehicle_type_id);

    let response = service.suggest_route(&request)?;
    let route = Route::from_response(response, config.assumed_speed_kmh);
    if route.is_empty() {
        return Err(RoutingError::EmptyRoute.into());
    }

    info!(
        points = request.points.len(),
        segments = route.segments.len(),
        distance_m = route.total_distance_m,
        "route fetched"
    );
    Ok(route)
}
