//! Real Las Vegas / Henderson locations (OpenStreetMap coordinates).

use route_nav::geo::LatLng;
use route_nav::waypoint::{BasePoints, PointKind, RoutePoint};

#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn point(&self, kind: PointKind) -> RoutePoint {
        RoutePoint::new(kind, self.coords(), self.name)
    }
}

pub const DEPOT: Location = Location::new("North Las Vegas Yard", 36.2406, -115.1175);
pub const PICKUP: Location = Location::new("Henderson Warehouse", 36.0397, -114.9819);
pub const DELIVERY: Location = Location::new("Summerlin Distribution", 36.1881, -115.3050);

pub const STOPS: &[Location] = &[
    Location::new("Fremont Street", 36.1707, -115.1429),
    Location::new("UNLV Campus", 36.1075, -115.1430),
    Location::new("Harry Reid Airport", 36.0840, -115.1537),
    Location::new("Red Rock Casino", 36.1573, -115.2882),
    Location::new("Green Valley Ranch", 36.0305, -115.0825),
];

pub fn base_points() -> BasePoints {
    BasePoints::new(
        DEPOT.point(PointKind::Depot),
        PICKUP.point(PointKind::Pickup),
        DELIVERY.point(PointKind::Delivery),
    )
}
