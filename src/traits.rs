//! Seams to the planner's external collaborators.
//!
//! The routing engine, the charging-station directory and the elevation
//! source are outside the core; these traits are all the core knows about
//! them. Coordinates are `(lat, lng)` everywhere.

use crate::error::{RoutingError, StationError};
use crate::osrm::Route;
use crate::stations::ChargingStation;

/// Turns an origin/destination pair into a road route with per-step
/// distance and duration annotations.
pub trait RouteProvider {
    fn route(&self, origin: (f64, f64), destination: (f64, f64)) -> Result<Route, RoutingError>;
}

/// Lists charging stations (with outlets and prices) near the corridor
/// between two points.
pub trait StationDirectory {
    fn stations_along(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
    ) -> Result<Vec<ChargingStation>, StationError>;
}

/// Terrain height lookup, meters above sea level.
pub trait ElevationProvider {
    fn elevation_m(&self, location: (f64, f64)) -> f64;
}

/// Sea-level terrain everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain;

impl ElevationProvider for FlatTerrain {
    fn elevation_m(&self, _location: (f64, f64)) -> f64 {
        0.0
    }
}

impl<T: RouteProvider + ?Sized> RouteProvider for &T {
    fn route(&self, origin: (f64, f64), destination: (f64, f64)) -> Result<Route, RoutingError> {
        (**self).route(origin, destination)
    }
}

impl<T: ElevationProvider + ?Sized> ElevationProvider for &T {
    fn elevation_m(&self, location: (f64, f64)) -> f64 {
        (**self).elevation_m(location)
    }
}
