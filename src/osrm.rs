//! OSRM HTTP adapter for routes.
//!
//! Requests `route/v1` with steps and GeoJSON geometries. The response types
//! below are the routing-engine contract consumed by the segmenter; only the
//! fields the planner reads are modelled.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RoutingError;
use crate::traits::RouteProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, RoutingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, origin: (f64, f64), destination: (f64, f64)) -> String {
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?steps=true&overview=full&annotations=true&geometries=geojson",
            self.config.base_url,
            self.config.profile,
            origin.1,
            origin.0,
            destination.1,
            destination.0
        )
    }
}

impl RouteProvider for OsrmClient {
    fn route(&self, origin: (f64, f64), destination: (f64, f64)) -> Result<Route, RoutingError> {
        let url = self.route_url(origin, destination);
        debug!(%url, "requesting route");

        let body = self
            .client
            .get(url)
            .send()?
            .json::<OsrmRouteResponse>()?;

        body.into_first_route()
    }
}

/// Body of an OSRM `route` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OsrmRouteResponse {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl OsrmRouteResponse {
    /// The engine's best route, or the engine's own error.
    pub fn into_first_route(self) -> Result<Route, RoutingError> {
        if self.code != "Ok" {
            return Err(RoutingError::Engine {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        self.routes.into_iter().next().ok_or(RoutingError::NoRoute)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// meters
    pub distance: f64,
    /// seconds
    pub duration: f64,
    #[serde(default)]
    pub legs: Vec<RouteLeg>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub distance: f64,
    pub duration: f64,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub distance: f64,
    pub duration: f64,
    #[serde(default)]
    pub intersections: Vec<Intersection>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    /// `[lng, lat]`
    pub location: [f64; 2],
}

impl Intersection {
    /// Location as `(lat, lng)`.
    pub fn lat_lng(&self) -> (f64, f64) {
        (self.location[1], self.location[0])
    }
}

/// GeoJSON `LineString`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// `[lng, lat]` pairs
    pub coordinates: Vec<[f64; 2]>,
}
