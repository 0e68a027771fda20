//! Great-circle geometry helpers and a straight-line router.
//!
//! [`StraightLineRouter`] estimates routes from great-circle distance and an
//! assumed speed. Less accurate than OSRM (ignores roads) but always
//! available, so it serves station detours offline and in tests.

use crate::error::RoutingError;
use crate::osrm::{Geometry, Intersection, Route, RouteLeg, RouteStep};
use crate::traits::RouteProvider;

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two `(lat, lng)` points, in meters.
pub fn haversine_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Index of the point closest to `target`. Ties resolve to the earliest
/// index; an empty slice yields `None`.
pub fn nearest_point_index(points: &[(f64, f64)], target: (f64, f64)) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate() {
        let distance = haversine_m(*point, target);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

/// Routes along the great circle at a constant assumed speed.
#[derive(Debug, Clone)]
pub struct StraightLineRouter {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for StraightLineRouter {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl StraightLineRouter {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Travel time in seconds for a distance in meters.
    fn meters_to_seconds(&self, meters: f64) -> f64 {
        meters / (self.speed_kmh / 3.6)
    }
}

impl RouteProvider for StraightLineRouter {
    fn route(&self, origin: (f64, f64), destination: (f64, f64)) -> Result<Route, RoutingError> {
        let distance = haversine_m(origin, destination);
        let duration = self.meters_to_seconds(distance);
        let to_lng_lat = |(lat, lng): (f64, f64)| [lng, lat];

        let depart = RouteStep {
            distance,
            duration,
            intersections: vec![Intersection {
                location: to_lng_lat(origin),
            }],
            geometry: Some(Geometry {
                coordinates: vec![to_lng_lat(origin), to_lng_lat(destination)],
            }),
        };
        let arrive = RouteStep {
            distance: 0.0,
            duration: 0.0,
            intersections: vec![Intersection {
                location: to_lng_lat(destination),
            }],
            geometry: Some(Geometry {
                coordinates: vec![to_lng_lat(destination), to_lng_lat(destination)],
            }),
        };

        Ok(Route {
            distance,
            duration,
            legs: vec![RouteLeg {
                distance,
                duration,
                steps: vec![depart, arrive],
            }],
            geometry: Some(Geometry {
                coordinates: vec![to_lng_lat(origin), to_lng_lat(destination)],
            }),
        })
    }
}
