//! Polyline representation for route geometries.
//!
//! OSRM returns GeoJSON coordinates as `[lng, lat]`; internally everything is
//! `(lat, lng)`. Conversion happens once, in [`Polyline::from_lng_lat`].

use serde::{Deserialize, Serialize};

use crate::haversine::{haversine_m, nearest_point_index};

/// A route geometry as decoded `(lat, lng)` coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    /// Builds a polyline from GeoJSON-ordered `[lng, lat]` pairs.
    pub fn from_lng_lat(coordinates: &[[f64; 2]]) -> Self {
        Self {
            points: coordinates.iter().map(|[lng, lat]| (*lat, *lng)).collect(),
        }
    }

    /// Length along the line between the vertices closest to `from` and `to`,
    /// in meters. Returns `None` for an empty line.
    pub fn length_between(&self, from: (f64, f64), to: (f64, f64)) -> Option<f64> {
        let a = nearest_point_index(&self.points, from)?;
        let b = nearest_point_index(&self.points, to)?;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Some(
            self.points[lo..=hi]
                .windows(2)
                .map(|pair| haversine_m(pair[0], pair[1]))
                .sum(),
        )
    }
}
