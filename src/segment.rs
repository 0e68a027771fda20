//! Route segmenter.
//!
//! Flattens a routing-engine route (legs → steps → intersections) into an
//! ordered list of segments, one per stretch between consecutive
//! intersections, each annotated with the battery energy it takes.

use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::energy::segment_energy_wh;
use crate::error::EnergyError;
use crate::haversine::{haversine_m, nearest_point_index};
use crate::osrm::{Route, RouteStep};
use crate::polyline::Polyline;
use crate::traits::ElevationProvider;
use crate::vehicle::Vehicle;

/// One atomic stretch of road.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub distance_m: f64,
    pub duration_s: f64,
    pub elevation_start_m: f64,
    pub elevation_end_m: f64,
}

impl Segment {
    pub fn new(distance_m: f64, duration_s: f64, elevation_start_m: f64, elevation_end_m: f64) -> Self {
        Self {
            distance_m,
            duration_s,
            elevation_start_m,
            elevation_end_m,
        }
    }

    /// m/s; zero for a zero-duration segment.
    pub fn average_speed(&self) -> f64 {
        if self.duration_s == 0.0 {
            0.0
        } else {
            self.distance_m / self.duration_s
        }
    }

    /// Average slope in radians, negative downhill. A zero-length segment is
    /// flat.
    pub fn slope_angle(&self) -> f64 {
        if self.distance_m == 0.0 {
            0.0
        } else {
            ((self.elevation_end_m - self.elevation_start_m) / self.distance_m).atan()
        }
    }
}

/// A segment placed on the map, with its energy annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub segment: Segment,
    pub energy_wh: f64,
}

/// Distance, duration and energy accumulated over part of a route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LegStats {
    pub distance_m: f64,
    pub duration_s: f64,
    pub energy_wh: f64,
}

impl Add for LegStats {
    type Output = LegStats;

    fn add(self, other: LegStats) -> LegStats {
        LegStats {
            distance_m: self.distance_m + other.distance_m,
            duration_s: self.duration_s + other.duration_s,
            energy_wh: self.energy_wh + other.energy_wh,
        }
    }
}

/// The segmenter's output: segment `i` runs from boundary point `i` to
/// boundary point `i + 1`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentedRoute {
    segments: Vec<RouteSegment>,
}

impl SegmentedRoute {
    pub fn from_segments(segments: Vec<RouteSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of boundary points (segments + 1, or 0 when empty).
    pub fn point_count(&self) -> usize {
        if self.segments.is_empty() {
            0
        } else {
            self.segments.len() + 1
        }
    }

    pub fn point(&self, index: usize) -> Option<(f64, f64)> {
        if index < self.segments.len() {
            Some(self.segments[index].start)
        } else if index == self.segments.len() {
            self.segments.last().map(|segment| segment.end)
        } else {
            None
        }
    }

    pub fn points(&self) -> Vec<(f64, f64)> {
        (0..self.point_count()).filter_map(|index| self.point(index)).collect()
    }

    /// Accumulated stats from boundary point `from` to boundary point `to`.
    /// Empty when `to <= from`.
    pub fn stats_between(&self, from: usize, to: usize) -> LegStats {
        let to = to.min(self.segments.len());
        if to <= from {
            return LegStats::default();
        }
        self.segments[from..to]
            .iter()
            .fold(LegStats::default(), |acc, segment| {
                acc + LegStats {
                    distance_m: segment.segment.distance_m,
                    duration_s: segment.segment.duration_s,
                    energy_wh: segment.energy_wh,
                }
            })
    }

    pub fn totals(&self) -> LegStats {
        self.stats_between(0, self.segments.len())
    }

    /// Boundary point closest to `location`.
    pub fn nearest_point(&self, location: (f64, f64)) -> Option<usize> {
        nearest_point_index(&self.points(), location)
    }
}

/// Flattens `route` into energy-annotated segments for `vehicle`.
pub fn segment_route<E: ElevationProvider>(
    route: &Route,
    vehicle: &Vehicle,
    air_density: f64,
    elevation: &E,
) -> Result<SegmentedRoute, EnergyError> {
    let steps: Vec<&RouteStep> = route
        .legs
        .iter()
        .flat_map(|leg| leg.steps.iter())
        .filter(|step| step_start(step).is_some())
        .collect();

    let mut segments = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        let mut boundaries: Vec<(f64, f64)> = step
            .intersections
            .iter()
            .map(|intersection| intersection.lat_lng())
            .collect();
        if boundaries.is_empty() {
            boundaries.extend(step_start(step));
        }
        let next = steps
            .get(index + 1)
            .and_then(|next| step_start(next))
            .or_else(|| step_end(step))
            .or_else(|| boundaries.last().copied());
        boundaries.extend(next);

        let geometry = step
            .geometry
            .as_ref()
            .map(|geometry| Polyline::from_lng_lat(&geometry.coordinates));
        let weights: Vec<f64> = boundaries
            .windows(2)
            .map(|pair| stretch_length(geometry.as_ref(), pair[0], pair[1]))
            .collect();
        let total_weight: f64 = weights.iter().sum();

        for (pair, weight) in boundaries.windows(2).zip(&weights) {
            let share = if total_weight > 0.0 {
                weight / total_weight
            } else {
                1.0 / weights.len() as f64
            };
            let segment = Segment::new(
                step.distance * share,
                step.duration * share,
                elevation.elevation_m(pair[0]),
                elevation.elevation_m(pair[1]),
            );
            let energy_wh = segment_energy_wh(&segment, vehicle, air_density)?;
            segments.push(RouteSegment {
                start: pair[0],
                end: pair[1],
                segment,
                energy_wh,
            });
        }
    }

    Ok(SegmentedRoute { segments })
}

fn step_start(step: &RouteStep) -> Option<(f64, f64)> {
    step.intersections
        .first()
        .map(|intersection| intersection.lat_lng())
        .or_else(|| {
            step.geometry
                .as_ref()
                .and_then(|geometry| geometry.coordinates.first())
                .map(|[lng, lat]| (*lat, *lng))
        })
}

fn step_end(step: &RouteStep) -> Option<(f64, f64)> {
    step.geometry
        .as_ref()
        .and_then(|geometry| geometry.coordinates.last())
        .map(|[lng, lat]| (*lat, *lng))
}

fn stretch_length(geometry: Option<&Polyline>, from: (f64, f64), to: (f64, f64)) -> f64 {
    geometry
        .and_then(|polyline| polyline.length_between(from, to))
        .filter(|length| *length > 0.0)
        .unwrap_or_else(|| haversine_m(from, to))
}
