//! Offline routes, stations and graphs.

use std::cell::Cell;

use ev_charge_planner::error::RoutingError;
use ev_charge_planner::graph::{ChargingGraph, Node};
use ev_charge_planner::haversine::haversine_m;
use ev_charge_planner::label::NodeId;
use ev_charge_planner::osrm::{Geometry, Intersection, Route, RouteLeg, RouteStep};
use ev_charge_planner::stations::{ChargingStation, OutletGroup};
use ev_charge_planner::traits::RouteProvider;

/// Routes along a straight line at constant speed, with an intersection
/// every `spacing_m` meters. Shaped like an OSRM `route` response.
#[derive(Debug, Clone)]
pub struct CorridorRouter {
    pub speed_mps: f64,
    pub spacing_m: f64,
}

impl Default for CorridorRouter {
    fn default() -> Self {
        Self {
            speed_mps: 25.0,
            spacing_m: 5_000.0,
        }
    }
}

impl CorridorRouter {
    pub fn new(speed_mps: f64, spacing_m: f64) -> Self {
        Self {
            speed_mps,
            spacing_m,
        }
    }
}

impl RouteProvider for CorridorRouter {
    fn route(&self, origin: (f64, f64), destination: (f64, f64)) -> Result<Route, RoutingError> {
        Ok(corridor_route(origin, destination, self.spacing_m, self.speed_mps))
    }
}

/// Counts calls and always fails, for error propagation tests.
#[derive(Debug, Default)]
pub struct BrokenRouter {
    pub calls: Cell<usize>,
}

impl RouteProvider for BrokenRouter {
    fn route(&self, _origin: (f64, f64), _destination: (f64, f64)) -> Result<Route, RoutingError> {
        self.calls.set(self.calls.get() + 1);
        Err(RoutingError::Engine {
            code: "NoRoute".to_string(),
            message: "Impossible route between points".to_string(),
        })
    }
}

fn lng_lat((lat, lng): (f64, f64)) -> [f64; 2] {
    [lng, lat]
}

/// A single-leg route from `origin` to `destination` with one step per
/// stretch, plus a zero-length arrive step.
pub fn corridor_route(
    origin: (f64, f64),
    destination: (f64, f64),
    spacing_m: f64,
    speed_mps: f64,
) -> Route {
    let total = haversine_m(origin, destination);
    let stretches = ((total / spacing_m).ceil() as usize).max(1);
    let points: Vec<(f64, f64)> = (0..=stretches)
        .map(|i| {
            let t = i as f64 / stretches as f64;
            (
                origin.0 + (destination.0 - origin.0) * t,
                origin.1 + (destination.1 - origin.1) * t,
            )
        })
        .collect();

    let mut steps: Vec<RouteStep> = points
        .windows(2)
        .map(|pair| {
            let distance = haversine_m(pair[0], pair[1]);
            RouteStep {
                distance,
                duration: distance / speed_mps,
                intersections: vec![Intersection {
                    location: lng_lat(pair[0]),
                }],
                geometry: Some(Geometry {
                    coordinates: vec![lng_lat(pair[0]), lng_lat(pair[1])],
                }),
            }
        })
        .collect();
    steps.push(RouteStep {
        distance: 0.0,
        duration: 0.0,
        intersections: vec![Intersection {
            location: lng_lat(destination),
        }],
        geometry: Some(Geometry {
            coordinates: vec![lng_lat(destination), lng_lat(destination)],
        }),
    });

    let distance: f64 = steps.iter().map(|step| step.distance).sum();
    let duration: f64 = steps.iter().map(|step| step.duration).sum();
    Route {
        distance,
        duration,
        legs: vec![RouteLeg {
            distance,
            duration,
            steps,
        }],
        geometry: Some(Geometry {
            coordinates: points.iter().copied().map(lng_lat).collect(),
        }),
    }
}

/// `(lat, lng)` that is `km` kilometres north of `origin`.
pub fn north_of(origin: (f64, f64), km: f64) -> (f64, f64) {
    (origin.0 + km / 111.195, origin.1)
}

/// `(lat, lng)` roughly `km` kilometres east of `origin`.
pub fn east_of(origin: (f64, f64), km: f64) -> (f64, f64) {
    let km_per_degree = 111.195 * origin.0.to_radians().cos();
    (origin.0, origin.1 + km / km_per_degree)
}

pub fn outlet(capacity_kw: u16, price_per_kwh: Option<f64>, price_per_minute: Option<f64>) -> OutletGroup {
    OutletGroup {
        capacity_kw: f64::from(capacity_kw),
        price_per_kwh,
        price_per_minute,
    }
}

/// A station `offset_km` east of the corridor point `along_km` north of
/// `origin`.
pub fn station_beside(
    slug: &str,
    origin: (f64, f64),
    along_km: f64,
    offset_km: f64,
    outlets: Vec<OutletGroup>,
) -> ChargingStation {
    let location = east_of(north_of(origin, along_km), offset_km);
    ChargingStation::new(slug, location, outlets)
}

/// Builds a graph edge by edge: `(from, to, distance m, duration s, energy Wh)`.
pub struct GraphBuilder {
    graph: ChargingGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        let mut graph = ChargingGraph::new();
        graph.add_node(NodeId::start(), Node::Start { location: (57.0, 14.0) });
        graph.add_node(NodeId::destination(), Node::Destination { location: (58.0, 14.0) });
        Self { graph }
    }

    pub fn node(mut self, id: &str, node: Node) -> Self {
        self.graph.add_node(id.parse().unwrap(), node);
        self
    }

    pub fn road(self, id: &str) -> Self {
        let location = (57.5, 14.0);
        let id_parsed: NodeId = id.parse().unwrap();
        let node = match id.chars().next() {
            Some('a') => Node::Approach { location },
            Some('i') => Node::Entry {
                location,
                slug: format!("station-{}", id_parsed.number.unwrap_or_default()),
            },
            Some('o') => Node::Exit { location },
            Some('b') => Node::Return { location },
            _ => panic!("not a road node: {}", id),
        };
        self.node(id, node)
    }

    pub fn charge_level(self, id: &str, price_per_kwh: Option<f64>, price_per_minute: Option<f64>) -> Self {
        let id_parsed: NodeId = id.parse().unwrap();
        let (percent, capacity_kw) = id_parsed.suffix.unwrap();
        self.node(
            id,
            Node::ChargeLevel {
                percent,
                price_per_kwh,
                price_per_minute,
                capacity_kw,
                power_kw: f64::from(capacity_kw),
            },
        )
    }

    pub fn edge(mut self, from: &str, to: &str, distance_m: f64, duration_s: Option<f64>, energy_wh: f64) -> Self {
        self.graph
            .add_edge(from.parse().unwrap(), to.parse().unwrap(), distance_m, duration_s, energy_wh)
            .unwrap();
        self
    }

    pub fn build(self) -> ChargingGraph {
        self.graph
    }
}

/// One station between start and destination, reference vehicle in mind:
///
/// - s → a0: 2.0 kWh, 600 s
/// - a0 → i0 and o0 → b0: 0.1 kWh, 60 s each
/// - b0 → d: 3.0 kWh, 900 s
/// - charge levels 10..=100 % on a cheap 50 kW and a pricey 150 kW outlet
pub fn single_station_graph() -> ChargingGraph {
    let mut builder = GraphBuilder::new()
        .road("a0")
        .road("i0")
        .road("o0")
        .road("b0")
        .edge("s", "a0", 15_000.0, Some(600.0), 2_000.0)
        .edge("a0", "i0", 1_000.0, Some(60.0), 100.0)
        .edge("o0", "b0", 1_000.0, Some(60.0), 100.0)
        .edge("a0", "b0", 0.0, Some(0.0), 0.0)
        .edge("b0", "d", 22_000.0, Some(900.0), 3_000.0);

    for (capacity, price) in [(50, 3.0), (150, 6.0)] {
        for percent in (10..=100).step_by(10) {
            let id = format!("c0-{}-{}", percent, capacity);
            builder = builder
                .charge_level(&id, Some(price), None)
                .edge("i0", &id, 0.0, None, 0.0)
                .edge(&id, "o0", 0.0, Some(300.0), 0.0);
        }
    }
    builder.build()
}
