//! Augmented charging graph.
//!
//! The road route is threaded through every usable station as a diamond:
//!
//! ```text
//!          ┌──────────── bypass ────────────┐
//! prev ── aᵢ ── detour ── iᵢ ── cᵢ,L,C ── oᵢ ── detour back ── bᵢ ── next
//! ```
//!
//! so the search chooses between skipping a station and charging to one of
//! its levels with the same edge relaxation. Nodes live in an arena indexed
//! by [`NodeId`]; edges are adjacency lists of ids, never references.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::energy::AIR_DENSITY;
use crate::error::GraphError;
use crate::label::{NodeId, NodeKind};
use crate::segment::{LegStats, SegmentedRoute, segment_route};
use crate::stations::ChargingStation;
use crate::traits::{ElevationProvider, RouteProvider};
use crate::vehicle::Vehicle;

/// Payload of a graph node. Every role but charge levels has a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Start {
        location: (f64, f64),
    },
    Destination {
        location: (f64, f64),
    },
    Approach {
        location: (f64, f64),
    },
    Entry {
        location: (f64, f64),
        slug: String,
    },
    ChargeLevel {
        percent: u16,
        price_per_kwh: Option<f64>,
        price_per_minute: Option<f64>,
        /// Whole kW, as carried in the node id.
        capacity_kw: u16,
        /// Rated outlet power, kW.
        power_kw: f64,
    },
    Exit {
        location: (f64, f64),
    },
    Return {
        location: (f64, f64),
    },
}

impl Node {
    pub fn location(&self) -> Option<(f64, f64)> {
        match self {
            Node::Start { location }
            | Node::Destination { location }
            | Node::Approach { location }
            | Node::Entry { location, .. }
            | Node::Exit { location }
            | Node::Return { location } => Some(*location),
            Node::ChargeLevel { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub to: NodeId,
    pub distance_m: f64,
    /// Unset where the time depends on the traversing label (charging).
    pub duration_s: Option<f64>,
    /// Positive draws from the battery.
    pub energy_wh: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    pub charge_level_step_percent: u16,
    /// Plugging in, paying and unplugging, s.
    pub overhead_duration_s: f64,
    pub minimum_capacity_kw: u16,
    pub air_density: f64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            charge_level_step_percent: 10,
            overhead_duration_s: 300.0,
            minimum_capacity_kw: 0,
            air_density: AIR_DENSITY,
        }
    }
}

impl GraphOptions {
    /// Coarser levels and fast outlets only, for large batches.
    pub fn high_volume() -> Self {
        Self {
            charge_level_step_percent: 25,
            minimum_capacity_kw: 22,
            ..Self::default()
        }
    }

    /// Target percentages emitted per outlet: step, 2·step, ... up to 100.
    pub fn charge_levels(&self) -> Result<Vec<u16>, GraphError> {
        let step = self.charge_level_step_percent;
        if step == 0 || step > 100 {
            return Err(GraphError::InvalidOptions(format!(
                "charge level step must be in 1..=100, got {}",
                step
            )));
        }
        Ok((step..=100).step_by(step as usize).collect())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargingGraph {
    nodes: Vec<(NodeId, Node)>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Vec<Edge>>,
    charge_levels: Vec<u16>,
}

impl ChargingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, or replaces the payload of an existing one.
    pub fn add_node(&mut self, id: NodeId, node: Node) {
        match self.index.get(&id) {
            Some(&slot) => self.nodes[slot].1 = node,
            None => {
                self.index.insert(id, self.nodes.len());
                self.nodes.push((id, node));
                self.edges.push(Vec::new());
            }
        }
    }

    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        distance_m: f64,
        duration_s: Option<f64>,
        energy_wh: f64,
    ) -> Result<(), GraphError> {
        if !self.index.contains_key(&to) {
            return Err(GraphError::UnknownNode(to));
        }
        let slot = *self.index.get(&from).ok_or(GraphError::UnknownNode(from))?;
        self.edges[slot].push(Edge {
            to,
            distance_m,
            duration_s,
            energy_wh,
        });
        Ok(())
    }

    fn add_leg(&mut self, from: NodeId, to: NodeId, stats: LegStats) -> Result<(), GraphError> {
        self.add_edge(
            from,
            to,
            stats.distance_m,
            Some(stats.duration_s),
            stats.energy_wh,
        )
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&slot| &self.nodes[slot].1)
    }

    /// Outgoing edges; empty for unknown nodes.
    pub fn edges_from(&self, id: &NodeId) -> &[Edge] {
        self.index
            .get(id)
            .map(|&slot| self.edges[slot].as_slice())
            .unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// Node ids in the order they were created.
    pub fn creation_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|(id, _)| *id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Node)> + '_ {
        self.nodes.iter().map(|(id, node)| (id, node))
    }

    /// Station numbers that received a sub-graph, in route order.
    pub fn stations(&self) -> Vec<u16> {
        self.nodes
            .iter()
            .filter(|(id, _)| id.kind == NodeKind::Entry)
            .filter_map(|(id, _)| id.number)
            .collect()
    }

    fn all_edges(&self) -> impl Iterator<Item = (NodeId, &Edge)> + '_ {
        self.nodes
            .iter()
            .zip(&self.edges)
            .flat_map(|((from, _), edges)| edges.iter().map(move |edge| (*from, edge)))
    }

    /// Checks that every station has `outlets × levels` charge-level nodes,
    /// each entered only from its own entry node and left only to its own
    /// exit node.
    pub fn validate_station_subgraphs(&self) -> Result<(), GraphError> {
        let mut capacities: BTreeMap<u16, BTreeSet<u16>> = BTreeMap::new();
        let mut counts: BTreeMap<u16, usize> = BTreeMap::new();

        for (id, node) in self.nodes() {
            if id.kind != NodeKind::ChargeLevel {
                continue;
            }
            let (station, capacity) = match (id.number, node) {
                (Some(station), Node::ChargeLevel { capacity_kw, .. }) => (station, *capacity_kw),
                _ => {
                    return Err(GraphError::InvalidStationSubgraph {
                        station: id.number.unwrap_or_default(),
                        reason: format!("{} is not a numbered charge level", id),
                    });
                }
            };
            capacities.entry(station).or_default().insert(capacity);
            *counts.entry(station).or_default() += 1;

            for edge in self.edges_from(id) {
                if edge.to != NodeId::exit(station) {
                    return Err(GraphError::InvalidStationSubgraph {
                        station,
                        reason: format!("{} leads to {}", id, edge.to),
                    });
                }
            }
        }

        for (from, edge) in self.all_edges() {
            if edge.to.kind != NodeKind::ChargeLevel {
                continue;
            }
            let station = edge.to.number.unwrap_or_default();
            if from != NodeId::entry(station) {
                return Err(GraphError::InvalidStationSubgraph {
                    station,
                    reason: format!("{} is reached from {}", edge.to, from),
                });
            }
        }

        for station in self.stations() {
            let outlets = capacities.get(&station).map(BTreeSet::len).unwrap_or(0);
            let found = counts.get(&station).copied().unwrap_or(0);
            let expected = outlets * self.charge_levels.len();
            if outlets == 0 || found != expected {
                return Err(GraphError::InvalidStationSubgraph {
                    station,
                    reason: format!(
                        "{} charge levels for {} outlets, expected {}",
                        found, outlets, expected
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Builds the augmented graph for `route`.
///
/// Stations are embedded in the order of their nearest route point; ties
/// keep input order. Detours are routed with `router` in both directions.
pub fn build_charging_graph<R, E>(
    route: &SegmentedRoute,
    stations: &[ChargingStation],
    router: &R,
    elevation: &E,
    vehicle: &Vehicle,
    options: &GraphOptions,
) -> Result<ChargingGraph, GraphError>
where
    R: RouteProvider,
    E: ElevationProvider,
{
    let (Some(first), Some(last)) = (route.point(0), route.point(route.point_count().saturating_sub(1)))
    else {
        return Err(GraphError::EmptyRoute);
    };
    let charge_levels = options.charge_levels()?;

    let mut graph = ChargingGraph {
        charge_levels: charge_levels.clone(),
        ..ChargingGraph::default()
    };
    graph.add_node(NodeId::start(), Node::Start { location: first });

    let mut ordered: Vec<(usize, &ChargingStation)> = stations
        .iter()
        .filter_map(|station| {
            route
                .nearest_point(station.location.lat_lng())
                .map(|index| (index, station))
        })
        .collect();
    ordered.sort_by_key(|(index, _)| *index);

    let detour = |from: (f64, f64), to: (f64, f64)| -> Result<LegStats, GraphError> {
        let leg = router.route(from, to)?;
        Ok(segment_route(&leg, vehicle, options.air_density, elevation)?.totals())
    };

    let mut frontier = NodeId::start();
    let mut frontier_point = 0;

    for (position, (nearest, station)) in ordered.iter().enumerate() {
        let outlets = station.usable_outlets(options.minimum_capacity_kw);
        if outlets.is_empty() {
            warn!(slug = %station.slug, "skipping station without usable outlets");
            continue;
        }
        let number =
            u16::try_from(position).map_err(|_| GraphError::TooManyStations(ordered.len()))?;
        let Some(junction) = route.point(*nearest) else {
            continue;
        };
        let station_location = station.location.lat_lng();

        let approach = NodeId::approach(number);
        graph.add_node(approach, Node::Approach { location: junction });
        graph.add_leg(frontier, approach, route.stats_between(frontier_point, *nearest))?;

        let entry = NodeId::entry(number);
        graph.add_node(
            entry,
            Node::Entry {
                location: station_location,
                slug: station.slug.clone(),
            },
        );
        graph.add_leg(approach, entry, detour(junction, station_location)?)?;

        let exit = NodeId::exit(number);
        graph.add_node(exit, Node::Exit { location: station_location });

        for outlet in &outlets {
            for percent in &charge_levels {
                let level = NodeId::charge_level(number, *percent, outlet.node_capacity_kw());
                graph.add_node(
                    level,
                    Node::ChargeLevel {
                        percent: *percent,
                        price_per_kwh: outlet.price_per_kwh,
                        price_per_minute: outlet.price_per_minute,
                        capacity_kw: outlet.node_capacity_kw(),
                        power_kw: outlet.capacity_kw,
                    },
                );
                graph.add_edge(entry, level, 0.0, None, 0.0)?;
                graph.add_edge(level, exit, 0.0, Some(options.overhead_duration_s), 0.0)?;
            }
        }

        let ret = NodeId::ret(number);
        graph.add_node(ret, Node::Return { location: junction });
        graph.add_leg(exit, ret, detour(station_location, junction)?)?;
        graph.add_edge(approach, ret, 0.0, Some(0.0), 0.0)?;

        debug!(
            slug = %station.slug,
            station = number,
            route_point = nearest,
            outlets = outlets.len(),
            "embedded station"
        );
        frontier = ret;
        frontier_point = *nearest;
    }

    let destination = NodeId::destination();
    graph.add_node(destination, Node::Destination { location: last });
    graph.add_leg(
        frontier,
        destination,
        route.stats_between(frontier_point, route.segments().len()),
    )?;

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        stations = graph.stations().len(),
        "charging graph built"
    );
    Ok(graph)
}
