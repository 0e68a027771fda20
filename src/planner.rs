//! End-to-end planning pipeline.
//!
//! route → segments → stations → charging graph → label-setting search.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PlannerError;
use crate::graph::{ChargingGraph, GraphOptions, build_charging_graph};
use crate::osrm::{OsrmClient, OsrmConfig};
use crate::search::{ChargingPath, CostField, LabelSetting, SearchOptions, SearchStats};
use crate::segment::{LegStats, SegmentedRoute, segment_route};
use crate::stations::{ChargingStation, StationApiClient, StationApiConfig};
use crate::traits::{ElevationProvider, FlatTerrain, RouteProvider, StationDirectory};
use crate::vehicle::Vehicle;

/// Everything needed to stand up a planner, loadable from one JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub vehicle: Vehicle,
    pub graph: GraphOptions,
    pub search: SearchOptions,
    pub osrm: OsrmConfig,
    pub stations: StationApiConfig,
}

impl PlannerConfig {
    pub fn from_json(json: &str) -> Result<Self, PlannerError> {
        let mut config: PlannerConfig =
            serde_json::from_str(json).map_err(|err| PlannerError::Config(err.to_string()))?;
        config.vehicle = config.vehicle.resolve()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// A planner backed by OSRM and the station pricing service.
    pub fn build_planner(&self) -> Result<Planner<OsrmClient, StationApiClient>, PlannerError> {
        let router = OsrmClient::new(self.osrm.clone())?;
        let stations = StationApiClient::new(self.stations.clone())?;
        Ok(Planner::new(router, stations, self.vehicle.clone())
            .with_graph_options(self.graph.clone())
            .with_search_options(self.search.clone()))
    }
}

/// A route with its stations and charging graph, ready to search under any
/// criterion.
#[derive(Debug, Clone)]
pub struct PreparedRoute {
    pub route: SegmentedRoute,
    pub stations: Vec<ChargingStation>,
    pub graph: ChargingGraph,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub route_totals: LegStats,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub stats: SearchStats,
    /// `None` when no battery-feasible path exists.
    pub path: Option<ChargingPath>,
}

pub struct Planner<R, S, E = FlatTerrain> {
    router: R,
    stations: S,
    elevation: E,
    vehicle: Vehicle,
    graph_options: GraphOptions,
    search_options: SearchOptions,
}

impl<R, S> Planner<R, S, FlatTerrain>
where
    R: RouteProvider,
    S: StationDirectory,
{
    pub fn new(router: R, stations: S, vehicle: Vehicle) -> Self {
        Self {
            router,
            stations,
            elevation: FlatTerrain,
            vehicle,
            graph_options: GraphOptions::default(),
            search_options: SearchOptions::default(),
        }
    }
}

impl<R, S, E> Planner<R, S, E>
where
    R: RouteProvider,
    S: StationDirectory,
    E: ElevationProvider,
{
    pub fn with_elevation<E2: ElevationProvider>(self, elevation: E2) -> Planner<R, S, E2> {
        Planner {
            router: self.router,
            stations: self.stations,
            elevation,
            vehicle: self.vehicle,
            graph_options: self.graph_options,
            search_options: self.search_options,
        }
    }

    pub fn with_graph_options(mut self, options: GraphOptions) -> Self {
        self.graph_options = options;
        self
    }

    /// Defaults for everything but the criterion and initial SoC, which
    /// each plan supplies.
    pub fn with_search_options(mut self, options: SearchOptions) -> Self {
        self.search_options = options;
        self
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn graph_options(&self) -> &GraphOptions {
        &self.graph_options
    }

    /// Routes, segments and builds the charging graph without searching.
    pub fn prepare(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
    ) -> Result<PreparedRoute, PlannerError> {
        let road = self.router.route(origin, destination)?;
        let route = segment_route(
            &road,
            &self.vehicle,
            self.graph_options.air_density,
            &self.elevation,
        )?;
        let stations = self.stations.stations_along(origin, destination)?;
        let graph = build_charging_graph(
            &route,
            &stations,
            &self.router,
            &self.elevation,
            &self.vehicle,
            &self.graph_options,
        )?;
        Ok(PreparedRoute {
            route,
            stations,
            graph,
        })
    }

    /// Searches an already prepared route.
    pub fn search(
        &self,
        prepared: &PreparedRoute,
        criterion: CostField,
        initial_soc_kwh: f64,
    ) -> Result<(Option<ChargingPath>, SearchStats), PlannerError> {
        let options = SearchOptions {
            criterion,
            initial_soc_kwh: Some(initial_soc_kwh),
            ..self.search_options.clone()
        };
        let mut search = LabelSetting::new(&prepared.graph, &self.vehicle, options)?;
        let path = search.run()?;
        Ok((path, search.stats()))
    }

    pub fn plan(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
        criterion: CostField,
        initial_soc_kwh: f64,
    ) -> Result<PlanOutcome, PlannerError> {
        let prepared = self.prepare(origin, destination)?;
        let (path, stats) = self.search(&prepared, criterion, initial_soc_kwh)?;
        let route_totals = prepared.route.totals();

        info!(
            ?criterion,
            distance_m = route_totals.distance_m,
            nodes = prepared.graph.node_count(),
            feasible = path.is_some(),
            cost = ?path.as_ref().map(ChargingPath::optimized_cost),
            "planned route"
        );

        Ok(PlanOutcome {
            route_totals,
            graph_nodes: prepared.graph.node_count(),
            graph_edges: prepared.graph.edge_count(),
            stats,
            path,
        })
    }
}
