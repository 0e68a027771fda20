//! Batch experiment harness.
//!
//! Each request is planned once and searched under both criteria on the
//! same graph. Requests run in parallel; a failing request yields an error
//! in its own slot and does not stop the batch.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codec::encode_label;
use crate::error::{CodecError, PlannerError};
use crate::planner::Planner;
use crate::search::{ChargingPath, CostField, SearchStats};
use crate::segment::LegStats;
use crate::traits::{ElevationProvider, RouteProvider, StationDirectory};

/// Share of battery capacity a run starts with when the request has none.
pub const DEFAULT_INITIAL_SOC_FRACTION: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub id: String,
    pub origin: (f64, f64),
    pub destination: (f64, f64),
    #[serde(default)]
    pub initial_soc_kwh: Option<f64>,
}

impl RouteRequest {
    pub fn new(id: impl Into<String>, origin: (f64, f64), destination: (f64, f64)) -> Self {
        Self {
            id: id.into(),
            origin,
            destination,
            initial_soc_kwh: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion: CostField,
    pub feasible: bool,
    pub optimized_cost: Option<f64>,
    pub duration_s: Option<f64>,
    pub financial_cost: Option<f64>,
    pub charging_stops: Option<u32>,
    pub search_ms: u64,
    pub stats: SearchStats,
    /// Winning chain, one hex-encoded packed label per step.
    pub packed_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub request: RouteRequest,
    pub initial_soc_kwh: f64,
    pub route: LegStats,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub total_outlets: usize,
    pub usable_outlets: usize,
    pub preparation_ms: u64,
    pub results: Vec<CriterionResult>,
}

impl ExperimentRecord {
    pub fn result(&self, criterion: CostField) -> Option<&CriterionResult> {
        self.results.iter().find(|result| result.criterion == criterion)
    }
}

fn pack_path(path: &ChargingPath) -> Result<Vec<String>, CodecError> {
    path.labels
        .iter()
        .map(|label| -> Result<String, CodecError> {
            let bytes = encode_label(label)?;
            Ok(bytes.iter().map(|byte| format!("{:02x}", byte)).collect())
        })
        .collect()
}

/// Plans one request under every criterion.
pub fn run_experiment<R, S, E>(
    planner: &Planner<R, S, E>,
    request: &RouteRequest,
) -> Result<ExperimentRecord, PlannerError>
where
    R: RouteProvider,
    S: StationDirectory,
    E: ElevationProvider,
{
    let started = Instant::now();
    let prepared = planner.prepare(request.origin, request.destination)?;
    let preparation_ms = started.elapsed().as_millis() as u64;

    let minimum_capacity_kw = planner.graph_options().minimum_capacity_kw;
    let total_outlets: usize = prepared
        .stations
        .iter()
        .map(|station| station.outlets.len())
        .sum();
    let usable_outlets = prepared
        .stations
        .iter()
        .flat_map(|station| &station.outlets)
        .filter(|outlet| outlet.is_usable(minimum_capacity_kw))
        .count();

    let capacity = planner.vehicle().battery_capacity_kwh;
    let initial_soc_kwh = request
        .initial_soc_kwh
        .unwrap_or(capacity * DEFAULT_INITIAL_SOC_FRACTION);

    let mut results = Vec::with_capacity(CostField::ALL.len());
    for criterion in CostField::ALL {
        let started = Instant::now();
        let (path, stats) = planner.search(&prepared, criterion, initial_soc_kwh)?;
        let search_ms = started.elapsed().as_millis() as u64;

        let packed_path = match path.as_ref().map(pack_path) {
            Some(Ok(packed)) => packed,
            Some(Err(err)) => {
                warn!(
                    id = %request.id,
                    criterion = ?criterion,
                    error = %err,
                    "path does not fit the label codec, stored unpacked"
                );
                Vec::new()
            }
            None => Vec::new(),
        };
        results.push(CriterionResult {
            criterion,
            feasible: path.is_some(),
            optimized_cost: path.as_ref().map(ChargingPath::optimized_cost),
            duration_s: path.as_ref().map(ChargingPath::total_duration_s),
            financial_cost: path.as_ref().map(ChargingPath::total_financial_cost),
            charging_stops: path.as_ref().map(ChargingPath::charging_stops),
            search_ms,
            stats,
            packed_path,
        });
    }

    let record = ExperimentRecord {
        request: request.clone(),
        initial_soc_kwh,
        route: prepared.route.totals(),
        graph_nodes: prepared.graph.node_count(),
        graph_edges: prepared.graph.edge_count(),
        total_outlets,
        usable_outlets,
        preparation_ms,
        results,
    };
    info!(
        id = %record.request.id,
        nodes = record.graph_nodes,
        edges = record.graph_edges,
        outlets = record.usable_outlets,
        total_outlets = record.total_outlets,
        "experiment finished"
    );
    Ok(record)
}

/// Runs every request in parallel. Results keep request order.
pub fn run_batch<R, S, E>(
    planner: &Planner<R, S, E>,
    requests: &[RouteRequest],
) -> Vec<Result<ExperimentRecord, PlannerError>>
where
    R: RouteProvider + Sync,
    S: StationDirectory + Sync,
    E: ElevationProvider + Sync,
{
    requests
        .par_iter()
        .map(|request| {
            let result = run_experiment(planner, request);
            if let Err(err) = &result {
                warn!(id = %request.id, error = %err, "experiment failed");
            }
            result
        })
        .collect()
}
