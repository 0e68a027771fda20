//! Label-setting path search over the charging graph.
//!
//! Labels are settled in non-decreasing order of the active cost field
//! (cumulative duration breaks ties). A label is only created if the battery
//! stays at or above the SoC floor, so every settled label is feasible.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::graph::{ChargingGraph, Edge, Node};
use crate::label::{Label, LabelId, NodeId};
use crate::vehicle::Vehicle;

/// Cost field the search minimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CostField {
    CumulativeDuration,
    CumulativeFinancialCost,
}

impl CostField {
    pub const ALL: [CostField; 2] = [CostField::CumulativeDuration, CostField::CumulativeFinancialCost];

    pub fn of(self, label: &Label) -> f64 {
        match self {
            CostField::CumulativeDuration => label.cumulative_duration,
            CostField::CumulativeFinancialCost => label.cumulative_financial_cost,
        }
    }
}

/// Charge curve: constant power up to the taper threshold, then a reduced
/// rate up to the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargingModel {
    pub efficiency: f64,
    /// Fraction of battery capacity where charging slows down.
    pub taper_threshold: f64,
    /// Rate multiplier above the threshold.
    pub taper_rate: f64,
}

impl Default for ChargingModel {
    fn default() -> Self {
        Self {
            efficiency: 0.9,
            taper_threshold: 0.8,
            taper_rate: 0.5,
        }
    }
}

impl ChargingModel {
    /// Seconds to charge from `soc_kwh` to `target_kwh` on an outlet of
    /// `capacity_kw`. Zero when the battery is already at or above target,
    /// `None` when the outlet cannot deliver anything.
    pub fn duration_s(
        &self,
        soc_kwh: f64,
        target_kwh: f64,
        capacity_kw: f64,
        battery_capacity_kwh: f64,
    ) -> Option<f64> {
        if target_kwh <= soc_kwh {
            return Some(0.0);
        }
        if capacity_kw <= 0.0 || self.efficiency <= 0.0 || self.taper_rate <= 0.0 {
            return None;
        }
        let threshold = battery_capacity_kwh * self.taper_threshold;
        let fast_kwh = (target_kwh.min(threshold) - soc_kwh).max(0.0);
        let slow_kwh = (target_kwh - soc_kwh.max(threshold)).max(0.0);

        let fast_rate = capacity_kw * self.efficiency;
        let slow_rate = fast_rate * self.taper_rate;
        Some((fast_kwh / fast_rate + slow_kwh / slow_rate) * 3600.0)
    }
}

/// Seconds to charge with the default [`ChargingModel`].
pub fn charging_duration_s(
    soc_kwh: f64,
    target_kwh: f64,
    capacity_kw: f64,
    battery_capacity_kwh: f64,
) -> Option<f64> {
    ChargingModel::default().duration_s(soc_kwh, target_kwh, capacity_kw, battery_capacity_kwh)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub criterion: CostField,
    /// Battery charge at the start, kWh. Full battery when unset.
    pub initial_soc_kwh: Option<f64>,
    /// SoC floor, kWh. 10 % of capacity when unset.
    pub min_soc_kwh: Option<f64>,
    /// Drop labels dominated on the active cost field and energy. Faster,
    /// but may discard labels that are better on the other cost field.
    /// Cumulative energy always takes part in the comparison, so a cheaper
    /// label with less charge left never evicts one with more.
    pub dominance_pruning: bool,
    pub charging: ChargingModel,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            criterion: CostField::CumulativeDuration,
            initial_soc_kwh: None,
            min_soc_kwh: None,
            dominance_pruning: false,
            charging: ChargingModel::default(),
        }
    }
}

impl SearchOptions {
    pub fn new(criterion: CostField, initial_soc_kwh: f64) -> Self {
        Self {
            criterion,
            initial_soc_kwh: Some(initial_soc_kwh),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub created: usize,
    pub settled: usize,
    pub infeasible: usize,
    pub dominated: usize,
}

/// Outcome of one [`LabelSetting::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A label was settled and its successors generated.
    Settled(LabelId),
    /// The destination label was settled; the search is over.
    Reached(LabelId),
    /// The open set ran dry without reaching the destination.
    Exhausted,
}

type OpenEntry = Reverse<(OrderedFloat<f64>, OrderedFloat<f64>, LabelId)>;

/// One search run. Owns all of its state; independent runs share nothing.
#[derive(Debug)]
pub struct LabelSetting<'g> {
    graph: &'g ChargingGraph,
    options: SearchOptions,
    battery_capacity_kwh: f64,
    initial_soc_kwh: f64,
    min_soc_kwh: f64,
    labels: Vec<Label>,
    open: BinaryHeap<OpenEntry>,
    evicted: HashSet<LabelId>,
    open_at: HashMap<NodeId, Vec<LabelId>>,
    closed_at: HashMap<NodeId, Vec<LabelId>>,
    settled: Vec<LabelId>,
    outcome: Option<Step>,
    stats: SearchStats,
}

impl<'g> LabelSetting<'g> {
    pub fn new(
        graph: &'g ChargingGraph,
        vehicle: &Vehicle,
        options: SearchOptions,
    ) -> Result<Self, SearchError> {
        for id in [NodeId::start(), NodeId::destination()] {
            if !graph.contains(&id) {
                return Err(SearchError::UnknownNode(id));
            }
        }
        let battery_capacity_kwh = vehicle.battery_capacity_kwh;
        let initial_soc_kwh = options
            .initial_soc_kwh
            .unwrap_or(battery_capacity_kwh)
            .min(battery_capacity_kwh);
        let min_soc_kwh = options.min_soc_kwh.unwrap_or(battery_capacity_kwh * 0.1);

        let mut search = Self {
            graph,
            options,
            battery_capacity_kwh,
            initial_soc_kwh,
            min_soc_kwh,
            labels: Vec::new(),
            open: BinaryHeap::new(),
            evicted: HashSet::new(),
            open_at: HashMap::new(),
            closed_at: HashMap::new(),
            settled: Vec::new(),
            outcome: None,
            stats: SearchStats::default(),
        };
        if initial_soc_kwh >= min_soc_kwh {
            search.push(Label::start(NodeId::start()));
        } else {
            search.stats.infeasible += 1;
        }
        Ok(search)
    }

    pub fn label(&self, id: LabelId) -> Option<&Label> {
        self.labels.get(id.0 as usize)
    }

    /// Settled labels in the order they left the open set.
    pub fn settled_labels(&self) -> impl Iterator<Item = &Label> + '_ {
        self.settled.iter().filter_map(|id| self.label(*id))
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn initial_soc_kwh(&self) -> f64 {
        self.initial_soc_kwh
    }

    pub fn min_soc_kwh(&self) -> f64 {
        self.min_soc_kwh
    }

    /// Settles the cheapest open label. Once the search has ended, repeats
    /// the final outcome.
    pub fn step(&mut self) -> Result<Step, SearchError> {
        if let Some(outcome) = self.outcome {
            return Ok(outcome);
        }
        let Some(id) = self.pop_open() else {
            self.outcome = Some(Step::Exhausted);
            return Ok(Step::Exhausted);
        };

        let label = self.labels[id.0 as usize].clone();
        self.settled.push(id);
        self.stats.settled += 1;
        self.closed_at.entry(label.node).or_default().push(id);

        if label.node == NodeId::destination() {
            self.outcome = Some(Step::Reached(id));
            return Ok(Step::Reached(id));
        }

        let graph = self.graph;
        for edge in graph.edges_from(&label.node) {
            let Some(next) = self.extend(&label, edge)? else {
                self.stats.infeasible += 1;
                continue;
            };
            if self.options.dominance_pruning && !self.admit(&next) {
                self.stats.dominated += 1;
                continue;
            }
            self.push(next);
        }
        Ok(Step::Settled(id))
    }

    /// Runs to completion. `Ok(None)` when no battery-feasible path exists.
    pub fn run(&mut self) -> Result<Option<ChargingPath>, SearchError> {
        loop {
            match self.step()? {
                Step::Settled(_) => continue,
                Step::Reached(id) => {
                    let path = self.path_to(id);
                    debug!(stats = ?self.stats, "search reached destination");
                    info!(
                        criterion = ?self.options.criterion,
                        cost = path.optimized_cost(),
                        duration_s = path.total_duration_s(),
                        charging_stops = path.charging_stops(),
                        "path found"
                    );
                    return Ok(Some(path));
                }
                Step::Exhausted => {
                    warn!(
                        criterion = ?self.options.criterion,
                        initial_soc_kwh = self.initial_soc_kwh,
                        min_soc_kwh = self.min_soc_kwh,
                        stats = ?self.stats,
                        "no battery-feasible path"
                    );
                    return Ok(None);
                }
            }
        }
    }

    fn pop_open(&mut self) -> Option<LabelId> {
        while let Some(Reverse((_, _, id))) = self.open.pop() {
            if self.evicted.remove(&id) {
                continue;
            }
            let node = self.labels[id.0 as usize].node;
            if let Some(siblings) = self.open_at.get_mut(&node) {
                siblings.retain(|sibling| *sibling != id);
            }
            return Some(id);
        }
        None
    }

    fn push(&mut self, mut label: Label) {
        let id = LabelId(self.labels.len() as u32);
        label.id = id;
        if id.0 == 0 {
            label.predecessor = id;
        }
        let key = (
            OrderedFloat(self.options.criterion.of(&label)),
            OrderedFloat(label.cumulative_duration),
            id,
        );
        self.open.push(Reverse(key));
        self.open_at.entry(label.node).or_default().push(id);
        self.labels.push(label);
        self.stats.created += 1;
    }

    /// Builds the label for traversing `edge` from `label`, or `None` when
    /// it would break the SoC floor.
    fn extend(&self, label: &Label, edge: &Edge) -> Result<Option<Label>, SearchError> {
        let node = self
            .graph
            .node(&edge.to)
            .ok_or(SearchError::UnknownNode(edge.to))?;

        let mut next = label.clone();
        next.node = edge.to;
        next.preceding_node = Some(label.node);
        next.predecessor = label.id;
        next.cumulative_distance += edge.distance_m;

        match node {
            Node::ChargeLevel {
                percent,
                price_per_kwh,
                price_per_minute,
                power_kw,
                ..
            } => {
                let soc = label.state_of_charge(self.initial_soc_kwh);
                let target = self.battery_capacity_kwh * f64::from(*percent) / 100.0;
                let delivered = (target - soc).max(0.0);
                let Some(duration) = self.options.charging.duration_s(
                    soc,
                    target,
                    *power_kw,
                    self.battery_capacity_kwh,
                ) else {
                    return Ok(None);
                };
                let cost = duration / 60.0 * price_per_minute.unwrap_or(0.0)
                    + delivered * price_per_kwh.unwrap_or(0.0);

                next.cumulative_duration += duration;
                next.cumulative_power -= delivered;
                next.cumulative_financial_cost += cost;
                next.charging_duration += duration;
                next.charging_energy += delivered;
                if delivered > 0.0 {
                    next.charging_stops += 1;
                }
            }
            Node::Start { .. }
            | Node::Destination { .. }
            | Node::Approach { .. }
            | Node::Entry { .. }
            | Node::Exit { .. }
            | Node::Return { .. } => {
                let duration = edge.duration_s.ok_or(SearchError::MissingEdgeDuration {
                    from: label.node,
                    to: edge.to,
                })?;
                next.cumulative_duration += duration;
                next.cumulative_power += edge.energy_wh / 1000.0;
            }
        }

        let floor = self.initial_soc_kwh - self.battery_capacity_kwh;
        next.cumulative_power = next.cumulative_power.max(floor);

        if next.state_of_charge(self.initial_soc_kwh) < self.min_soc_kwh {
            return Ok(None);
        }
        Ok(Some(next))
    }

    /// Dominance filter at `candidate.node`. Evicts open siblings the
    /// candidate dominates; returns false when an existing label dominates
    /// the candidate.
    fn admit(&mut self, candidate: &Label) -> bool {
        let criterion = self.options.criterion;
        let dominates = |a: &Label, b: &Label| {
            let (ca, cb) = (criterion.of(a), criterion.of(b));
            ca <= cb
                && a.cumulative_power <= b.cumulative_power
                && (ca < cb || a.cumulative_power < b.cumulative_power)
        };

        let existing = self
            .open_at
            .get(&candidate.node)
            .into_iter()
            .chain(self.closed_at.get(&candidate.node))
            .flatten();
        for id in existing {
            if dominates(&self.labels[id.0 as usize], candidate) {
                return false;
            }
        }

        if let Some(siblings) = self.open_at.get_mut(&candidate.node) {
            let labels = &self.labels;
            let evicted = &mut self.evicted;
            let stats = &mut self.stats;
            siblings.retain(|id| {
                if dominates(candidate, &labels[id.0 as usize]) {
                    evicted.insert(*id);
                    stats.dominated += 1;
                    false
                } else {
                    true
                }
            });
        }
        true
    }

    fn path_to(&self, destination: LabelId) -> ChargingPath {
        let mut labels = Vec::new();
        let mut current = destination;
        while let Some(label) = self.label(current) {
            labels.push(label.clone());
            if label.preceding_node.is_none() || label.predecessor == current {
                break;
            }
            current = label.predecessor;
        }
        labels.reverse();
        ChargingPath {
            criterion: self.options.criterion,
            labels,
            stats: self.stats,
        }
    }
}

/// The winning label chain, start first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingPath {
    pub criterion: CostField,
    pub labels: Vec<Label>,
    pub stats: SearchStats,
}

impl ChargingPath {
    /// Last label of the chain. `None` only for a path deserialized
    /// without labels.
    pub fn destination(&self) -> Option<&Label> {
        self.labels.last()
    }

    pub fn optimized_cost(&self) -> f64 {
        self.destination().map_or(0.0, |label| self.criterion.of(label))
    }

    pub fn total_duration_s(&self) -> f64 {
        self.destination().map_or(0.0, |label| label.cumulative_duration)
    }

    pub fn total_distance_m(&self) -> f64 {
        self.destination().map_or(0.0, |label| label.cumulative_distance)
    }

    pub fn total_financial_cost(&self) -> f64 {
        self.destination()
            .map_or(0.0, |label| label.cumulative_financial_cost)
    }

    pub fn charging_stops(&self) -> u32 {
        self.destination().map_or(0, |label| label.charging_stops)
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.labels.iter().map(|label| label.node).collect()
    }

    /// Charge-level labels where energy was actually delivered.
    pub fn charging_labels(&self) -> Vec<&Label> {
        self.labels
            .windows(2)
            .filter(|pair| pair[1].charging_stops > pair[0].charging_stops)
            .map(|pair| &pair[1])
            .collect()
    }

    /// Remaining battery charge after each label, kWh.
    pub fn soc_profile(&self, initial_soc_kwh: f64) -> Vec<f64> {
        self.labels
            .iter()
            .map(|label| label.state_of_charge(initial_soc_kwh))
            .collect()
    }
}
