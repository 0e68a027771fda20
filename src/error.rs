//! Error types for every layer of the planner.
//!
//! Validation and construction failures are errors. A search that finds no
//! battery-feasible path is not: it returns `Ok(None)`.

use thiserror::Error;

use crate::label::NodeId;

/// Invalid inputs to the vehicle energy model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnergyError {
    #[error("{name} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("round-trip efficiency must be in (0, 1], got {0}")]
    InvalidRoundTripEfficiency(f64),

    #[error("regen speed bounds must satisfy 0 <= u1 <= u2, got u1={u1}, u2={u2}")]
    InvalidRegenBounds { u1: f64, u2: f64 },

    #[error("normalized motor load is negative: {0}")]
    NegativeLoad(f64),

    #[error("rated motor power must be positive, got {0} kW")]
    InvalidRatedPower(f64),

    #[error("unknown motor type: {0}")]
    UnknownMotorType(String),

    #[error("{0} is zero")]
    ZeroDenominator(&'static str),
}

/// Failures while packing or unpacking labels and node ids.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("{field} value {value} does not fit in {bits} bits")]
    FieldOverflow {
        field: &'static str,
        value: i64,
        bits: u32,
    },

    #[error("malformed node id: {0:?}")]
    InvalidNodeId(String),

    #[error("unknown node tag {0:#05b}")]
    UnknownTag(u8),

    #[error("label buffer must be {expected} bytes, got {actual}")]
    BufferLength { expected: usize, actual: usize },
}

/// Failures of the road-routing collaborator. Passed through unchanged.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("routing engine returned {code}: {message}")]
    Engine { code: String, message: String },

    #[error("routing engine returned no route")]
    NoRoute,
}

/// Failures of the charging-station directory collaborator.
#[derive(Debug, Error)]
pub enum StationError {
    #[error("station directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed station payload: {0}")]
    Payload(String),
}

/// Failures while building the augmented charging graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("route has no segments")]
    EmptyRoute,

    #[error("node {0} is not in the graph")]
    UnknownNode(NodeId),

    #[error("invalid graph options: {0}")]
    InvalidOptions(String),

    #[error("{0} stations do not fit in a node id")]
    TooManyStations(usize),

    #[error("station {station} sub-graph is malformed: {reason}")]
    InvalidStationSubgraph { station: u16, reason: String },

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Energy(#[from] EnergyError),
}

/// Construction invariant violations detected by the label-setting search.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    #[error("edge {from} -> {to} has no duration")]
    MissingEdgeDuration { from: NodeId, to: NodeId },

    #[error("node {0} is not in the graph")]
    UnknownNode(NodeId),
}

/// Top-level error for the planner pipeline and the experiment harness.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Stations(#[from] StationError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Energy(#[from] EnergyError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
