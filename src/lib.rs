//! ev-charge-planner
//!
//! Energy-feasible, cost-optimal route planning for battery-electric
//! vehicles. A road route is segmented and costed with a physical vehicle
//! model, charging stations along it are embedded into an augmented graph,
//! and a label-setting search picks where (and how far) to charge.

pub mod codec;
pub mod energy;
pub mod error;
pub mod experiment;
pub mod graph;
pub mod haversine;
pub mod label;
pub mod osrm;
pub mod osrm_data;
pub mod planner;
pub mod polyline;
pub mod search;
pub mod segment;
pub mod stations;
pub mod traits;
pub mod vehicle;
