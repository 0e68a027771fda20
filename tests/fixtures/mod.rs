//! Test fixtures for ev-charge-planner.
//!
//! Provides:
//! - Real Swedish town and charging-site locations
//! - A synthetic corridor router that produces OSRM-shaped routes offline
//! - Builders for stations, outlets and hand-made charging graphs

#![allow(dead_code)]

pub mod routes;
pub mod swedish_locations;

pub use routes::*;
pub use swedish_locations::*;
