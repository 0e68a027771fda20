//! Swedish locations for realistic fixtures.
//!
//! Town centres along the E4/E6 corridors, usable with the Geofabrik Sweden
//! extract in the OSRM integration test.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// E4 corridor, south to north
// ============================================================================

pub const E4_TOWNS: &[Location] = &[
    Location::new("Helsingborg", 56.0465, 12.6945),
    Location::new("Ljungby", 56.8331, 13.9408),
    Location::new("Värnamo", 57.1860, 14.0400),
    Location::new("Jönköping", 57.7826, 14.1618),
    Location::new("Gränna", 58.0255, 14.4617),
    Location::new("Linköping", 58.4108, 15.6214),
    Location::new("Norrköping", 58.5877, 16.1924),
    Location::new("Nyköping", 58.7530, 17.0079),
    Location::new("Södertälje", 59.1955, 17.6253),
    Location::new("Stockholm", 59.3293, 18.0686),
];

// ============================================================================
// Other towns
// ============================================================================

pub const OTHER_TOWNS: &[Location] = &[
    Location::new("Göteborg", 57.7089, 11.9746),
    Location::new("Malmö", 55.6050, 13.0038),
    Location::new("Växjö", 56.8777, 14.8091),
    Location::new("Örebro", 59.2753, 15.2134),
    Location::new("Karlstad", 59.3793, 13.5036),
];

pub fn town(name: &str) -> (f64, f64) {
    E4_TOWNS
        .iter()
        .chain(OTHER_TOWNS)
        .find(|location| location.name == name)
        .map(Location::coords)
        .unwrap_or_else(|| panic!("unknown town {}", name))
}
