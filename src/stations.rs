//! Charging-station directory.
//!
//! Stations come from a pricing service over HTTP ([`StationApiClient`]) or
//! from memory ([`StaticStations`]). Field aliases accept the service's
//! camelCase payload (`outletList`, `costKwh`, `costMin`, `capacity`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StationError;
use crate::traits::StationDirectory;

/// One group of identical outlets at a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletGroup {
    /// Rated power, kW. Fractional for slow AC outlets (3.7, 7.4).
    #[serde(alias = "capacity")]
    pub capacity_kw: f64,
    #[serde(default, alias = "costKwh")]
    pub price_per_kwh: Option<f64>,
    #[serde(default, alias = "costMin")]
    pub price_per_minute: Option<f64>,
}

impl OutletGroup {
    pub fn is_priced(&self) -> bool {
        self.price_per_kwh.is_some() || self.price_per_minute.is_some()
    }

    /// Capacity rounded to whole kW, the resolution of a charge-level id.
    pub fn node_capacity_kw(&self) -> u16 {
        self.capacity_kw.round() as u16
    }

    pub fn is_usable(&self, minimum_capacity_kw: u16) -> bool {
        self.capacity_kw > 0.0
            && self.capacity_kw >= f64::from(minimum_capacity_kw)
            && self.is_priced()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl StationLocation {
    pub fn lat_lng(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingStation {
    pub slug: String,
    pub location: StationLocation,
    #[serde(default, alias = "outletList")]
    pub outlets: Vec<OutletGroup>,
}

impl ChargingStation {
    pub fn new(slug: impl Into<String>, location: (f64, f64), outlets: Vec<OutletGroup>) -> Self {
        Self {
            slug: slug.into(),
            location: StationLocation {
                latitude: location.0,
                longitude: location.1,
            },
            outlets,
        }
    }

    /// Outlets that pass the capacity and pricing filter, one per whole-kW
    /// capacity. The first listed outlet of a capacity wins.
    pub fn usable_outlets(&self, minimum_capacity_kw: u16) -> Vec<&OutletGroup> {
        let mut usable: Vec<&OutletGroup> = Vec::new();
        for outlet in &self.outlets {
            if !outlet.is_usable(minimum_capacity_kw) {
                continue;
            }
            if usable
                .iter()
                .any(|kept| kept.node_capacity_kw() == outlet.node_capacity_kw())
            {
                continue;
            }
            usable.push(outlet);
        }
        usable
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationApiConfig {
    pub base_url: String,
    /// Maximum detour from the corridor, km.
    pub max_detour_km: f64,
    pub timeout_secs: u64,
}

impl Default for StationApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            max_detour_km: 4.0,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StationsAlongRoute {
    #[serde(default)]
    stations: Vec<ChargingStation>,
}

/// HTTP client for the station pricing service.
#[derive(Debug, Clone)]
pub struct StationApiClient {
    config: StationApiConfig,
    client: reqwest::blocking::Client,
}

impl StationApiClient {
    pub fn new(config: StationApiConfig) -> Result<Self, StationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, origin: (f64, f64), destination: (f64, f64)) -> String {
        format!(
            "{}/route?fromlat={:.6}&fromlng={:.6}&tolat={:.6}&tolng={:.6}&detour={}",
            self.config.base_url,
            origin.0,
            origin.1,
            destination.0,
            destination.1,
            self.config.max_detour_km
        )
    }
}

impl StationDirectory for StationApiClient {
    fn stations_along(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
    ) -> Result<Vec<ChargingStation>, StationError> {
        let url = self.route_url(origin, destination);
        debug!(%url, "requesting stations");

        let text = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?
            .error_for_status()?
            .text()?;

        let body: StationsAlongRoute =
            serde_json::from_str(&text).map_err(|err| StationError::Payload(err.to_string()))?;
        debug!(count = body.stations.len(), "stations received");
        Ok(body.stations)
    }
}

/// A fixed station list, returned for every query.
#[derive(Debug, Clone, Default)]
pub struct StaticStations {
    stations: Vec<ChargingStation>,
}

impl StaticStations {
    pub fn new(stations: Vec<ChargingStation>) -> Self {
        Self { stations }
    }

    /// Parses a JSON array of stations.
    pub fn from_json(json: &str) -> Result<Self, StationError> {
        let stations =
            serde_json::from_str(json).map_err(|err| StationError::Payload(err.to_string()))?;
        Ok(Self { stations })
    }
}

impl StationDirectory for StaticStations {
    fn stations_along(
        &self,
        _origin: (f64, f64),
        _destination: (f64, f64),
    ) -> Result<Vec<ChargingStation>, StationError> {
        Ok(self.stations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outlet(capacity_kw: u16, kwh: Option<f64>, minute: Option<f64>) -> OutletGroup {
        OutletGroup {
            capacity_kw: f64::from(capacity_kw),
            price_per_kwh: kwh,
            price_per_minute: minute,
        }
    }

    #[test]
    fn test_parses_service_payload() {
        let json = r#"[{
            "slug": "jonkoping-a6",
            "location": {"latitude": 57.7826, "longitude": 14.1618},
            "outletList": [
                {"capacity": 150, "costKwh": 6.5},
                {"capacity": 50, "costMin": 2.0, "costKwh": 4.0},
                {"capacity": 22}
            ]
        }]"#;
        let directory = StaticStations::from_json(json).unwrap();
        let stations = directory.stations_along((0.0, 0.0), (1.0, 1.0)).unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].outlets[0].capacity_kw, 150.0);
        assert_eq!(stations[0].outlets[1].price_per_minute, Some(2.0));
        assert_eq!(stations[0].outlets[2].price_per_kwh, None);
    }

    #[test]
    fn test_usable_outlets_filter_and_collapse() {
        let station = ChargingStation::new(
            "test",
            (59.0, 15.0),
            vec![
                outlet(50, Some(3.0), None),
                outlet(22, None, None),
                outlet(11, Some(2.0), None),
                outlet(50, Some(9.0), None),
                outlet(150, None, Some(4.0)),
            ],
        );
        let usable = station.usable_outlets(22);
        let capacities: Vec<u16> = usable.iter().map(|o| o.node_capacity_kw()).collect();
        assert_eq!(capacities, vec![50, 150]);
        assert_eq!(usable[0].price_per_kwh, Some(3.0));
    }

    #[test]
    fn test_parses_fractional_capacity() {
        let json = r#"[{
            "slug": "gislaved-torget",
            "location": {"latitude": 57.3040, "longitude": 13.5400},
            "outletList": [
                {"capacity": 7.4, "costKwh": 3.2},
                {"capacity": 3.7, "costKwh": 2.9},
                {"capacity": 50, "costKwh": 4.5}
            ]
        }]"#;
        let directory = StaticStations::from_json(json).unwrap();
        let stations = directory.stations_along((0.0, 0.0), (1.0, 1.0)).unwrap();
        let outlets = &stations[0].outlets;
        assert_eq!(outlets[0].capacity_kw, 7.4);
        assert_eq!(outlets[0].node_capacity_kw(), 7);
        assert_eq!(outlets[1].node_capacity_kw(), 4);

        let usable = stations[0].usable_outlets(0);
        assert_eq!(usable.len(), 3);
    }

    #[test]
    fn test_zero_capacity_is_unusable() {
        let dead = OutletGroup {
            capacity_kw: 0.0,
            price_per_kwh: Some(3.0),
            price_per_minute: None,
        };
        assert!(!dead.is_usable(0));

        let station = ChargingStation::new("dead", (59.0, 15.0), vec![dead, outlet(50, Some(4.0), None)]);
        let usable = station.usable_outlets(0);
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].capacity_kw, 50.0);
    }

    #[test]
    fn test_route_url() {
        let client = StationApiClient::new(StationApiConfig::default()).unwrap();
        let url = client.route_url((57.7089, 11.9746), (59.3293, 18.0686));
        assert_eq!(
            url,
            "http://localhost:8080/route?fromlat=57.708900&fromlng=11.974600&tolat=59.329300&tolng=18.068600&detour=4"
        );
    }
}
