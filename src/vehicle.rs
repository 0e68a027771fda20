//! Static vehicle parameters for the energy model.
//!
//! Reference values follow Genikomsakis & Mitrentsis (2017), "A computationally
//! efficient simulation model for estimating energy consumption of electric
//! vehicles in the context of route planning applications".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::energy::efficiency_normalization_factor;
use crate::error::{EnergyError, PlannerError};

/// Physical family of the traction motor. Selects the efficiency curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum MotorType {
    InductionMotor,
    PermanentMagnetMotor,
}

impl MotorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotorType::InductionMotor => "induction_motor",
            MotorType::PermanentMagnetMotor => "permanent_magnet_motor",
        }
    }
}

impl fmt::Display for MotorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MotorType {
    type Err = EnergyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "induction_motor" => Ok(MotorType::InductionMotor),
            "permanent_magnet_motor" => Ok(MotorType::PermanentMagnetMotor),
            other => Err(EnergyError::UnknownMotorType(other.to_string())),
        }
    }
}

impl TryFrom<String> for MotorType {
    type Error = EnergyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Vehicle configuration. Immutable once built; passed by reference into
/// every energy computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Curb mass plus payload, kg.
    pub mass_kg: f64,
    pub frontal_area_m2: f64,
    pub drag_coefficient: f64,
    pub rolling_resistance_coefficient: f64,
    /// Mass correction factor for rotational inertia.
    pub mass_correction_factor: f64,
    /// Constant accessory draw (HVAC, electronics), W.
    pub accessory_power_w: f64,

    pub motor_type: MotorType,
    pub rated_motor_power_kw: f64,
    /// Efficiency normalization factor for the rated power. Missing or zero
    /// in a JSON document means "derive from `rated_motor_power_kw`".
    #[serde(default)]
    pub norm_factor: f64,

    pub battery_capacity_kwh: f64,
    pub round_trip_efficiency: f64,

    /// Regeneration starts above `regen_speed_low` (m/s) and is complete at
    /// `regen_speed_high` (m/s).
    pub regen_speed_low: f64,
    pub regen_speed_high: f64,

    pub gear_efficiency: f64,
}

impl Vehicle {
    /// The compact reference car used for the regression fixtures:
    /// 1663 kg, 80 kW induction motor, 24 kWh battery.
    pub fn reference() -> Self {
        let rated_motor_power_kw = 80.0;
        Self {
            mass_kg: 1663.0,
            frontal_area_m2: 2.19,
            drag_coefficient: 0.29,
            rolling_resistance_coefficient: 0.008,
            mass_correction_factor: 0.05,
            accessory_power_w: 300.0,
            motor_type: MotorType::InductionMotor,
            rated_motor_power_kw,
            norm_factor: efficiency_normalization_factor(rated_motor_power_kw),
            battery_capacity_kwh: 24.0,
            round_trip_efficiency: 0.95,
            regen_speed_low: 1.39,
            regen_speed_high: 4.72,
            gear_efficiency: 0.97,
        }
    }

    /// Parses a vehicle from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self, PlannerError> {
        let vehicle: Vehicle =
            serde_json::from_str(json).map_err(|err| PlannerError::Config(err.to_string()))?;
        Ok(vehicle.resolve()?)
    }

    /// Derives a missing normalization factor, then validates.
    pub fn resolve(mut self) -> Result<Self, EnergyError> {
        if self.norm_factor <= 0.0 {
            self.norm_factor = efficiency_normalization_factor(self.rated_motor_power_kw);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks every bounded parameter once so that downstream computations
    /// can rely on them.
    pub fn validate(&self) -> Result<(), EnergyError> {
        if self.rated_motor_power_kw <= 0.0 {
            return Err(EnergyError::InvalidRatedPower(self.rated_motor_power_kw));
        }
        if !(self.round_trip_efficiency > 0.0 && self.round_trip_efficiency <= 1.0) {
            return Err(EnergyError::InvalidRoundTripEfficiency(
                self.round_trip_efficiency,
            ));
        }
        if self.regen_speed_low < 0.0
            || self.regen_speed_high < 0.0
            || self.regen_speed_high < self.regen_speed_low
        {
            return Err(EnergyError::InvalidRegenBounds {
                u1: self.regen_speed_low,
                u2: self.regen_speed_high,
            });
        }
        unit_interval("gear_efficiency", self.gear_efficiency)?;
        unit_interval("norm_factor", self.norm_factor)?;
        if self.gear_efficiency == 0.0 {
            return Err(EnergyError::ZeroDenominator("gear_efficiency"));
        }
        if self.battery_capacity_kwh <= 0.0 {
            return Err(EnergyError::OutOfRange {
                name: "battery_capacity_kwh",
                value: self.battery_capacity_kwh,
                min: f64::MIN_POSITIVE,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }
}

impl Default for Vehicle {
    fn default() -> Self {
        Self::reference()
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), EnergyError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EnergyError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_vehicle_is_valid() {
        let vehicle = Vehicle::reference();
        assert!(vehicle.validate().is_ok());
        assert_eq!(vehicle.norm_factor, 0.99);
    }

    #[test]
    fn motor_type_parses_known_names() {
        assert_eq!("induction_motor".parse::<MotorType>(), Ok(MotorType::InductionMotor));
        assert_eq!(
            "permanent_magnet_motor".parse::<MotorType>(),
            Ok(MotorType::PermanentMagnetMotor)
        );
        assert!(matches!(
            "diesel".parse::<MotorType>(),
            Err(EnergyError::UnknownMotorType(_))
        ));
    }

    #[test]
    fn from_json_derives_norm_factor() {
        let json = r#"{
            "mass_kg": 2100.0,
            "frontal_area_m2": 2.4,
            "drag_coefficient": 0.23,
            "rolling_resistance_coefficient": 0.009,
            "mass_correction_factor": 0.05,
            "accessory_power_w": 400.0,
            "motor_type": "permanent_magnet_motor",
            "rated_motor_power_kw": 150.0,
            "battery_capacity_kwh": 75.0,
            "round_trip_efficiency": 0.95,
            "regen_speed_low": 1.39,
            "regen_speed_high": 4.72,
            "gear_efficiency": 0.97
        }"#;
        let vehicle = Vehicle::from_json(json).expect("valid vehicle");
        assert_eq!(vehicle.motor_type, MotorType::PermanentMagnetMotor);
        assert_eq!(vehicle.norm_factor, 0.998);
    }

    #[test]
    fn from_json_rejects_unknown_motor() {
        let mut value = serde_json::to_value(Vehicle::reference()).unwrap();
        value["motor_type"] = serde_json::Value::String("steam_engine".to_string());
        let result = Vehicle::from_json(&value.to_string());
        assert!(matches!(result, Err(PlannerError::Config(_))));
    }

    #[test]
    fn validate_rejects_inverted_regen_bounds() {
        let vehicle = Vehicle {
            regen_speed_low: 5.0,
            regen_speed_high: 1.0,
            ..Vehicle::reference()
        };
        assert!(matches!(
            vehicle.validate(),
            Err(EnergyError::InvalidRegenBounds { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_rte() {
        let vehicle = Vehicle {
            round_trip_efficiency: 0.0,
            ..Vehicle::reference()
        };
        assert_eq!(
            vehicle.validate(),
            Err(EnergyError::InvalidRoundTripEfficiency(0.0))
        );
    }
}
