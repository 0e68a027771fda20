//! Physics-based vehicle energy model.
//!
//! Converts a stretch of road (distance, duration, elevation change) into the
//! net energy exchanged with the battery. Forces at the wheels follow
//! Genikomsakis & Mitrentsis (2017); acceleration is taken as zero at segment
//! granularity, so the linear-acceleration and inertial terms vanish.
//!
//! Sign convention: positive power draws from the battery, negative power
//! charges it.

use tracing::trace;

use crate::error::EnergyError;
use crate::segment::Segment;
use crate::vehicle::{MotorType, Vehicle};

/// Gravitational acceleration, m/s².
pub const GRAVITY: f64 = 9.81;

/// Density of dry air at 15 °C and sea level, kg/m³.
pub const AIR_DENSITY: f64 = 1.225;

pub fn aerodynamic_drag_force(
    air_density: f64,
    drag_coefficient: f64,
    frontal_area: f64,
    speed: f64,
) -> f64 {
    0.5 * air_density * drag_coefficient * frontal_area * speed.powi(2)
}

pub fn rolling_resistance_force(coefficient: f64, mass: f64, gravity: f64, slope_angle: f64) -> f64 {
    coefficient * mass * gravity * slope_angle.cos()
}

/// Negative when descending.
pub fn hill_climbing_force(mass: f64, gravity: f64, slope_angle: f64) -> f64 {
    mass * gravity * slope_angle.sin()
}

pub fn linear_acceleration_force(mass: f64, acceleration: f64) -> f64 {
    mass * acceleration
}

pub fn inertial_force(mass_correction_factor: f64, mass: f64, acceleration: f64) -> f64 {
    mass_correction_factor * mass * acceleration
}

/// The five force components acting at the wheels, in N.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TractiveForces {
    pub aerodynamic_drag: f64,
    pub rolling_resistance: f64,
    pub hill_climbing: f64,
    pub linear_acceleration: f64,
    pub inertial: f64,
}

pub fn tractive_effort(forces: &TractiveForces) -> f64 {
    forces.aerodynamic_drag
        + forces.rolling_resistance
        + forces.hill_climbing
        + forces.linear_acceleration
        + forces.inertial
}

pub fn tractive_power(tractive_effort: f64, speed: f64) -> f64 {
    tractive_effort * speed
}

/// Mechanical power at the motor shaft. Gear losses always oppose the flow
/// of power: divide when motoring, multiply when regenerating.
pub fn motor_output_power(tractive_power: f64, gear_efficiency: f64) -> f64 {
    if tractive_power < 0.0 {
        tractive_power * gear_efficiency
    } else {
        tractive_power / gear_efficiency
    }
}

/// Motor shaft speed from the wheel's angular speed (rad/s) and radius (m).
pub fn motor_angular_speed(gear_ratio: f64, wheel_angular_speed: f64, wheel_radius: f64) -> f64 {
    gear_ratio * wheel_angular_speed * wheel_radius
}

/// Motor output torque in Nm.
pub fn motor_output_torque(output_power: f64, angular_speed: f64) -> Result<f64, EnergyError> {
    if angular_speed == 0.0 {
        return Err(EnergyError::ZeroDenominator("motor angular speed"));
    }
    Ok(output_power / angular_speed)
}

/// Fit coefficients of one efficiency curve: rational below 25 % load,
/// linear between 25 % and 75 %, linear again above.
struct EfficiencyCurve {
    low: (f64, f64, f64),
    mid: (f64, f64),
    high: (f64, f64),
}

const INDUCTION_MOTORING: EfficiencyCurve = EfficiencyCurve {
    low: (0.9243, 0.000127, 0.01273),
    mid: (0.08, 0.86),
    high: (-0.0736, 0.9752),
};

const INDUCTION_GENERATING: EfficiencyCurve = EfficiencyCurve {
    low: (0.925473, 0.000148, 0.014849),
    mid: (0.075312, 0.858605),
    high: (-0.062602, 0.971034),
};

const PERMANENT_MAGNET_MOTORING: EfficiencyCurve = EfficiencyCurve {
    low: (0.942269, 0.000061, 0.006118),
    mid: (0.06, 0.905),
    high: (-0.076, 1.007),
};

const PERMANENT_MAGNET_GENERATING: EfficiencyCurve = EfficiencyCurve {
    low: (0.942545, 0.000067, 0.006732),
    mid: (0.057945, 0.904254),
    high: (-0.066751, 1.002698),
};

impl EfficiencyCurve {
    fn for_motor(motor_type: MotorType, motoring: bool) -> &'static EfficiencyCurve {
        match (motor_type, motoring) {
            (MotorType::InductionMotor, true) => &INDUCTION_MOTORING,
            (MotorType::InductionMotor, false) => &INDUCTION_GENERATING,
            (MotorType::PermanentMagnetMotor, true) => &PERMANENT_MAGNET_MOTORING,
            (MotorType::PermanentMagnetMotor, false) => &PERMANENT_MAGNET_GENERATING,
        }
    }

    fn at(&self, load: f64) -> f64 {
        if load < 0.25 {
            let (c1, c2, c3) = self.low;
            (c1 * load + c2) / (load + c3)
        } else if load < 0.75 {
            let (d1, d2) = self.mid;
            d1 * load + d2
        } else {
            let (e1, e2) = self.high;
            e1 * load + e2
        }
    }
}

/// Load-dependent motor efficiency.
///
/// `output_power_w` is the shaft power in W, `rated_power_kw` the rated
/// motor power in kW. The curve is chosen by motor family and by the sign of
/// the output power (motoring vs. generating).
pub fn motor_efficiency(
    output_power_w: f64,
    rated_power_kw: f64,
    motor_type: MotorType,
) -> Result<f64, EnergyError> {
    if rated_power_kw <= 0.0 {
        return Err(EnergyError::InvalidRatedPower(rated_power_kw));
    }
    let load = output_power_w.abs() / (rated_power_kw * 1000.0);
    if load.is_nan() || load < 0.0 {
        return Err(EnergyError::NegativeLoad(load));
    }
    let curve = EfficiencyCurve::for_motor(motor_type, output_power_w > 0.0);
    Ok(curve.at(load))
}

/// IEC efficiency-class steps: `(upper rated power in kW, factor)`. A motor
/// takes the factor of the first step whose bound is not below its rating.
const NORMALIZATION_STEPS: [(f64, f64); 21] = [
    (0.75, 0.817),
    (1.1, 0.846),
    (1.5, 0.866),
    (2.2, 0.886),
    (3.0, 0.901),
    (4.0, 0.914),
    (5.5, 0.925),
    (7.5, 0.935),
    (11.0, 0.946),
    (15.0, 0.955),
    (18.5, 0.960),
    (22.0, 0.965),
    (30.0, 0.971),
    (37.0, 0.975),
    (45.0, 0.979),
    (55.0, 0.983),
    (75.0, 0.987),
    (90.0, 0.990),
    (110.0, 0.993),
    (132.0, 0.996),
    (160.0, 0.998),
];

/// Scales the efficiency curve by motor size. Monotonic in rated power,
/// from 0.817 for the smallest motors up to 1.0 above 160 kW.
pub fn efficiency_normalization_factor(rated_power_kw: f64) -> f64 {
    NORMALIZATION_STEPS
        .iter()
        .find(|(upper, _)| rated_power_kw <= *upper)
        .map(|(_, factor)| *factor)
        .unwrap_or(1.0)
}

/// Fraction of braking energy actually recovered at `speed` (m/s): zero up
/// to `u1`, a linear ramp to one at `u2`, one above.
pub fn regen_factor(speed: f64, u1: f64, u2: f64) -> Result<f64, EnergyError> {
    if u1 < 0.0 || u2 < 0.0 || u2 < u1 {
        return Err(EnergyError::InvalidRegenBounds { u1, u2 });
    }
    if speed <= u1 {
        Ok(0.0)
    } else if speed >= u2 {
        Ok(1.0)
    } else {
        Ok((speed - u1) / (u2 - u1))
    }
}

/// Electrical power at the motor terminals.
///
/// Coasting or braking (`tractive_power <= 0`) regenerates, scaled by how
/// much of the energy is recoverable; motoring divides by the effective
/// efficiency.
pub fn motor_input_power(
    motor_output_power: f64,
    regen_factor: f64,
    efficiency: f64,
    norm_factor: f64,
    tractive_power: f64,
) -> Result<f64, EnergyError> {
    if !(0.0..=1.0).contains(&regen_factor) {
        return Err(EnergyError::OutOfRange {
            name: "regen_factor",
            value: regen_factor,
            min: 0.0,
            max: 1.0,
        });
    }
    if !(0.0..=1.0).contains(&efficiency) {
        return Err(EnergyError::OutOfRange {
            name: "efficiency",
            value: efficiency,
            min: 0.0,
            max: 1.0,
        });
    }

    if tractive_power <= 0.0 {
        Ok(motor_output_power * regen_factor * efficiency * norm_factor)
    } else {
        let effective = efficiency * norm_factor;
        if effective == 0.0 {
            return Err(EnergyError::ZeroDenominator("motor efficiency"));
        }
        Ok(motor_output_power / effective)
    }
}

pub fn battery_power_flow(motor_input_power: f64, accessory_power: f64) -> f64 {
    motor_input_power + accessory_power
}

/// Power at the battery terminals. The round-trip loss is split evenly
/// between discharging and charging.
pub fn battery_terminal_power(
    battery_power_flow: f64,
    round_trip_efficiency: f64,
) -> Result<f64, EnergyError> {
    if !(round_trip_efficiency > 0.0 && round_trip_efficiency <= 1.0) {
        return Err(EnergyError::InvalidRoundTripEfficiency(round_trip_efficiency));
    }
    let one_way = round_trip_efficiency.sqrt();
    if battery_power_flow >= 0.0 {
        Ok(battery_power_flow / one_way)
    } else {
        Ok(battery_power_flow * one_way)
    }
}

/// Every intermediate quantity of one segment's power computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerBreakdown {
    /// m/s
    pub speed: f64,
    /// rad
    pub slope_angle: f64,
    pub forces: TractiveForces,
    /// W
    pub tractive_power: f64,
    pub motor_output_power: f64,
    pub motor_efficiency: f64,
    pub regen_factor: f64,
    pub motor_input_power: f64,
    pub battery_power_flow: f64,
    pub battery_terminal_power: f64,
}

/// Runs the full force → power chain for a segment with positive duration.
pub fn segment_power_breakdown(
    segment: &Segment,
    vehicle: &Vehicle,
    air_density: f64,
) -> Result<PowerBreakdown, EnergyError> {
    if segment.duration_s == 0.0 {
        return Err(EnergyError::ZeroDenominator("segment duration"));
    }
    let speed = segment.average_speed();
    let slope_angle = segment.slope_angle();

    let forces = TractiveForces {
        aerodynamic_drag: aerodynamic_drag_force(
            air_density,
            vehicle.drag_coefficient,
            vehicle.frontal_area_m2,
            speed,
        ),
        rolling_resistance: rolling_resistance_force(
            vehicle.rolling_resistance_coefficient,
            vehicle.mass_kg,
            GRAVITY,
            slope_angle,
        ),
        hill_climbing: hill_climbing_force(vehicle.mass_kg, GRAVITY, slope_angle),
        linear_acceleration: linear_acceleration_force(vehicle.mass_kg, 0.0),
        inertial: inertial_force(vehicle.mass_correction_factor, vehicle.mass_kg, 0.0),
    };

    let tractive_power = tractive_power(tractive_effort(&forces), speed);
    let motor_output_power = motor_output_power(tractive_power, vehicle.gear_efficiency);
    let regen_factor = regen_factor(speed, vehicle.regen_speed_low, vehicle.regen_speed_high)?;
    let motor_efficiency = motor_efficiency(
        motor_output_power,
        vehicle.rated_motor_power_kw,
        vehicle.motor_type,
    )?;
    let motor_input_power = motor_input_power(
        motor_output_power,
        regen_factor,
        motor_efficiency,
        vehicle.norm_factor,
        tractive_power,
    )?;
    let battery_power_flow = battery_power_flow(motor_input_power, vehicle.accessory_power_w);
    let battery_terminal_power =
        battery_terminal_power(battery_power_flow, vehicle.round_trip_efficiency)?;

    Ok(PowerBreakdown {
        speed,
        slope_angle,
        forces,
        tractive_power,
        motor_output_power,
        motor_efficiency,
        regen_factor,
        motor_input_power,
        battery_power_flow,
        battery_terminal_power,
    })
}

/// Net energy exchanged with the battery over the segment, in Wh.
/// Zero-duration segments exchange nothing.
pub fn segment_energy_wh(
    segment: &Segment,
    vehicle: &Vehicle,
    air_density: f64,
) -> Result<f64, EnergyError> {
    if segment.duration_s == 0.0 {
        return Ok(0.0);
    }
    let breakdown = segment_power_breakdown(segment, vehicle, air_density)?;
    trace!(?segment, ?breakdown, "segment power");
    Ok(segment.duration_s * breakdown.battery_terminal_power / 3600.0)
}
