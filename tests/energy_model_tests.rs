//! Vehicle energy model and route segmenter tests
//!
//! Physical properties of the model, regression fixtures for the reference
//! vehicle, and segmentation of offline corridor routes.

mod fixtures;

use ev_charge_planner::energy::{
    AIR_DENSITY, aerodynamic_drag_force, efficiency_normalization_factor, motor_efficiency,
    regen_factor, segment_energy_wh, segment_power_breakdown,
};
use ev_charge_planner::osrm::{Geometry, Intersection, Route, RouteLeg, RouteStep};
use ev_charge_planner::segment::{Segment, segment_route};
use ev_charge_planner::traits::{ElevationProvider, FlatTerrain};
use ev_charge_planner::vehicle::{MotorType, Vehicle};

use fixtures::*;

fn energy(distance: f64, duration: f64, start: f64, end: f64) -> f64 {
    segment_energy_wh(
        &Segment::new(distance, duration, start, end),
        &Vehicle::reference(),
        1.25,
    )
    .unwrap()
}

// ============================================================================
// Forces and efficiency
// ============================================================================

#[test]
fn test_drag_is_zero_at_rest_and_increasing() {
    assert_eq!(aerodynamic_drag_force(1.225, 0.29, 2.19, 0.0), 0.0);
    let mut last = 0.0;
    for speed in 1..60 {
        let drag = aerodynamic_drag_force(1.225, 0.29, 2.19, speed as f64);
        assert!(drag > last);
        last = drag;
    }
}

#[test]
fn test_efficiency_peaks_near_three_quarter_load() {
    for motor in [MotorType::InductionMotor, MotorType::PermanentMagnetMotor] {
        let at = |load: f64| motor_efficiency(load * 80_000.0, 80.0, motor).unwrap();
        assert!(at(0.75) > at(0.5), "{:?}", motor);
        assert!(at(0.75) > at(1.0), "{:?}", motor);
        assert!(at(0.5) > at(0.1), "{:?}", motor);
    }
}

#[test]
fn test_generating_uses_its_own_curve() {
    let motoring = motor_efficiency(40_000.0, 80.0, MotorType::InductionMotor).unwrap();
    let generating = motor_efficiency(-40_000.0, 80.0, MotorType::InductionMotor).unwrap();
    assert_ne!(motoring, generating);
}

#[test]
fn test_normalization_table_values() {
    assert_eq!(efficiency_normalization_factor(200.0), 1.0);
    assert_eq!(efficiency_normalization_factor(0.5), 0.817);
    assert_eq!(efficiency_normalization_factor(150.0), 0.998);
    assert_eq!(efficiency_normalization_factor(80.0), 0.99);

    let mut last = 0.0;
    for kw in 1..300 {
        let factor = efficiency_normalization_factor(kw as f64 * 0.75);
        assert!(factor >= last);
        assert!((0.817..=1.0).contains(&factor));
        last = factor;
    }
}

#[test]
fn test_regen_factor_ramp() {
    assert_eq!(regen_factor(0.0, 1.39, 4.72), Ok(0.0));
    assert_eq!(regen_factor(1.39, 1.39, 4.72), Ok(0.0));
    assert_eq!(regen_factor(4.72, 1.39, 4.72), Ok(1.0));
    assert_eq!(regen_factor(30.0, 1.39, 4.72), Ok(1.0));
    let half = regen_factor(1.39 + 3.33 / 2.0, 1.39, 4.72).unwrap();
    assert!((half - 0.5).abs() < 1e-9);
}

// ============================================================================
// Segment energy
// ============================================================================

#[test]
fn test_reference_fixtures() {
    let flat = energy(1000.0, 120.0, 0.0, 0.0);
    let climb = energy(1000.0, 120.0, 0.0, 10.0);
    let descent = energy(1000.0, 120.0, 10.0, 0.0);
    assert!((flat - 98.364).abs() < 0.01, "flat {}", flat);
    assert!((climb - 150.894).abs() < 0.01, "climb {}", climb);
    assert!((descent - 10.197).abs() < 0.01, "descent {}", descent);
}

#[test]
fn test_energy_scales_with_length() {
    let single = energy(1000.0, 120.0, 0.0, 0.0);
    let double = energy(2000.0, 240.0, 0.0, 0.0);
    assert!((double - 2.0 * single).abs() < 1e-9);

    let single_climb = energy(1000.0, 120.0, 0.0, 10.0);
    let double_climb = energy(2000.0, 240.0, 0.0, 20.0);
    assert!((double_climb - 2.0 * single_climb).abs() < 1e-9);
}

#[test]
fn test_uphill_flat_downhill_ordering() {
    let up = energy(800.0, 60.0, 100.0, 112.0);
    let flat = energy(800.0, 60.0, 100.0, 100.0);
    let down = energy(800.0, 60.0, 112.0, 100.0);
    assert!(up > flat && flat > down);
}

#[test]
fn test_only_elevation_difference_matters() {
    let low = energy(1000.0, 120.0, 0.0, 10.0);
    let high = energy(1000.0, 120.0, 10.0, 20.0);
    assert_eq!(low, high);
}

#[test]
fn test_steep_descent_regenerates() {
    let steep = energy(1000.0, 80.0, 60.0, 0.0);
    assert!(steep < 0.0, "got {}", steep);
    let breakdown =
        segment_power_breakdown(&Segment::new(1000.0, 80.0, 60.0, 0.0), &Vehicle::reference(), 1.25)
            .unwrap();
    assert!(breakdown.tractive_power < 0.0);
    assert_eq!(breakdown.regen_factor, 1.0);
    assert!(breakdown.battery_terminal_power < 0.0);
}

#[test]
fn test_crawling_descent_does_not_regenerate() {
    // below u1 nothing is recovered; accessories still draw
    let breakdown =
        segment_power_breakdown(&Segment::new(100.0, 100.0, 10.0, 0.0), &Vehicle::reference(), 1.25)
            .unwrap();
    assert_eq!(breakdown.regen_factor, 0.0);
    assert_eq!(breakdown.motor_input_power, 0.0);
    assert!(breakdown.battery_terminal_power > 0.0);
}

// ============================================================================
// Route segmenter
// ============================================================================

/// Rises 1 m per 100 m travelled north of latitude 57.
struct NorthboundClimb;

impl ElevationProvider for NorthboundClimb {
    fn elevation_m(&self, (lat, _lng): (f64, f64)) -> f64 {
        (lat - 57.0) * 111_195.0 / 100.0
    }
}

#[test]
fn test_segmenter_preserves_route_totals() {
    let origin = town("Värnamo");
    let route = corridor_route(origin, north_of(origin, 60.0), 5_000.0, 25.0);
    let segmented = segment_route(&route, &Vehicle::reference(), AIR_DENSITY, &FlatTerrain).unwrap();

    let totals = segmented.totals();
    assert!((totals.distance_m - route.distance).abs() < 1e-6);
    assert!((totals.duration_s - route.duration).abs() < 1e-6);
    assert!(totals.energy_wh > 0.0);
    // 12 stretches plus the arrive step
    assert_eq!(segmented.segments().len(), 13);
    assert_eq!(segmented.point(0), Some(origin));
}

#[test]
fn test_segmenter_uses_elevation() {
    let origin = (57.0, 14.0);
    let route = corridor_route(origin, north_of(origin, 30.0), 5_000.0, 25.0);
    let vehicle = Vehicle::reference();
    let flat = segment_route(&route, &vehicle, AIR_DENSITY, &FlatTerrain).unwrap();
    let climb = segment_route(&route, &vehicle, AIR_DENSITY, &NorthboundClimb).unwrap();
    assert!(climb.totals().energy_wh > flat.totals().energy_wh);
    let first = climb.segments()[0].segment;
    assert!(first.elevation_end_m > first.elevation_start_m);
    assert!(first.slope_angle() > 0.0);
}

#[test]
fn test_step_split_by_stretch_length() {
    // one 3000 m step with intersections at 0, 1000 m and 3000 m (geometry
    // vertices shared), next step starts at the end
    let a = (57.0, 14.0);
    let b = north_of(a, 1.0);
    let c = north_of(a, 3.0);
    let to_lng_lat = |(lat, lng): (f64, f64)| [lng, lat];
    let step = RouteStep {
        distance: 3_000.0,
        duration: 300.0,
        intersections: vec![
            Intersection { location: to_lng_lat(a) },
            Intersection { location: to_lng_lat(b) },
        ],
        geometry: Some(Geometry {
            coordinates: vec![to_lng_lat(a), to_lng_lat(b), to_lng_lat(c)],
        }),
    };
    let arrive = RouteStep {
        distance: 0.0,
        duration: 0.0,
        intersections: vec![Intersection { location: to_lng_lat(c) }],
        geometry: None,
    };
    let route = Route {
        distance: 3_000.0,
        duration: 300.0,
        legs: vec![RouteLeg {
            distance: 3_000.0,
            duration: 300.0,
            steps: vec![step, arrive],
        }],
        geometry: None,
    };

    let segmented = segment_route(&route, &Vehicle::reference(), AIR_DENSITY, &FlatTerrain).unwrap();
    let segments = segmented.segments();
    assert_eq!(segments.len(), 3);
    assert!((segments[0].segment.distance_m - 1_000.0).abs() < 1.0);
    assert!((segments[1].segment.distance_m - 2_000.0).abs() < 1.0);
    assert!((segments[0].segment.duration_s - 100.0).abs() < 0.1);
    // arrive step has no geometry and no length
    assert_eq!(segments[2].segment.distance_m, 0.0);
    assert_eq!(segments[2].energy_wh, 0.0);
}

#[test]
fn test_empty_route_segments_to_nothing() {
    let route = Route {
        distance: 0.0,
        duration: 0.0,
        legs: vec![],
        geometry: None,
    };
    let segmented = segment_route(&route, &Vehicle::reference(), AIR_DENSITY, &FlatTerrain).unwrap();
    assert!(segmented.is_empty());
    assert_eq!(segmented.point_count(), 0);
}
