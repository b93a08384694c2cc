//! # Detection Geometry Engine
//!
//! Pure computation from a device pose and a vehicle pose to spherical
//! detection parameters and a detected/not-detected verdict. No I/O,
//! no shared mutable state.
//!
//! Signal model: free-space inverse-square falloff in decibels,
//! `snr_db = REF_EMISSION_DBM + 10*log10(rcs) - 20*log10(range)`, with
//! range clamped to one meter so point-blank geometry stays finite. A
//! target is detected when the signal meets the device's sensitivity
//! threshold, the range is within the device's configured maximum, and
//! the bearing falls inside its field of view.

use chrono::{DateTime, Utc};
use uav_domain::{DetectionEvent, DeviceDescriptor, KinematicsState};
use uuid::Uuid;

/// Reference emission level at one meter, dBm. Anchors the falloff
/// curve; device sensitivity is compared against this scale.
pub const REF_EMISSION_DBM: f64 = 40.0;

/// Floor for radar cross-section so log10 stays finite.
const MIN_RCS_SQM: f64 = 1e-6;

/// Signal level at `range_m` for a target with cross-section
/// `rcs_sqm`, in dBm.
#[must_use]
pub fn signal_level_dbm(range_m: f64, rcs_sqm: f64) -> f64 {
    REF_EMISSION_DBM + 10.0 * rcs_sqm.max(MIN_RCS_SQM).log10()
        - 20.0 * range_m.max(1.0).log10()
}

/// Evaluate one device against one vehicle at a single instant.
///
/// Coincident positions are defined as a detection with range 0 and
/// azimuth/elevation 0, sidestepping the atan2(0,0) ambiguity.
#[must_use]
pub fn evaluate(
    device: &DeviceDescriptor,
    vehicle_id: &str,
    vehicle: &KinematicsState,
    rcs_sqm: f64,
    at: DateTime<Utc>,
) -> DetectionEvent {
    let los = vehicle.position.subtract(&device.position);
    let range_m = device.position.distance_to(&vehicle.position);

    if range_m == 0.0 {
        return DetectionEvent {
            event_id: Uuid::new_v4(),
            device_id: device.device_id,
            vehicle_id: vehicle_id.to_string(),
            detected_position: vehicle.position,
            range_m: 0.0,
            azimuth_deg: 0.0,
            elevation_deg: 0.0,
            radial_velocity_mps: 0.0,
            snr_db: signal_level_dbm(0.0, rcs_sqm),
            detected: true,
            captured_at: at,
        };
    }

    // Bearing clockwise from north, [0, 360).
    let raw_azimuth_deg = los.y.atan2(los.x).to_degrees().rem_euclid(360.0);
    // Relative to the boresight when the device has a heading.
    let azimuth_deg = if device.heading_deg == 0.0 {
        raw_azimuth_deg
    } else {
        (raw_azimuth_deg - device.heading_deg).rem_euclid(360.0)
    };

    let horizontal_m = (los.x * los.x + los.y * los.y).sqrt();
    let elevation_deg = (-los.z).atan2(horizontal_m).to_degrees();

    let relative_velocity = match device.velocity {
        Some(device_velocity) => vehicle.linear_velocity.subtract(&device_velocity),
        None => vehicle.linear_velocity,
    };
    let radial_velocity_mps = (relative_velocity.vx * los.x
        + relative_velocity.vy * los.y
        + relative_velocity.vz * los.z)
        / range_m;

    let snr_db = signal_level_dbm(range_m, rcs_sqm);

    let off_boresight_deg = {
        let relative = (raw_azimuth_deg - device.heading_deg).rem_euclid(360.0);
        relative.min(360.0 - relative)
    };
    let in_field_of_view =
        device.is_omnidirectional() || off_boresight_deg <= device.field_of_view_deg / 2.0;

    let detected =
        snr_db >= device.sensitivity_dbm && range_m <= device.max_range_m && in_field_of_view;

    DetectionEvent {
        event_id: Uuid::new_v4(),
        device_id: device.device_id,
        vehicle_id: vehicle_id.to_string(),
        detected_position: vehicle.position,
        range_m,
        azimuth_deg,
        elevation_deg,
        radial_velocity_mps,
        snr_db,
        detected,
        captured_at: at,
    }
}
