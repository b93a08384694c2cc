//! # UAV Simulation Bridge - Domain Model
//!
//! Core value types shared by every layer of the bridge: NED-frame
//! geometry, kinematics snapshots, sensor records, sensing-device
//! descriptors, and detection events. All types are plain serializable
//! values with no I/O and no shared ownership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default tolerance below which a velocity counts as stationary (m/s).
pub const STATIONARY_TOLERANCE_MPS: f64 = 0.01;

// =============================================================================
// GEOMETRY VALUE TYPES
// =============================================================================

/// Position in the North-East-Down frame, meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[must_use]
    pub fn add(&self, other: &Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    #[must_use]
    pub fn subtract(&self, other: &Position) -> Position {
        Position::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    #[must_use]
    pub fn multiply(&self, scalar: f64) -> Position {
        Position::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: &Position) -> f64 {
        let d = self.subtract(other);
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }

    /// Altitude above the NED origin (down axis negated).
    #[must_use]
    pub fn altitude(&self) -> f64 {
        -self.z
    }
}

/// Velocity in the North-East-Down frame, m/s.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}

impl Velocity {
    pub const fn new(vx: f64, vy: f64, vz: f64) -> Self {
        Self { vx, vy, vz }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Horizontal velocity from polar components: speed along a direction
    /// measured clockwise from north, paired with a vertical (down) rate.
    ///
    /// Mutually inverse with [`Velocity::direction`] for non-zero speed.
    #[must_use]
    pub fn from_polar(speed: f64, direction_rad: f64, vertical_speed: f64) -> Self {
        Self::new(
            speed * direction_rad.cos(),
            speed * direction_rad.sin(),
            vertical_speed,
        )
    }

    #[must_use]
    pub fn add(&self, other: &Velocity) -> Velocity {
        Velocity::new(self.vx + other.vx, self.vy + other.vy, self.vz + other.vz)
    }

    #[must_use]
    pub fn subtract(&self, other: &Velocity) -> Velocity {
        Velocity::new(self.vx - other.vx, self.vy - other.vy, self.vz - other.vz)
    }

    #[must_use]
    pub fn multiply(&self, scalar: f64) -> Velocity {
        Velocity::new(self.vx * scalar, self.vy * scalar, self.vz * scalar)
    }

    /// Scalar speed (Euclidean norm).
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy + self.vz * self.vz).sqrt()
    }

    /// Ground speed, ignoring the down component.
    #[must_use]
    pub fn horizontal_magnitude(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    /// Vertical (down) rate.
    #[must_use]
    pub fn vertical(&self) -> f64 {
        self.vz
    }

    /// Track direction in radians, clockwise from north.
    #[must_use]
    pub fn direction(&self) -> f64 {
        self.vy.atan2(self.vx)
    }

    /// Unit vector in the direction of travel. The zero velocity
    /// normalizes to itself rather than propagating NaN.
    #[must_use]
    pub fn normalize(&self) -> Velocity {
        let magnitude = self.magnitude();
        if magnitude == 0.0 {
            return Self::zero();
        }
        Velocity::new(self.vx / magnitude, self.vy / magnitude, self.vz / magnitude)
    }

    /// Cap the speed at `max_speed`, preserving direction.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidArgument`] when `max_speed` is negative.
    pub fn limit(&self, max_speed: f64) -> Result<Velocity, DomainError> {
        if max_speed < 0.0 {
            return Err(DomainError::InvalidArgument(format!(
                "max speed must be non-negative, got {max_speed}"
            )));
        }

        let current = self.magnitude();
        if current <= max_speed {
            return Ok(*self);
        }
        Ok(self.multiply(max_speed / current))
    }

    /// True when the speed is strictly below `tolerance`.
    #[must_use]
    pub fn is_stationary_within(&self, tolerance: f64) -> bool {
        self.magnitude() < tolerance
    }

    /// True when the speed is below the default 0.01 m/s tolerance.
    #[must_use]
    pub fn is_stationary(&self) -> bool {
        self.is_stationary_within(STATIONARY_TOLERANCE_MPS)
    }
}

/// Attitude as a unit quaternion (w, x, y, z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Orientation {
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Build from aerospace Euler angles (roll about north, pitch about
    /// east, yaw about down), radians, ZYX rotation order.
    #[must_use]
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();

        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// Recover (roll, pitch, yaw) in radians.
    #[must_use]
    pub fn euler(&self) -> (f64, f64, f64) {
        let roll = (2.0 * (self.w * self.x + self.y * self.z))
            .atan2(1.0 - 2.0 * (self.x * self.x + self.y * self.y));
        let pitch = (2.0 * (self.w * self.y - self.z * self.x)).clamp(-1.0, 1.0).asin();
        let yaw = (2.0 * (self.w * self.z + self.x * self.y))
            .atan2(1.0 - 2.0 * (self.y * self.y + self.z * self.z));
        (roll, pitch, yaw)
    }

    /// Heading in degrees, normalized to [0, 360).
    #[must_use]
    pub fn yaw_deg(&self) -> f64 {
        let (_, _, yaw) = self.euler();
        yaw.to_degrees().rem_euclid(360.0)
    }

    #[must_use]
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Rescale to unit length. A degenerate zero quaternion becomes the
    /// identity instead of NaN.
    #[must_use]
    pub fn normalize(&self) -> Orientation {
        let n = self.norm();
        if n == 0.0 {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product `self * other`, renormalized so composition never
    /// drifts off the unit sphere.
    #[must_use]
    pub fn compose(&self, other: &Orientation) -> Orientation {
        let (w1, x1, y1, z1) = (self.w, self.x, self.y, self.z);
        let (w2, x2, y2, z2) = (other.w, other.x, other.y, other.z);

        Self::new(
            w1 * w2 - x1 * x2 - y1 * y2 - z1 * z2,
            w1 * x2 + x1 * w2 + y1 * z2 - z1 * y2,
            w1 * y2 - x1 * z2 + y1 * w2 + z1 * x2,
            w1 * z2 + x1 * y2 - y1 * x2 + z1 * w2,
        )
        .normalize()
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

// =============================================================================
// KINEMATICS & SENSOR RECORDS
// =============================================================================

/// Full kinematic state of a vehicle, produced wholesale per telemetry
/// poll. Superseded by the next poll, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KinematicsState {
    pub position: Position,
    pub orientation: Orientation,
    pub linear_velocity: Velocity,
    pub angular_velocity: Velocity,
    pub linear_acceleration: Velocity,
    pub angular_acceleration: Velocity,
}

/// IMU reading: attitude plus body rates and accelerations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    pub orientation: Orientation,
    pub angular_velocity: Velocity,
    pub linear_acceleration: Velocity,
    pub captured_at: DateTime<Utc>,
}

/// Single-beam range reading with the sensor's mounting pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceSample {
    pub distance_m: f64,
    pub min_distance_m: f64,
    pub max_distance_m: f64,
    pub relative_position: Position,
    pub relative_orientation: Orientation,
    pub captured_at: DateTime<Utc>,
}

/// Lidar sweep: flat point cloud in x,y,z triples plus the sensor pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LidarSample {
    pub point_cloud: Vec<f32>,
    pub position: Position,
    pub orientation: Orientation,
    pub segmentation: i32,
    pub captured_at: DateTime<Utc>,
}

impl LidarSample {
    /// Number of complete x,y,z points in the cloud.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.point_cloud.len() / 3
    }
}

/// One sensor reading, tagged with its capture time. Variants are value
/// records and are never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorSnapshot {
    Imu(ImuSample),
    Distance(DistanceSample),
    Lidar(LidarSample),
}

impl SensorSnapshot {
    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            Self::Imu(s) => s.captured_at,
            Self::Distance(s) => s.captured_at,
            Self::Lidar(s) => s.captured_at,
        }
    }
}

// =============================================================================
// DEVICES & DETECTION
// =============================================================================

/// Static configuration of a sensing device. Supplied by the external
/// configuration layer; read-only to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub device_id: Uuid,
    pub name: String,
    pub position: Position,
    /// Boresight heading in degrees clockwise from north.
    pub heading_deg: f64,
    /// Minimum signal level the device can register, dBm.
    pub sensitivity_dbm: f64,
    pub min_frequency_hz: f64,
    pub max_frequency_hz: f64,
    pub scan_bandwidth_hz: f64,
    pub max_range_m: f64,
    /// Angular span around the boresight; 360 means omnidirectional.
    pub field_of_view_deg: f64,
    /// Velocity of the device itself when mounted on a moving platform.
    pub velocity: Option<Velocity>,
}

impl DeviceDescriptor {
    #[must_use]
    pub fn is_omnidirectional(&self) -> bool {
        self.field_of_view_deg >= 360.0
    }
}

/// Outcome of evaluating one device against one vehicle. Created once
/// per evaluation and handed to the event/persistence layer as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub event_id: Uuid,
    pub device_id: Uuid,
    pub vehicle_id: String,
    pub detected_position: Position,
    pub range_m: f64,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub radial_velocity_mps: f64,
    pub snr_db: f64,
    pub detected: bool,
    pub captured_at: DateTime<Utc>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_limit_caps_magnitude() {
        let v = Velocity::new(3.0, 4.0, 0.0);
        let limited = v.limit(2.5).unwrap();
        assert!((limited.magnitude() - 2.5).abs() < EPS);
        // Direction preserved
        assert!((limited.direction() - v.direction()).abs() < EPS);
    }

    #[test]
    fn test_limit_identity_below_max() {
        let v = Velocity::new(1.0, 1.0, 1.0);
        assert_eq!(v.limit(10.0).unwrap(), v);
        assert_eq!(v.limit(v.magnitude()).unwrap(), v);
    }

    #[test]
    fn test_limit_rejects_negative_max() {
        let v = Velocity::new(1.0, 0.0, 0.0);
        assert!(matches!(
            v.limit(-0.1),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Velocity::zero().normalize(), Velocity::zero());
    }

    #[test]
    fn test_normalize_unit_magnitude() {
        let v = Velocity::new(-2.0, 5.0, 0.5);
        assert!((v.normalize().magnitude() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_from_polar_direction_inverse() {
        for direction in [0.0, 0.7, 1.5, 3.0, -2.2] {
            let v = Velocity::from_polar(12.0, direction, 0.0);
            let recovered = v.direction();
            let wrapped = (recovered - direction).rem_euclid(std::f64::consts::TAU);
            assert!(wrapped < 1e-9 || (std::f64::consts::TAU - wrapped) < 1e-9);
        }
    }

    #[test]
    fn test_horizontal_magnitude_ignores_down() {
        let v = Velocity::new(3.0, 4.0, 100.0);
        assert!((v.horizontal_magnitude() - 5.0).abs() < EPS);
        assert!((v.vertical() - 100.0).abs() < EPS);
    }

    #[test]
    fn test_is_stationary_default_tolerance() {
        assert!(Velocity::new(0.001, 0.001, 0.001).is_stationary());
        assert!(!Velocity::new(0.01, 0.0, 0.0).is_stationary());
    }

    #[test]
    fn test_orientation_euler_roundtrip() {
        let q = Orientation::from_euler(0.1, -0.2, 1.3);
        let (roll, pitch, yaw) = q.euler();
        assert!((roll - 0.1).abs() < 1e-9);
        assert!((pitch + 0.2).abs() < 1e-9);
        assert!((yaw - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_compose_stays_normalized() {
        let a = Orientation::from_euler(0.4, 0.1, 2.0);
        let b = Orientation::from_euler(-0.3, 0.9, -1.1);
        let composed = a.compose(&b);
        assert!((composed.norm() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_orientation_normalize_zero_is_identity() {
        let degenerate = Orientation::new(0.0, 0.0, 0.0, 0.0);
        assert!(degenerate.normalize().is_identity());
    }

    #[test]
    fn test_yaw_deg_wraps_to_positive() {
        let q = Orientation::from_euler(0.0, 0.0, (-90.0f64).to_radians());
        assert!((q.yaw_deg() - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < EPS);
    }

    #[test]
    fn test_lidar_point_count() {
        let sample = LidarSample {
            point_cloud: vec![1.0; 9],
            position: Position::origin(),
            orientation: Orientation::identity(),
            segmentation: 0,
            captured_at: Utc::now(),
        };
        assert_eq!(sample.point_count(), 3);
    }
}
