//! Per-message wire schemas for the simulation engine's RPC payloads.
//!
//! Field names follow the engine's wire protocol (`x_val`,
//! `kinematics_estimated`, `time_stamp`, ...). Each schema is an
//! explicit [`WireRecord`] with conversions into the domain types;
//! there is deliberately no shared message base type.

use chrono::{DateTime, Utc};
use uav_domain::{
    DistanceSample, ImuSample, KinematicsState, LidarSample, Orientation, Position, Velocity,
};

use crate::wire::{FieldOutcome, WireRecord, WireValue, apply_nested, encode_record};

fn float_field(slot: &mut f64, value: &WireValue) -> FieldOutcome {
    match value.as_f64() {
        Some(f) => {
            *slot = f;
            FieldOutcome::Applied
        }
        None => FieldOutcome::Invalid { expected: "float" },
    }
}

fn int_field(slot: &mut i64, value: &WireValue) -> FieldOutcome {
    match value.as_i64() {
        Some(i) => {
            *slot = i;
            FieldOutcome::Applied
        }
        None => FieldOutcome::Invalid { expected: "integer" },
    }
}

fn bool_field(slot: &mut bool, value: &WireValue) -> FieldOutcome {
    match value.as_bool() {
        Some(b) => {
            *slot = b;
            FieldOutcome::Applied
        }
        None => FieldOutcome::Invalid { expected: "bool" },
    }
}

/// Engine timestamps are nanoseconds since the epoch; zero means the
/// engine did not stamp the message and the poll time is used instead.
fn capture_time(time_stamp_ns: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    if time_stamp_ns == 0 {
        fallback
    } else {
        DateTime::from_timestamp_nanos(time_stamp_ns)
    }
}

// =============================================================================
// GEOMETRY MESSAGES
// =============================================================================

/// Wire vector (`x_val`, `y_val`, `z_val`), NED.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3rMsg {
    pub x_val: f64,
    pub y_val: f64,
    pub z_val: f64,
}

impl WireRecord for Vector3rMsg {
    const RECORD_NAME: &'static str = "Vector3r";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            ("x_val", self.x_val.into()),
            ("y_val", self.y_val.into()),
            ("z_val", self.z_val.into()),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "x_val" => float_field(&mut self.x_val, value),
            "y_val" => float_field(&mut self.y_val, value),
            "z_val" => float_field(&mut self.z_val, value),
            _ => FieldOutcome::Unknown,
        }
    }
}

impl Vector3rMsg {
    #[must_use]
    pub fn to_position(self) -> Position {
        Position::new(self.x_val, self.y_val, self.z_val)
    }

    #[must_use]
    pub fn to_velocity(self) -> Velocity {
        Velocity::new(self.x_val, self.y_val, self.z_val)
    }

    #[must_use]
    pub fn from_velocity(v: &Velocity) -> Self {
        Self {
            x_val: v.vx,
            y_val: v.vy,
            z_val: v.vz,
        }
    }
}

/// Wire quaternion (`w_val`, `x_val`, `y_val`, `z_val`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuaternionrMsg {
    pub w_val: f64,
    pub x_val: f64,
    pub y_val: f64,
    pub z_val: f64,
}

impl Default for QuaternionrMsg {
    fn default() -> Self {
        Self {
            w_val: 1.0,
            x_val: 0.0,
            y_val: 0.0,
            z_val: 0.0,
        }
    }
}

impl WireRecord for QuaternionrMsg {
    const RECORD_NAME: &'static str = "Quaternionr";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            ("w_val", self.w_val.into()),
            ("x_val", self.x_val.into()),
            ("y_val", self.y_val.into()),
            ("z_val", self.z_val.into()),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "w_val" => float_field(&mut self.w_val, value),
            "x_val" => float_field(&mut self.x_val, value),
            "y_val" => float_field(&mut self.y_val, value),
            "z_val" => float_field(&mut self.z_val, value),
            _ => FieldOutcome::Unknown,
        }
    }
}

impl QuaternionrMsg {
    /// Convert to a domain orientation, renormalizing engine drift.
    #[must_use]
    pub fn to_orientation(self) -> Orientation {
        Orientation::new(self.w_val, self.x_val, self.y_val, self.z_val).normalize()
    }
}

/// Wire pose: position plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseMsg {
    pub position: Vector3rMsg,
    pub orientation: QuaternionrMsg,
}

impl WireRecord for PoseMsg {
    const RECORD_NAME: &'static str = "Pose";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            ("position", encode_record(&self.position)),
            ("orientation", encode_record(&self.orientation)),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "position" => apply_nested(&mut self.position, value),
            "orientation" => apply_nested(&mut self.orientation, value),
            _ => FieldOutcome::Unknown,
        }
    }
}

// =============================================================================
// KINEMATICS MESSAGES
// =============================================================================

/// Full kinematic state as the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicsMsg {
    pub position: Vector3rMsg,
    pub orientation: QuaternionrMsg,
    pub linear_velocity: Vector3rMsg,
    pub angular_velocity: Vector3rMsg,
    pub linear_acceleration: Vector3rMsg,
    pub angular_acceleration: Vector3rMsg,
}

impl WireRecord for KinematicsMsg {
    const RECORD_NAME: &'static str = "KinematicsState";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            ("position", encode_record(&self.position)),
            ("orientation", encode_record(&self.orientation)),
            ("linear_velocity", encode_record(&self.linear_velocity)),
            ("angular_velocity", encode_record(&self.angular_velocity)),
            (
                "linear_acceleration",
                encode_record(&self.linear_acceleration),
            ),
            (
                "angular_acceleration",
                encode_record(&self.angular_acceleration),
            ),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "position" => apply_nested(&mut self.position, value),
            "orientation" => apply_nested(&mut self.orientation, value),
            "linear_velocity" => apply_nested(&mut self.linear_velocity, value),
            "angular_velocity" => apply_nested(&mut self.angular_velocity, value),
            "linear_acceleration" => apply_nested(&mut self.linear_acceleration, value),
            "angular_acceleration" => apply_nested(&mut self.angular_acceleration, value),
            _ => FieldOutcome::Unknown,
        }
    }
}

impl KinematicsMsg {
    #[must_use]
    pub fn to_domain(self) -> KinematicsState {
        KinematicsState {
            position: self.position.to_position(),
            orientation: self.orientation.to_orientation(),
            linear_velocity: self.linear_velocity.to_velocity(),
            angular_velocity: self.angular_velocity.to_velocity(),
            linear_acceleration: self.linear_acceleration.to_velocity(),
            angular_acceleration: self.angular_acceleration.to_velocity(),
        }
    }
}

/// Vehicle state envelope returned by the kinematics poll.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MultirotorStateMsg {
    pub kinematics_estimated: KinematicsMsg,
    pub timestamp: i64,
    pub landed_state: i64,
    pub ready: bool,
    pub can_arm: bool,
}

impl WireRecord for MultirotorStateMsg {
    const RECORD_NAME: &'static str = "MultirotorState";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            (
                "kinematics_estimated",
                encode_record(&self.kinematics_estimated),
            ),
            ("timestamp", self.timestamp.into()),
            ("landed_state", self.landed_state.into()),
            ("ready", self.ready.into()),
            ("can_arm", self.can_arm.into()),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "kinematics_estimated" => apply_nested(&mut self.kinematics_estimated, value),
            "timestamp" => int_field(&mut self.timestamp, value),
            "landed_state" => int_field(&mut self.landed_state, value),
            "ready" => bool_field(&mut self.ready, value),
            "can_arm" => bool_field(&mut self.can_arm, value),
            _ => FieldOutcome::Unknown,
        }
    }
}

impl MultirotorStateMsg {
    #[must_use]
    pub fn captured_at(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        capture_time(self.timestamp, fallback)
    }
}

// =============================================================================
// SENSOR MESSAGES
// =============================================================================

/// IMU payload.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuMsg {
    pub time_stamp: i64,
    pub orientation: QuaternionrMsg,
    pub angular_velocity: Vector3rMsg,
    pub linear_acceleration: Vector3rMsg,
}

impl WireRecord for ImuMsg {
    const RECORD_NAME: &'static str = "ImuData";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            ("time_stamp", self.time_stamp.into()),
            ("orientation", encode_record(&self.orientation)),
            ("angular_velocity", encode_record(&self.angular_velocity)),
            (
                "linear_acceleration",
                encode_record(&self.linear_acceleration),
            ),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "time_stamp" => int_field(&mut self.time_stamp, value),
            "orientation" => apply_nested(&mut self.orientation, value),
            "angular_velocity" => apply_nested(&mut self.angular_velocity, value),
            "linear_acceleration" => apply_nested(&mut self.linear_acceleration, value),
            _ => FieldOutcome::Unknown,
        }
    }
}

impl ImuMsg {
    #[must_use]
    pub fn to_sample(self, fallback: DateTime<Utc>) -> ImuSample {
        ImuSample {
            orientation: self.orientation.to_orientation(),
            angular_velocity: self.angular_velocity.to_velocity(),
            linear_acceleration: self.linear_acceleration.to_velocity(),
            captured_at: capture_time(self.time_stamp, fallback),
        }
    }
}

/// Distance sensor payload.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistanceSensorMsg {
    pub time_stamp: i64,
    pub distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub relative_pose: PoseMsg,
}

impl WireRecord for DistanceSensorMsg {
    const RECORD_NAME: &'static str = "DistanceSensorData";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            ("time_stamp", self.time_stamp.into()),
            ("distance", self.distance.into()),
            ("min_distance", self.min_distance.into()),
            ("max_distance", self.max_distance.into()),
            ("relative_pose", encode_record(&self.relative_pose)),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "time_stamp" => int_field(&mut self.time_stamp, value),
            "distance" => float_field(&mut self.distance, value),
            "min_distance" => float_field(&mut self.min_distance, value),
            "max_distance" => float_field(&mut self.max_distance, value),
            "relative_pose" => apply_nested(&mut self.relative_pose, value),
            _ => FieldOutcome::Unknown,
        }
    }
}

impl DistanceSensorMsg {
    #[must_use]
    pub fn to_sample(self, fallback: DateTime<Utc>) -> DistanceSample {
        DistanceSample {
            distance_m: self.distance,
            min_distance_m: self.min_distance,
            max_distance_m: self.max_distance,
            relative_position: self.relative_pose.position.to_position(),
            relative_orientation: self.relative_pose.orientation.to_orientation(),
            captured_at: capture_time(self.time_stamp, fallback),
        }
    }
}

/// Lidar payload: point cloud as a flat float array in x,y,z triples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LidarMsg {
    pub time_stamp: i64,
    pub point_cloud: Vec<f32>,
    pub pose: PoseMsg,
    pub segmentation: i64,
}

impl WireRecord for LidarMsg {
    const RECORD_NAME: &'static str = "LidarData";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            ("time_stamp", self.time_stamp.into()),
            (
                "point_cloud",
                WireValue::Seq(self.point_cloud.iter().map(|p| (*p).into()).collect()),
            ),
            ("pose", encode_record(&self.pose)),
            ("segmentation", self.segmentation.into()),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "time_stamp" => int_field(&mut self.time_stamp, value),
            "point_cloud" => match value.as_f32_seq() {
                Some(points) => {
                    self.point_cloud = points;
                    FieldOutcome::Applied
                }
                None => FieldOutcome::Invalid {
                    expected: "float sequence",
                },
            },
            "pose" => apply_nested(&mut self.pose, value),
            "segmentation" => int_field(&mut self.segmentation, value),
            _ => FieldOutcome::Unknown,
        }
    }
}

impl LidarMsg {
    #[must_use]
    pub fn to_sample(self, fallback: DateTime<Utc>) -> LidarSample {
        let captured_at = capture_time(self.time_stamp, fallback);
        LidarSample {
            point_cloud: self.point_cloud,
            position: self.pose.position.to_position(),
            orientation: self.pose.orientation.to_orientation(),
            segmentation: self.segmentation as i32,
            captured_at,
        }
    }
}

// =============================================================================
// CONTROL MESSAGES
// =============================================================================

/// Yaw handling for velocity control: hold an angle or command a rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct YawModeMsg {
    pub is_rate: bool,
    pub yaw_or_rate: f64,
}

impl YawModeMsg {
    #[must_use]
    pub fn rate(yaw_rate_dps: f64) -> Self {
        Self {
            is_rate: true,
            yaw_or_rate: yaw_rate_dps,
        }
    }

    #[must_use]
    pub fn hold(yaw_deg: f64) -> Self {
        Self {
            is_rate: false,
            yaw_or_rate: yaw_deg,
        }
    }
}

impl WireRecord for YawModeMsg {
    const RECORD_NAME: &'static str = "YawMode";

    fn fields(&self) -> Vec<(&'static str, WireValue)> {
        vec![
            ("is_rate", self.is_rate.into()),
            ("yaw_or_rate", self.yaw_or_rate.into()),
        ]
    }

    fn apply_field(&mut self, key: &str, value: &WireValue) -> FieldOutcome {
        match key {
            "is_rate" => bool_field(&mut self.is_rate, value),
            "yaw_or_rate" => float_field(&mut self.yaw_or_rate, value),
            _ => FieldOutcome::Unknown,
        }
    }
}
