//! Telemetry translator: remote calls in, typed domain state out.
//!
//! Every poll fetches kinematics plus each registered sensor, decodes
//! the payloads, and assembles one immutable [`VehicleState`]. Remote
//! or decode failures fall back to the last-known-good cache; control
//! commands never retry on their own.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uav_domain::{KinematicsState, SensorSnapshot, Velocity};

use crate::config::{SensorKind, SensorRegistration};
use crate::connection::ConnectionManager;
use crate::error::{BridgeError, Result};
use crate::schema::{
    DistanceSensorMsg, ImuMsg, LidarMsg, MultirotorStateMsg, YawModeMsg,
};
use crate::wire::{WireValue, decode_record, encode_record};

// =============================================================================
// STATE STORE
// =============================================================================

/// One vehicle's translated state from a single poll.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    pub vehicle_id: String,
    pub kinematics: KinematicsState,
    pub sensors: HashMap<String, SensorSnapshot>,
    /// Engine capture time; staleness is the caller's judgement.
    pub captured_at: DateTime<Utc>,
}

/// Injected last-known-good cache, keyed by vehicle id.
///
/// Created at bridge startup and cleared at shutdown. Safe under
/// concurrent polling: entries for different vehicles never block or
/// corrupt each other, and within one vehicle a poll's write
/// happens-before the next poll's read.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: tokio::sync::RwLock<HashMap<String, VehicleState>>,
}

impl StateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, vehicle_id: &str) -> Option<VehicleState> {
        self.entries.read().await.get(vehicle_id).cloned()
    }

    pub async fn insert(&self, state: VehicleState) {
        self.entries
            .write()
            .await
            .insert(state.vehicle_id.clone(), state);
    }

    /// Drop every cached entry; called at bridge shutdown.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

// =============================================================================
// CONTROL COMMANDS
// =============================================================================

/// Velocity-mode control command forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityCommand {
    pub velocity: Velocity,
    pub duration_s: f64,
    pub yaw: YawModeMsg,
    /// Arm the vehicle before commanding movement.
    pub arm: bool,
}

impl VelocityCommand {
    #[must_use]
    pub fn new(velocity: Velocity, duration_s: f64) -> Self {
        Self {
            velocity,
            duration_s,
            yaw: YawModeMsg::default(),
            arm: false,
        }
    }
}

// =============================================================================
// TRANSLATOR
// =============================================================================

/// Pulls remote state through the connection manager and owns the
/// last-known-good fallback path.
pub struct TelemetryTranslator {
    manager: Arc<ConnectionManager>,
    store: Arc<StateStore>,
    sensors: Vec<SensorRegistration>,
}

impl TelemetryTranslator {
    #[must_use]
    pub fn new(
        manager: Arc<ConnectionManager>,
        store: Arc<StateStore>,
        sensors: Vec<SensorRegistration>,
    ) -> Self {
        Self {
            manager,
            store,
            sensors,
        }
    }

    /// Poll kinematics and every registered sensor for one vehicle.
    ///
    /// On any remote-call or decode failure the previously cached state
    /// for the vehicle is served instead.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NoStateAvailable`] when the live poll fails and
    /// no cached entry exists.
    pub async fn poll_vehicle_state(&self, vehicle_id: &str) -> Result<VehicleState> {
        match self.fetch_live(vehicle_id).await {
            Ok(state) => {
                self.store.insert(state.clone()).await;
                Ok(state)
            }
            Err(err) => {
                warn!(vehicle_id, error = %err, "live poll failed, trying cache");
                match self.store.get(vehicle_id).await {
                    Some(cached) => {
                        debug!(
                            vehicle_id,
                            captured_at = %cached.captured_at,
                            "serving last-known-good state"
                        );
                        Ok(cached)
                    }
                    None => Err(BridgeError::NoStateAvailable {
                        vehicle_id: vehicle_id.to_string(),
                    }),
                }
            }
        }
    }

    async fn fetch_live(&self, vehicle_id: &str) -> Result<VehicleState> {
        let poll_time = Utc::now();

        let payload = self
            .manager
            .call("getMultirotorState", vec![vehicle_id.into()])
            .await?;
        let state_msg: MultirotorStateMsg = decode_record(&payload)?;

        let mut sensors = HashMap::with_capacity(self.sensors.len());
        for registration in &self.sensors {
            let snapshot = self.fetch_sensor(vehicle_id, registration, poll_time).await?;
            sensors.insert(registration.name.clone(), snapshot);
        }

        Ok(VehicleState {
            vehicle_id: vehicle_id.to_string(),
            kinematics: state_msg.kinematics_estimated.to_domain(),
            sensors,
            captured_at: state_msg.captured_at(poll_time),
        })
    }

    async fn fetch_sensor(
        &self,
        vehicle_id: &str,
        registration: &SensorRegistration,
        poll_time: DateTime<Utc>,
    ) -> Result<SensorSnapshot> {
        let params = vec![registration.name.as_str().into(), vehicle_id.into()];
        let snapshot = match registration.kind {
            SensorKind::Imu => {
                let payload = self.manager.call("getImuData", params).await?;
                let msg: ImuMsg = decode_record(&payload)?;
                SensorSnapshot::Imu(msg.to_sample(poll_time))
            }
            SensorKind::Distance => {
                let payload = self.manager.call("getDistanceSensorData", params).await?;
                let msg: DistanceSensorMsg = decode_record(&payload)?;
                SensorSnapshot::Distance(msg.to_sample(poll_time))
            }
            SensorKind::Lidar => {
                let payload = self.manager.call("getLidarData", params).await?;
                let msg: LidarMsg = decode_record(&payload)?;
                SensorSnapshot::Lidar(msg.to_sample(poll_time))
            }
        };
        Ok(snapshot)
    }

    /// Forward a control command. Not retried automatically: repeated
    /// control commands are not idempotent-safe, so retry policy stays
    /// with the caller.
    ///
    /// # Errors
    ///
    /// [`BridgeError::ControlRejected`] when the remote end refuses the
    /// command; remote-call failures propagate unchanged.
    pub async fn send_control(&self, vehicle_id: &str, command: VelocityCommand) -> Result<()> {
        self.manager
            .call(
                "enableApiControl",
                vec![WireValue::Bool(true), vehicle_id.into()],
            )
            .await?;

        let enabled = self
            .manager
            .call("isApiControlEnabled", vec![vehicle_id.into()])
            .await?;
        if enabled.as_bool() != Some(true) {
            return Err(BridgeError::ControlRejected {
                vehicle_id: vehicle_id.to_string(),
                reason: "API control not enabled".into(),
            });
        }

        if command.arm {
            let armed = self
                .manager
                .call("armDisarm", vec![WireValue::Bool(true), vehicle_id.into()])
                .await?;
            if armed.as_bool() == Some(false) {
                return Err(BridgeError::ControlRejected {
                    vehicle_id: vehicle_id.to_string(),
                    reason: "vehicle refused to arm".into(),
                });
            }
        }

        let accepted = self
            .manager
            .call(
                "moveByVelocityAsync",
                vec![
                    command.velocity.vx.into(),
                    command.velocity.vy.into(),
                    command.velocity.vz.into(),
                    command.duration_s.into(),
                    WireValue::Int(0),
                    encode_record(&command.yaw),
                    vehicle_id.into(),
                ],
            )
            .await?;
        if accepted.as_bool() == Some(false) {
            return Err(BridgeError::ControlRejected {
                vehicle_id: vehicle_id.to_string(),
                reason: "velocity command refused".into(),
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, RetryPolicy};
    use crate::schema::{KinematicsMsg, Vector3rMsg};
    use crate::testkit::{DialScript, ScriptedDialer};
    use uav_domain::Position;

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            retry: RetryPolicy {
                max_attempts: 1,
                initial_interval_ms: 1,
                multiplier: 1.0,
                max_interval_ms: 1,
            },
            ..BridgeConfig::default()
        }
    }

    fn state_payload(x: f64) -> WireValue {
        encode_record(&MultirotorStateMsg {
            kinematics_estimated: KinematicsMsg {
                position: Vector3rMsg {
                    x_val: x,
                    y_val: 0.0,
                    z_val: -10.0,
                },
                ..Default::default()
            },
            timestamp: 1_700_000_000_000_000_000,
            ..Default::default()
        })
    }

    async fn translator_with_script(
        responses: Vec<Result<WireValue>>,
        sensors: Vec<SensorRegistration>,
    ) -> TelemetryTranslator {
        let dialer = ScriptedDialer::new(vec![DialScript::Succeed(responses)]);
        let manager =
            Arc::new(ConnectionManager::with_dialer(fast_config(), Box::new(dialer)).unwrap());
        manager.connect().await.unwrap();
        TelemetryTranslator::new(manager, Arc::new(StateStore::new()), sensors)
    }

    #[tokio::test]
    async fn test_poll_translates_kinematics() {
        let translator = translator_with_script(vec![Ok(state_payload(25.0))], vec![]).await;

        let state = translator.poll_vehicle_state("uav-1").await.unwrap();
        assert_eq!(state.vehicle_id, "uav-1");
        assert_eq!(state.kinematics.position, Position::new(25.0, 0.0, -10.0));
        assert_eq!(translator.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_poll_failure_serves_cached_state() {
        let translator = translator_with_script(
            vec![
                Ok(state_payload(25.0)),
                Err(BridgeError::ChannelIo("reset".into())),
            ],
            vec![],
        )
        .await;

        let first = translator.poll_vehicle_state("uav-1").await.unwrap();
        let second = translator.poll_vehicle_state("uav-1").await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_poll_failure_without_cache_errors() {
        let translator =
            translator_with_script(vec![Err(BridgeError::ChannelIo("reset".into()))], vec![])
                .await;

        let err = translator.poll_vehicle_state("uav-9").await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::NoStateAvailable { vehicle_id } if vehicle_id == "uav-9"
        ));
    }

    #[tokio::test]
    async fn test_failure_on_one_vehicle_leaves_others_cached() {
        let translator = translator_with_script(
            vec![
                Ok(state_payload(1.0)),
                Err(BridgeError::ChannelIo("reset".into())),
                Ok(state_payload(2.0)),
            ],
            vec![],
        )
        .await;

        translator.poll_vehicle_state("uav-1").await.unwrap();
        assert!(translator.poll_vehicle_state("uav-2").await.is_err());
        let third = translator.poll_vehicle_state("uav-3").await.unwrap();
        assert_eq!(third.kinematics.position.x, 2.0);
        assert_eq!(translator.store().len().await, 2);
    }

    #[tokio::test]
    async fn test_poll_decodes_registered_sensors() {
        let imu_payload = encode_record(&ImuMsg {
            time_stamp: 7,
            ..Default::default()
        });
        let translator = translator_with_script(
            vec![Ok(state_payload(0.0)), Ok(imu_payload)],
            vec![SensorRegistration::new("imu", SensorKind::Imu)],
        )
        .await;

        let state = translator.poll_vehicle_state("uav-1").await.unwrap();
        assert!(matches!(
            state.sensors.get("imu"),
            Some(SensorSnapshot::Imu(_))
        ));
    }

    #[tokio::test]
    async fn test_sensor_failure_falls_back_whole_poll() {
        let translator = translator_with_script(
            vec![
                // First poll: kinematics + imu succeed.
                Ok(state_payload(5.0)),
                Ok(encode_record(&ImuMsg::default())),
                // Second poll: kinematics ok, sensor read fails.
                Ok(state_payload(6.0)),
                Err(BridgeError::ChannelIo("reset".into())),
            ],
            vec![SensorRegistration::new("imu", SensorKind::Imu)],
        )
        .await;

        let first = translator.poll_vehicle_state("uav-1").await.unwrap();
        assert_eq!(first.kinematics.position.x, 5.0);

        // Partial failure must not produce a half-updated snapshot.
        let second = translator.poll_vehicle_state("uav-1").await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_send_control_happy_path() {
        let translator = translator_with_script(
            vec![
                Ok(WireValue::Nil),        // enableApiControl
                Ok(WireValue::Bool(true)), // isApiControlEnabled
                Ok(WireValue::Bool(true)), // armDisarm
                Ok(WireValue::Bool(true)), // moveByVelocityAsync
            ],
            vec![],
        )
        .await;

        let mut command = VelocityCommand::new(Velocity::new(2.0, 0.0, -1.0), 0.1);
        command.arm = true;
        translator.send_control("uav-1", command).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_control_rejected_when_api_control_disabled() {
        let translator = translator_with_script(
            vec![Ok(WireValue::Nil), Ok(WireValue::Bool(false))],
            vec![],
        )
        .await;

        let command = VelocityCommand::new(Velocity::zero(), 0.1);
        let err = translator.send_control("uav-1", command).await.unwrap_err();
        assert!(matches!(err, BridgeError::ControlRejected { .. }));
    }

    #[tokio::test]
    async fn test_store_clear() {
        let store = StateStore::new();
        store
            .insert(VehicleState {
                vehicle_id: "uav-1".into(),
                kinematics: KinematicsState::default(),
                sensors: HashMap::new(),
                captured_at: Utc::now(),
            })
            .await;
        assert!(!store.is_empty().await);

        store.clear().await;
        assert!(store.is_empty().await);
    }
}
