//! # UAV Simulation Bridge
//!
//! Long-lived RPC bridge between a running drone/physics simulation
//! engine and the application: pulls vehicle kinematics and sensor
//! payloads over MessagePack-RPC, translates them into typed domain
//! values, and serves last-known-good state when the engine misbehaves.
//!
//! Layering, leaf first: [`wire`] (map-of-fields codec) -> [`schema`]
//! (per-message records) -> [`rpc`] (framing + TCP channel) ->
//! [`connection`] (channel lifecycle) -> [`telemetry`] (polling,
//! caching, control).

pub mod config;
pub mod connection;
pub mod error;
pub mod rpc;
pub mod schema;
pub mod telemetry;
pub mod wire;

pub use config::{BridgeConfig, RetryPolicy, SensorKind, SensorRegistration};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{BridgeError, Result};
pub use telemetry::{StateStore, TelemetryTranslator, VehicleState, VelocityCommand};

#[cfg(test)]
pub(crate) mod testkit {
    //! Scripted dialer and channel used by connection and telemetry
    //! tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{BridgeError, Result};
    use crate::rpc::{Dialer, RpcChannel};
    use crate::wire::WireValue;

    /// Outcome of one scripted dial attempt.
    pub enum DialScript {
        Fail,
        /// Never resolves; exercises cancellation mid-dial.
        Hang,
        Succeed(Vec<Result<WireValue>>),
    }

    pub struct ScriptedDialer {
        attempts: Arc<AtomicU32>,
        scripts: Mutex<VecDeque<DialScript>>,
    }

    impl ScriptedDialer {
        pub fn new(scripts: Vec<DialScript>) -> Self {
            Self {
                attempts: Arc::new(AtomicU32::new(0)),
                scripts: Mutex::new(scripts.into()),
            }
        }

        /// Handle to the dial-attempt counter, shared with the test.
        pub fn attempts(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.attempts)
        }
    }

    #[async_trait]
    impl Dialer for ScriptedDialer {
        async fn dial(
            &self,
            _host: &str,
            _port: u16,
            _timeout: Duration,
        ) -> Result<Box<dyn RpcChannel>> {
            self.attempts.fetch_add(1, Ordering::AcqRel);
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(DialScript::Succeed(responses)) => Ok(Box::new(ScriptedChannel {
                    responses: responses.into(),
                })),
                Some(DialScript::Hang) => std::future::pending().await,
                _ => Err(BridgeError::ChannelIo("dial refused by script".into())),
            }
        }
    }

    /// Channel that replays canned responses in order.
    pub struct ScriptedChannel {
        responses: VecDeque<Result<WireValue>>,
    }

    #[async_trait]
    impl RpcChannel for ScriptedChannel {
        async fn call(&mut self, method: &str, _params: Vec<WireValue>) -> Result<WireValue> {
            self.responses.pop_front().unwrap_or_else(|| {
                Err(BridgeError::RemoteCallFailed {
                    method: method.to_string(),
                    reason: "script exhausted".into(),
                })
            })
        }
    }
}
