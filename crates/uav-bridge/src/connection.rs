//! Connection manager: owns the RPC channel lifecycle.
//!
//! State machine:
//!
//! ```text
//! Disconnected --connect--> Connecting --success--> Connected
//! Connecting --failure--> Disconnected (attempt recorded, backoff)
//! Connected --ping failure--> Degraded --ping success--> Connected
//! Degraded --failures beyond threshold--> Disconnected
//! any state --close--> Closed (terminal)
//! ```
//!
//! The manager holds no business data; it is purely connectivity. The
//! single channel handle sits behind an async mutex so only one call is
//! ever in flight, and backoff sleeps never hold that lock.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::rpc::{Dialer, RpcChannel, TcpDialer};
use crate::wire::WireValue;

/// Channel lifecycle state. Owned exclusively by the manager; other
/// components only observe usable-or-not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Degraded = 3,
    Closed = 4,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Degraded => "degraded",
            Self::Closed => "closed",
        }
    }

    /// Calls may proceed in `Connected`, and best-effort in `Degraded`.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Connected | Self::Degraded)
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Degraded,
            4 => Self::Closed,
            _ => Self::Disconnected,
        }
    }
}

/// Resets `Connecting` to `Disconnected` if a connect attempt is
/// cancelled mid-dial. Disarmed once the dial outcome is known.
struct DialGuard<'a> {
    manager: &'a ConnectionManager,
    armed: bool,
}

impl Drop for DialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.transition(ConnectionState::Disconnected);
        }
    }
}

/// Owns the channel handle and its state machine.
pub struct ConnectionManager {
    config: BridgeConfig,
    dialer: Box<dyn Dialer>,
    state: AtomicU8,
    channel: tokio::sync::Mutex<Option<Box<dyn RpcChannel>>>,
    health_strikes: AtomicU32,
}

impl ConnectionManager {
    /// Build a manager with the production TCP dialer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidConfig`] for a malformed config.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::with_dialer(config, Box::new(TcpDialer))
    }

    /// Build with a custom dialer; the seam used by tests.
    pub fn with_dialer(config: BridgeConfig, dialer: Box<dyn Dialer>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            dialer,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            channel: tokio::sync::Mutex::new(None),
            health_strikes: AtomicU32::new(0),
        })
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Transition the state machine. `Closed` is terminal: once there,
    /// nothing but `Closed` can be stored again.
    fn transition(&self, to: ConnectionState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let from = ConnectionState::from_u8(current);
            if from == ConnectionState::Closed && to != ConnectionState::Closed {
                return false;
            }
            if from == to {
                return true;
            }
            match self.state.compare_exchange(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    info!(from = from.as_str(), to = to.as_str(), "connection state change");
                    return true;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Establish the channel, retrying with exponential backoff.
    ///
    /// Dropping the returned future at any point, mid-dial included,
    /// leaves the state `Disconnected`; no retry continues in the
    /// background.
    ///
    /// # Errors
    ///
    /// [`BridgeError::ConnectionFailed`] once every attempt is spent,
    /// [`BridgeError::Closed`] after `close()`.
    pub async fn connect(&self) -> Result<()> {
        if self.state() == ConnectionState::Closed {
            return Err(BridgeError::Closed);
        }

        let retry = self.config.retry;
        for attempt in 1..=retry.max_attempts {
            if !self.transition(ConnectionState::Connecting) {
                return Err(BridgeError::Closed);
            }

            // Dropping the future mid-dial must not strand `Connecting`.
            let outcome = {
                let mut guard = DialGuard {
                    manager: self,
                    armed: true,
                };
                let outcome = self
                    .dialer
                    .dial(
                        &self.config.host,
                        self.config.port,
                        self.config.connect_timeout(),
                    )
                    .await;
                guard.armed = false;
                outcome
            };

            match outcome {
                Ok(channel) => {
                    *self.channel.lock().await = Some(channel);
                    self.health_strikes.store(0, Ordering::Release);
                    if !self.transition(ConnectionState::Connected) {
                        // Closed raced us; drop the fresh channel.
                        self.channel.lock().await.take();
                        return Err(BridgeError::Closed);
                    }
                    return Ok(());
                }
                Err(err) => {
                    self.transition(ConnectionState::Disconnected);
                    warn!(
                        attempt,
                        max_attempts = retry.max_attempts,
                        endpoint = %self.config.endpoint(),
                        error = %err,
                        "connect attempt failed"
                    );
                    if attempt < retry.max_attempts {
                        // Waits locally, holding no locks.
                        tokio::time::sleep(retry.backoff_interval(attempt)).await;
                    }
                }
            }
        }

        Err(BridgeError::ConnectionFailed {
            endpoint: self.config.endpoint(),
            attempts: retry.max_attempts,
        })
    }

    /// Issue one serialized call on the channel.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] when the channel is not usable;
    /// otherwise whatever the call itself produced.
    pub async fn call(&self, method: &str, params: Vec<WireValue>) -> Result<WireValue> {
        let state = self.state();
        if !state.is_usable() {
            return Err(BridgeError::NotConnected {
                state: state.as_str(),
            });
        }

        let mut guard = self.channel.lock().await;
        let Some(channel) = guard.as_mut() else {
            return Err(BridgeError::NotConnected {
                state: self.state().as_str(),
            });
        };
        channel.call(method, params).await
    }

    /// Lightweight health check driving the Connected/Degraded pair.
    ///
    /// Returns whether the round trip succeeded. Repeated failures
    /// beyond the configured threshold tear the channel down.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Closed`] after `close()`, [`BridgeError::NotConnected`]
    /// when no channel exists.
    pub async fn ping(&self) -> Result<bool> {
        let state = self.state();
        if state == ConnectionState::Closed {
            return Err(BridgeError::Closed);
        }
        if !state.is_usable() {
            return Err(BridgeError::NotConnected {
                state: state.as_str(),
            });
        }

        let outcome = {
            let mut guard = self.channel.lock().await;
            let Some(channel) = guard.as_mut() else {
                return Err(BridgeError::NotConnected {
                    state: self.state().as_str(),
                });
            };
            channel.call("ping", Vec::new()).await
        };

        match outcome {
            Ok(_) => {
                self.health_strikes.store(0, Ordering::Release);
                if self.state() == ConnectionState::Degraded {
                    self.transition(ConnectionState::Connected);
                }
                Ok(true)
            }
            Err(err) => {
                let strikes = self.health_strikes.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(strikes, error = %err, "health check failed");
                if strikes >= self.config.health_failure_threshold {
                    self.transition(ConnectionState::Disconnected);
                    self.channel.lock().await.take();
                } else {
                    self.transition(ConnectionState::Degraded);
                }
                Ok(false)
            }
        }
    }

    /// Handshake used right after `connect()`: one mandatory round trip.
    ///
    /// # Errors
    ///
    /// Propagates the underlying call failure.
    pub async fn confirm_connection(&self) -> Result<()> {
        self.call("ping", Vec::new()).await.map(|_| ())
    }

    /// Release the channel and mark the manager terminally closed.
    /// Idempotent and safe from any state.
    pub async fn close(&self) {
        self.transition(ConnectionState::Closed);
        self.channel.lock().await.take();
    }
}
