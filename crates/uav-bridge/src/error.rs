//! Bridge error taxonomy.
//!
//! Transient remote faults are absorbed at the telemetry translator via
//! the last-known-good cache; structural errors propagate to the caller.
//! Nothing in this crate panics outside of tests.

use thiserror::Error;

/// Bridge-level errors
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Retries exhausted while establishing the channel. Not retried
    /// further automatically.
    #[error("connection failed after {attempts} attempts to {endpoint}")]
    ConnectionFailed { endpoint: String, attempts: u32 },

    /// A single RPC call failed on an otherwise healthy channel.
    #[error("remote call '{method}' failed: {reason}")]
    RemoteCallFailed { method: String, reason: String },

    /// The remote end refused a control command. Never silently retried;
    /// control commands are not idempotent-safe.
    #[error("control command rejected for vehicle '{vehicle_id}': {reason}")]
    ControlRejected { vehicle_id: String, reason: String },

    /// Live poll failed and no cached fallback exists for the vehicle.
    #[error("no cached state available for vehicle '{vehicle_id}'")]
    NoStateAvailable { vehicle_id: String },

    /// Channel is not in a usable state for the requested operation.
    #[error("channel not connected (state: {state})")]
    NotConnected { state: &'static str },

    /// The manager was closed; terminal.
    #[error("connection manager is closed")]
    Closed,

    /// Malformed configuration; fails immediately, no retry.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Wire-level payload did not have the expected shape.
    #[error("malformed wire payload: {0}")]
    MalformedPayload(String),

    /// Socket-level failure while dialing or mid-call. Absorbed by the
    /// retry loop or converted to `RemoteCallFailed` at the call site.
    #[error("channel I/O error: {0}")]
    ChannelIo(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
