//! Connection and polling configuration.
//!
//! Defaults match the simulation engine's standard RPC endpoint and the
//! retry envelope used by the surrounding application.

use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Exponential backoff policy for channel establishment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval_ms: 1000,
            multiplier: 2.0,
            max_interval_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff interval before retrying after `attempt` failures
    /// (1-based), capped at the configured maximum.
    #[must_use]
    pub fn backoff_interval(&self, attempt: u32) -> Duration {
        let scaled = self.initial_interval_ms as f64 * self.multiplier.powi(attempt as i32 - 1);
        let capped = scaled.min(self.max_interval_ms as f64);
        Duration::from_millis(capped as u64)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(BridgeError::InvalidConfig(
                "retry max_attempts must be at least 1".into(),
            ));
        }
        if self.multiplier < 1.0 {
            return Err(BridgeError::InvalidConfig(format!(
                "retry multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// Bridge connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Consecutive health-check failures tolerated in `Degraded` before
    /// the channel is torn down.
    pub health_failure_threshold: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 41451,
            connect_timeout_ms: 5000,
            retry: RetryPolicy::default(),
            health_failure_threshold: 3,
        }
    }
}

impl BridgeConfig {
    /// Validate the configuration before the first connect.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidConfig`] for an empty host, a zero
    /// timeout, or a degenerate retry policy.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(BridgeError::InvalidConfig("host must not be empty".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(BridgeError::InvalidConfig(
                "connect timeout must be non-zero".into(),
            ));
        }
        if self.health_failure_threshold == 0 {
            return Err(BridgeError::InvalidConfig(
                "health failure threshold must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Kinds of sensor the engine exposes per vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Imu,
    Distance,
    Lidar,
}

/// A sensor registered for inclusion in every vehicle poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorRegistration {
    pub name: String,
    pub kind: SensorKind,
}

impl SensorRegistration {
    pub fn new(name: impl Into<String>, kind: SensorKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_interval(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_interval(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_interval(3), Duration::from_millis(4000));
        // Capped at max_interval_ms
        assert_eq!(policy.backoff_interval(10), Duration::from_millis(10_000));
    }

    #[test]
    fn test_config_validation() {
        assert!(BridgeConfig::default().validate().is_ok());

        let mut bad_host = BridgeConfig::default();
        bad_host.host.clear();
        assert!(matches!(
            bad_host.validate(),
            Err(BridgeError::InvalidConfig(_))
        ));

        let mut bad_retry = BridgeConfig::default();
        bad_retry.retry.max_attempts = 0;
        assert!(bad_retry.validate().is_err());
    }
}
