//! Heartbeat monitor configuration.

use std::time::Duration;
use thiserror::Error;

/// Errors from heartbeat configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("leader heartbeat timeout must be greater than zero")]
    ZeroTimeout,
    #[error("leader heartbeat count must be greater than zero")]
    ZeroCount,
    #[error("leader heartbeat timeout {timeout:?} is too short to split into {count} heartbeats")]
    IntervalTooSmall { timeout: Duration, count: u64 },
}

/// Timing parameters of the leader-liveness watchdog.
///
/// # Example
///
/// ```
/// use vigil_heartbeat::HeartbeatConfig;
/// use std::time::Duration;
///
/// let config = HeartbeatConfig::default()
///     .with_leader_heartbeat_timeout(Duration::from_secs(30))
///     .with_leader_heartbeat_count(5);
///
/// assert_eq!(config.heartbeat_interval(), Duration::from_secs(6));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// How long a follower waits for a qualifying heartbeat before it reports
    /// the leader.
    ///
    /// Default: 60 seconds
    pub leader_heartbeat_timeout: Duration,

    /// Number of heartbeats a healthy leader sends per timeout window.
    ///
    /// Default: 10
    pub leader_heartbeat_count: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            leader_heartbeat_timeout: Duration::from_secs(60),
            leader_heartbeat_count: 10,
        }
    }
}

impl HeartbeatConfig {
    /// Set the follower timeout window.
    pub fn with_leader_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.leader_heartbeat_timeout = timeout;
        self
    }

    /// Set the number of heartbeats per timeout window.
    pub fn with_leader_heartbeat_count(mut self, count: u64) -> Self {
        self.leader_heartbeat_count = count;
        self
    }

    /// Expected spacing between two heartbeats of a healthy leader.
    ///
    /// The leader broadcasts on every tick it receives, so this is the period
    /// a production clock should tick at. Returns zero for a zero count; call
    /// [`validate`](Self::validate) first.
    pub fn heartbeat_interval(&self) -> Duration {
        match u32::try_from(self.leader_heartbeat_count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.leader_heartbeat_timeout / count,
            Err(_) => {
                let nanos = self.leader_heartbeat_timeout.as_nanos()
                    / u128::from(self.leader_heartbeat_count);
                Duration::from_nanos(nanos as u64)
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.leader_heartbeat_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.leader_heartbeat_count == 0 {
            return Err(ConfigError::ZeroCount);
        }
        if self.heartbeat_interval().is_zero() {
            return Err(ConfigError::IntervalTooSmall {
                timeout: self.leader_heartbeat_timeout,
                count: self.leader_heartbeat_count,
            });
        }
        Ok(())
    }
}
