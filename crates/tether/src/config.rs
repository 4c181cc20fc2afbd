//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_reconnect::{BackoffPolicy, ReconnectConfig};
use tracing::warn;

use crate::TetherError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Everything a [`Session`](crate::Session) can be tuned with.
///
/// Loads from JSON with camelCase keys; any key left out keeps its default:
///
/// ```json
/// { "maxReconnectAttempts": 8, "pingIntervalMs": 2000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Where `connect(None)` dials. Default: `ws://127.0.0.1:8080`.
    pub endpoint: String,

    /// Automatic attempts before giving up. Default: 5.
    pub max_reconnect_attempts: u32,

    /// Delay before the first automatic attempt; doubles each time.
    /// Default: 1000 ms.
    pub base_reconnect_delay_ms: u64,

    /// Ceiling for the doubling. Default: 30000 ms.
    pub max_reconnect_delay_ms: u64,

    /// How long one attempt may take before it counts as failed.
    /// Default: 10000 ms.
    pub connection_timeout_ms: u64,

    /// How long to wait for the server's answer to a rejoin before treating
    /// the silence as a rejection. Default: 10000 ms.
    pub rejoin_timeout_ms: u64,

    /// Latency probe period while connected. Default: 5000 ms.
    pub ping_interval_ms: u64,

    /// Actions held while offline. Default: 100.
    pub queue_capacity: usize,

    /// Held actions older than this are dropped instead of replayed.
    /// Default: 30000 ms.
    pub queue_ttl_ms: u64,

    /// Random spread applied to each backoff delay (0.0–1.0). Default: 0.0,
    /// i.e. delays follow the doubling formula exactly.
    pub backoff_jitter: f64,

    /// Buffered events per subscriber before the slowest starts losing the
    /// oldest. Default: 256.
    pub event_channel_capacity: usize,

    /// How long `destroy()` waits for the session task. Default: 1000 ms.
    pub shutdown_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080".to_string(),
            max_reconnect_attempts: 5,
            base_reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 30_000,
            connection_timeout_ms: 10_000,
            rejoin_timeout_ms: 10_000,
            ping_interval_ms: 5_000,
            queue_capacity: 100,
            queue_ttl_ms: 30_000,
            backoff_jitter: 0.0,
            event_channel_capacity: 256,
            shutdown_timeout_ms: 1_000,
        }
    }
}

impl SessionConfig {
    /// Parses a JSON config. Missing keys take their defaults.
    ///
    /// # Errors
    /// [`TetherError::Config`] if the JSON is malformed or a value has the
    /// wrong type.
    pub fn from_json(json: &str) -> Result<Self, TetherError> {
        serde_json::from_str(json).map_err(|e| TetherError::Config(e.to_string()))
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called by [`Session::start`](crate::Session::start). Rules:
    /// - delays, intervals and timeouts are at least 1 ms
    /// - `max_reconnect_delay_ms` is at least `base_reconnect_delay_ms`
    /// - `backoff_jitter` is clamped to `0.0..=1.0`
    /// - `queue_capacity` and `event_channel_capacity` are at least 1
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("baseReconnectDelayMs", &mut self.base_reconnect_delay_ms),
            ("connectionTimeoutMs", &mut self.connection_timeout_ms),
            ("rejoinTimeoutMs", &mut self.rejoin_timeout_ms),
            ("pingIntervalMs", &mut self.ping_interval_ms),
            ("queueTtlMs", &mut self.queue_ttl_ms),
            ("shutdownTimeoutMs", &mut self.shutdown_timeout_ms),
        ] {
            if *value == 0 {
                warn!(option = name, "zero duration, using 1 ms");
                *value = 1;
            }
        }
        if self.max_reconnect_delay_ms < self.base_reconnect_delay_ms {
            warn!(
                max = self.max_reconnect_delay_ms,
                base = self.base_reconnect_delay_ms,
                "maxReconnectDelayMs below base delay, raising it"
            );
            self.max_reconnect_delay_ms = self.base_reconnect_delay_ms;
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter) {
            let jitter = if self.backoff_jitter.is_nan() {
                0.0
            } else {
                self.backoff_jitter.clamp(0.0, 1.0)
            };
            warn!(jitter = self.backoff_jitter, clamped = jitter, "backoffJitter out of range");
            self.backoff_jitter = jitter;
        }
        if self.queue_capacity == 0 {
            warn!("queueCapacity of 0, using 1");
            self.queue_capacity = 1;
        }
        if self.event_channel_capacity == 0 {
            warn!("eventChannelCapacity of 0, using 1");
            self.event_channel_capacity = 1;
        }
        self
    }

    pub fn base_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn rejoin_timeout(&self) -> Duration {
        Duration::from_millis(self.rejoin_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn queue_ttl(&self) -> Duration {
        Duration::from_millis(self.queue_ttl_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// The reconnection controller's slice of this config.
    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            max_attempts: self.max_reconnect_attempts,
            backoff: BackoffPolicy {
                base: self.base_reconnect_delay(),
                max: self.max_reconnect_delay(),
                jitter: self.backoff_jitter,
            },
            connect_timeout: self.connection_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.base_reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.max_reconnect_delay(), Duration::from_secs(30));
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert_eq!(config.rejoin_timeout(), Duration::from_secs(10));
        assert_eq!(config.ping_interval(), Duration::from_secs(5));
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.queue_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_json_uses_camel_case_and_defaults() {
        let config = SessionConfig::from_json(
            r#"{ "maxReconnectAttempts": 3, "queueTtlMs": 500 }"#,
        )
        .unwrap();
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.queue_ttl(), Duration::from_millis(500));
        assert_eq!(config.ping_interval_ms, 5_000);
    }

    #[test]
    fn test_from_json_rejects_wrong_types() {
        let err = SessionConfig::from_json(r#"{ "queueCapacity": "lots" }"#)
            .unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
    }

    #[test]
    fn test_validated_clamps() {
        let config = SessionConfig {
            base_reconnect_delay_ms: 0,
            max_reconnect_delay_ms: 0,
            rejoin_timeout_ms: 0,
            backoff_jitter: 4.0,
            queue_capacity: 0,
            event_channel_capacity: 0,
            ..SessionConfig::default()
        }
        .validated();

        assert_eq!(config.base_reconnect_delay_ms, 1);
        assert_eq!(config.max_reconnect_delay_ms, 1);
        assert_eq!(config.rejoin_timeout_ms, 1);
        assert_eq!(config.backoff_jitter, 1.0);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn test_reconnect_config_mirrors_session_config() {
        let rc = SessionConfig::default().reconnect_config();
        assert_eq!(rc.max_attempts, 5);
        assert_eq!(rc.backoff, BackoffPolicy::default());
        assert_eq!(rc.connect_timeout, Duration::from_secs(10));
    }
}
