//! Client configuration loaded from environment variables
//!
//! Defaults match a local executor on the standard port. Any key may be
//! overridden through the environment or a `.env` file.

use crate::connection::SessionConfig;
use gesture_bridge_shared::{
    env::{env_string, parse_env, parse_env_duration_ms},
    protocol::{DEFAULT_PORT, DEFAULT_SAMPLE_EVERY},
};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the gesture client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Executor `host:port`
    pub executor_addr: String,
    /// Bound on a single connect attempt
    pub connect_timeout: Duration,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Only every Nth recognition event is considered
    pub sample_every: u64,
    /// Directory holding mapping snapshots
    pub mapping_dir: PathBuf,
    /// Snapshot applied at startup
    pub mapping_profile: Option<String>,
    /// How long shutdown waits for the transport to drain before forcing it
    pub shutdown_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            executor_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            sample_every: DEFAULT_SAMPLE_EVERY,
            mapping_dir: PathBuf::from("configs"),
            mapping_profile: None,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            executor_addr: env_string("EXECUTOR_ADDR").unwrap_or(defaults.executor_addr),
            connect_timeout: parse_env_duration_ms("CONNECT_TIMEOUT_MS", defaults.connect_timeout),
            reconnect_delay: parse_env_duration_ms("RECONNECT_DELAY_MS", defaults.reconnect_delay),
            max_reconnect_delay: parse_env_duration_ms(
                "MAX_RECONNECT_DELAY_MS",
                defaults.max_reconnect_delay,
            ),
            sample_every: parse_env("SAMPLE_EVERY", defaults.sample_every),
            mapping_dir: env_string("MAPPING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.mapping_dir),
            mapping_profile: env_string("MAPPING_PROFILE"),
            shutdown_grace: parse_env_duration_ms("SHUTDOWN_GRACE_MS", defaults.shutdown_grace),
        }
    }

    /// Settings for the transport session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect_delay: self.reconnect_delay,
            max_reconnect_delay: self.max_reconnect_delay.max(self.reconnect_delay),
            ..SessionConfig::default()
        }
    }
}
