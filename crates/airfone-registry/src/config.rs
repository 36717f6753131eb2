//! Registry timing windows and server configuration.
//!
//! Durations are written as strings with a unit suffix (`"500ms"`, `"2s"`,
//! `"1m"`). The server configuration is loaded from YAML:
//!
//! ```yaml
//! server:
//!   transport:
//!     type: tcp
//!     port: 9000
//!   log_level: info
//! registry:
//!   heartbeat_interval: 2s
//!   valid_window: 3s
//!   pending_threshold: 4s
//!   dropped_threshold: 6s
//! ```

use crate::transport::TransportConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Timing windows that drive liveness decisions.
///
/// The windows must be ordered:
/// `heartbeat_interval <= valid_window <= pending_threshold <= dropped_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How often clients send heartbeats; also the sweep interval of every topic.
    #[serde(default = "default_heartbeat_interval", with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// A running service whose last heartbeat is older than this is not
    /// offered to discovery, even though it stays in the running store.
    #[serde(default = "default_valid_window", with = "duration_serde")]
    pub valid_window: Duration,

    /// Running services silent for longer than this are demoted to pending.
    #[serde(default = "default_pending_threshold", with = "duration_serde")]
    pub pending_threshold: Duration,

    /// Pending services silent for longer than this are evicted.
    #[serde(default = "default_dropped_threshold", with = "duration_serde")]
    pub dropped_threshold: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            valid_window: default_valid_window(),
            pending_threshold: default_pending_threshold(),
            dropped_threshold: default_dropped_threshold(),
        }
    }
}

impl RegistryConfig {
    /// Validates that every window is non-zero and the windows are ordered.
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("heartbeat_interval", self.heartbeat_interval),
            ("valid_window", self.valid_window),
            ("pending_threshold", self.pending_threshold),
            ("dropped_threshold", self.dropped_threshold),
        ];

        for (name, value) in windows {
            if value.is_zero() {
                return Err(anyhow!("{} must be greater than 0", name));
            }
        }

        for pair in windows.windows(2) {
            let (lower_name, lower) = pair[0];
            let (upper_name, upper) = pair[1];
            if lower > upper {
                return Err(anyhow!(
                    "{} ({:?}) must not exceed {} ({:?})",
                    lower_name,
                    lower,
                    upper_name,
                    upper
                ));
            }
        }

        Ok(())
    }
}

/// Top-level configuration of the registry server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerOptions,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Server process options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerOptions {
    #[serde(default = "default_transport")]
    pub transport: TransportConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(content)
            .context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.server.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow!(
                    "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
                    self.server.log_level
                ))
            }
        }

        self.registry
            .validate()
            .context("Invalid registry timing windows")
    }
}

// Default value functions
fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_valid_window() -> Duration {
    Duration::from_secs(3)
}

fn default_pending_threshold() -> Duration {
    Duration::from_secs(4)
}

fn default_dropped_threshold() -> Duration {
    Duration::from_secs(6)
}

fn default_transport() -> TransportConfig {
    TransportConfig::tcp(9000)
}

fn default_log_level() -> String {
    "info".to_string()
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        // Check for "ms" BEFORE "s" since "ms" ends with 's'
        if let Some(num_str) = s.strip_suffix("ms") {
            let millis: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num_str) = s.strip_suffix('s') {
            let secs: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num_str) = s.strip_suffix('m') {
            let mins: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
