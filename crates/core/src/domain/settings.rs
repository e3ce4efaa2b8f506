// Settings model (read once at startup, shared read-only afterwards)
//
// Field names follow the `bluetooth_manager` section of config.yaml.

use super::device::DevicePattern;
use serde::{Deserialize, Deserializer};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Default overall bound for harvesting a subordinate's output (10s)
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default grace period between SIGTERM and SIGKILL during cleanup (2s)
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Path of the interactive control-shell binary
    #[serde(rename = "bluetoothctl_path")]
    pub tool_path: PathBuf,
    /// Cap on simultaneous connection attempts (and on the batch size)
    pub max_connections: NonZeroUsize,
    pub scan: ScanSettings,
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub command: CommandSettings,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanSettings {
    /// Settle time for `scan on`, also the default for any command
    #[serde(rename = "timeout_seconds", deserialize_with = "duration_from_secs")]
    pub timeout: Duration,
    #[serde(rename = "device_regex")]
    pub device_pattern: DevicePattern,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    /// Settle time for `connect <id>`
    #[serde(deserialize_with = "duration_from_secs")]
    pub response_timeout: Duration,
    /// Substring whose presence in connect output means success
    pub expected_response: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    #[serde(rename = "collect_timeout_seconds", deserialize_with = "duration_from_secs")]
    pub collect_timeout: Duration,
    #[serde(rename = "terminate_grace_seconds", deserialize_with = "duration_from_secs")]
    pub terminate_grace: Duration,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            collect_timeout: DEFAULT_COLLECT_TIMEOUT,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub file: PathBuf,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl LogSettings {
    /// Level as a tracing filter directive.
    ///
    /// Accepts the usual level names in any case, plus `warning` and
    /// `critical`.
    pub fn filter_directive(&self) -> String {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "warning" => "warn".to_string(),
            "critical" | "fatal" => "error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Layout of log records in the log file
///
/// Any other string (e.g. a `%(asctime)s - %(message)s` template carried
/// over from an older config) selects `Full`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
    Json,
}

impl From<String> for LogFormat {
    fn from(format: String) -> Self {
        match format.trim().to_ascii_lowercase().as_str() {
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => LogFormat::Full,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        serde::de::Error::custom(format!(
            "duration must be a finite, non-negative number of seconds (got {secs})"
        ))
    })
}
