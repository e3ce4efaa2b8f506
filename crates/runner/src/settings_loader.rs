//! Settings loading (YAML file + environment overrides)
//!
//! The file path comes from `BLUETOOTH_MANAGER_CONFIG` (default
//! `config.yaml`). Every value lives under the `bluetooth_manager` key and
//! can be overridden with `BLUEMGR_`-prefixed variables, using `__` for
//! nesting:
//!
//! ```text
//! BLUEMGR_BLUETOOTH_MANAGER__MAX_CONNECTIONS=5
//! BLUEMGR_BLUETOOTH_MANAGER__SCAN__TIMEOUT_SECONDS=20
//! ```

use bluemgr_core::domain::Settings;
use bluemgr_core::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "BLUETOOTH_MANAGER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const ENV_PREFIX: &str = "BLUEMGR";
pub const SETTINGS_KEY: &str = "bluetooth_manager";

/// Path of the settings file for this process
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load and validate settings from `path` plus the process environment
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    load_settings_with_env(path, None)
}

/// Same as [`load_settings`], with an explicit environment instead of the
/// process one when `env` is `Some`
pub fn load_settings_with_env(
    path: &Path,
    env: Option<HashMap<String, String>>,
) -> Result<Settings, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::Load(format!(
            "Configuration file not found at {}",
            path.display()
        )));
    }

    let config = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .map_err(|e| ConfigError::Load(format!("Error parsing the configuration file: {e}")))?;

    config
        .get::<Settings>(SETTINGS_KEY)
        .map_err(|e| ConfigError::Invalid(e.to_string()))
}
