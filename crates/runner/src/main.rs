//! Bluetooth Manager - Main Entry Point
//! Discovers nearby devices through bluetoothctl and connects to a bounded batch of them.

mod logging;
mod settings_loader;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use bluemgr_core::application::BluetoothManager;
use bluemgr_core::AppError;
use bluemgr_infra_system::ShellExecutor;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (fatal before anything else runs)
    let config_path = settings_loader::config_path();
    let settings = settings_loader::load_settings(&config_path)
        .map_err(AppError::from)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;

    // 2. Initialize logging (guard flushes the file on drop)
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!(
        version = VERSION,
        config = %config_path.display(),
        tool = %settings.tool_path.display(),
        max_connections = settings.max_connections.get(),
        "Bluetooth manager starting..."
    );

    // 3. Setup dependencies (DI wiring)
    let executor = Arc::new(ShellExecutor::from_settings(&settings));
    let manager = BluetoothManager::new(&settings, executor);

    // 4. Discover, connect, wait for every attempt
    match manager.manage_connections().await {
        Ok(attempts) => {
            info!(attempts, "Run complete.");
            Ok(())
        }
        Err(e) => {
            error!(
                kind = ?e.kind,
                command = %e.command,
                raw_errors = %e.raw_errors,
                "Device discovery failed: {}", e.message
            );
            Err(AppError::from(e).into())
        }
    }
}
