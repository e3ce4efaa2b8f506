// Device discovery: one `scan on` session, identifiers pulled out by pattern
use crate::application::constants::SCAN_COMMAND;
use crate::domain::{DeviceId, DevicePattern};
use crate::port::{CommandError, CommandExecutor};
use std::sync::Arc;
use tracing::info;

pub struct DeviceDiscovery {
    executor: Arc<dyn CommandExecutor>,
    pattern: DevicePattern,
}

impl DeviceDiscovery {
    pub fn new(executor: Arc<dyn CommandExecutor>, pattern: DevicePattern) -> Self {
        Self { executor, pattern }
    }

    /// Scan for nearby devices.
    ///
    /// Runs `scan on` with the default settle time and returns every
    /// identifier in the output, first appearance first, duplicates kept.
    /// An empty scan is `Ok(vec![])`. A `CommandError` is returned as is;
    /// there is no retry.
    pub async fn discover(&self) -> Result<Vec<DeviceId>, CommandError> {
        info!("Scanning for available Bluetooth devices...");

        let output = self.executor.execute(SCAN_COMMAND, None).await?;
        let devices = self.pattern.extract(&output);

        info!(
            count = devices.len(),
            devices = ?devices.iter().map(DeviceId::as_str).collect::<Vec<_>>(),
            "Devices found"
        );
        Ok(devices)
    }
}
