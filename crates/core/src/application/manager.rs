// Bluetooth Manager facade - builds discovery + connection manager from one Settings
use crate::application::connection::{ConnectionManager, ConnectionOutcome};
use crate::application::discovery::DeviceDiscovery;
use crate::domain::{DeviceId, Settings};
use crate::port::{CommandError, CommandExecutor};
use std::sync::Arc;

/// Entry point for the orchestration logic
///
/// Discovery always completes before any connect session starts.
pub struct BluetoothManager {
    discovery: Arc<DeviceDiscovery>,
    connections: ConnectionManager,
}

impl BluetoothManager {
    /// Wire all components to the same executor
    ///
    /// # Example
    /// ```ignore
    /// let executor = Arc::new(ShellExecutor::from_settings(&settings));
    /// let manager = BluetoothManager::new(&settings, executor);
    /// manager.manage_connections().await?;
    /// ```
    pub fn new(settings: &Settings, executor: Arc<dyn CommandExecutor>) -> Self {
        let discovery = Arc::new(DeviceDiscovery::new(
            Arc::clone(&executor),
            settings.scan.device_pattern.clone(),
        ));
        let connections = ConnectionManager::new(
            Arc::clone(&discovery),
            executor,
            settings.max_connections,
            settings.connection.response_timeout,
            settings.connection.expected_response.clone(),
        );

        Self {
            discovery,
            connections,
        }
    }

    pub async fn discover_devices(&self) -> Result<Vec<DeviceId>, CommandError> {
        self.discovery.discover().await
    }

    pub async fn connect_device(&self, device: &DeviceId) -> ConnectionOutcome {
        self.connections.connect_device(device).await
    }

    /// Discover, then connect to the first `max_connections` devices
    pub async fn manage_connections(&self) -> Result<usize, CommandError> {
        self.connections.manage_connections().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::{CommandSettings, ConnectionSettings, LogSettings, ScanSettings};
    use crate::domain::{DevicePattern, LogFormat};
    use crate::port::command_executor::mocks::ScriptedExecutor;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn settings(max: usize) -> Settings {
        Settings {
            tool_path: "/usr/bin/bluetoothctl".into(),
            max_connections: NonZeroUsize::new(max).unwrap(),
            scan: ScanSettings {
                timeout: Duration::from_millis(1),
                device_pattern: DevicePattern::new(r"[0-9A-F]{2}(?::[0-9A-F]{2}){5}").unwrap(),
            },
            connection: ConnectionSettings {
                response_timeout: Duration::from_millis(2),
                expected_response: "Connection successful".to_string(),
            },
            command: CommandSettings::default(),
            logging: LogSettings {
                file: "logs/test.log".into(),
                level: "INFO".to_string(),
                format: LogFormat::Full,
            },
        }
    }

    #[tokio::test]
    async fn test_end_to_end_two_of_three() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .on_output(
                    "scan on",
                    "[NEW] Device AA:BB:CC:DD:EE:01 A\n\
                     [NEW] Device AA:BB:CC:DD:EE:02 B\n\
                     [NEW] Device AA:BB:CC:DD:EE:03 C\n",
                )
                .on_output("connect AA:BB:CC:DD:EE:01", "Connection successful")
                .on_output("connect", "Failed to connect"),
        );
        let manager = BluetoothManager::new(&settings(2), executor.clone());

        let launched = manager.manage_connections().await.unwrap();

        let commands = executor.commands();
        assert_eq!(launched, 2);
        assert_eq!(commands[0], "scan on");
        assert!(commands.contains(&"connect AA:BB:CC:DD:EE:01".to_string()));
        assert!(commands.contains(&"connect AA:BB:CC:DD:EE:02".to_string()));
        assert!(!commands.contains(&"connect AA:BB:CC:DD:EE:03".to_string()));
    }

    #[tokio::test]
    async fn test_facade_uses_configured_marker() {
        let executor = Arc::new(ScriptedExecutor::new().on_output("connect", "...Connection successful..."));
        let manager = BluetoothManager::new(&settings(1), executor);

        let outcome = manager
            .connect_device(&DeviceId::from("AA:BB:CC:DD:EE:01"))
            .await;

        assert!(outcome.is_connected());
    }
}
