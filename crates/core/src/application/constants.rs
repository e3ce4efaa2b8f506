// Control-shell commands (No magic values)

/// Starts device discovery
pub const SCAN_COMMAND: &str = "scan on";

/// Prefix of the per-device connect command (`connect <id>`)
pub const CONNECT_COMMAND: &str = "connect";

/// Ends the interactive session
pub const EXIT_COMMAND: &str = "exit";

/// Build the connect command for one device
pub fn connect_command(device: &crate::domain::DeviceId) -> String {
    format!("{} {}", CONNECT_COMMAND, device)
}
