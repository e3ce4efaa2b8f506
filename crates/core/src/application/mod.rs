// Application Layer - Discovery, connection fan-out and the facade tying them together

pub mod connection;
pub mod constants;
pub mod discovery;
pub mod manager;

// Re-exports
pub use connection::{ConnectionManager, ConnectionOutcome};
pub use discovery::DeviceDiscovery;
pub use manager::BluetoothManager;
