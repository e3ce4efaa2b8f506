// Domain Layer - Pure value types shared by every component

pub mod device;
pub mod settings;

// Re-exports
pub use device::{DeviceId, DevicePattern};
pub use settings::{CommandSettings, ConnectionSettings, LogFormat, LogSettings, ScanSettings, Settings};
