// Bluetooth Manager Core - Domain Logic & Ports
// NO process or file-system dependencies (adapters live in infra crates)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, ConfigError};
