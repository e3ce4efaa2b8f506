// Central Error Type for the Application

use thiserror::Error;

/// Settings could not be loaded or did not validate.
///
/// Always fatal: raised before any discovery or connection work starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration load failed: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command error: {0}")]
    Command(#[from] crate::port::CommandError),
}
