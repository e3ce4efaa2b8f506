// Port Layer - Interfaces for external dependencies

pub mod command_executor;

// Re-exports
pub use command_executor::{CommandError, CommandErrorKind, CommandExecutor};
