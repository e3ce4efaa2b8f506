// Bluetooth Manager Infrastructure - System Adapters
// Implements: CommandExecutor over the interactive control shell

pub mod process;
pub mod shell_executor;

pub use shell_executor::ShellExecutor;
