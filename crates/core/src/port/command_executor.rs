// Command Executor Port
// Abstraction over one timed interaction with the external control shell

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// What went wrong while running a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// The control shell could not be started
    Spawn,
    /// Writing to or reading from the control shell failed
    Io,
    /// The control shell wrote to its error stream
    ErrorOutput,
    /// The control shell did not exit within the collection bound
    Timeout,
}

/// The single structured error of the execution layer.
///
/// `raw_errors` holds whatever the subordinate wrote to stderr (possibly
/// empty), or the underlying I/O error text.
#[derive(Error, Debug, Clone)]
#[error("{message}\nCommand: {command}\nErrors: {raw_errors}")]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub message: String,
    pub command: String,
    pub raw_errors: String,
}

impl CommandError {
    pub fn new(
        kind: CommandErrorKind,
        message: impl Into<String>,
        command: impl Into<String>,
        raw_errors: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            command: command.into(),
            raw_errors: raw_errors.into(),
        }
    }

    pub fn spawn(command: &str, err: impl ToString) -> Self {
        Self::new(
            CommandErrorKind::Spawn,
            "Failed to start the control shell.",
            command,
            err.to_string(),
        )
    }

    pub fn io(command: &str, err: impl ToString) -> Self {
        Self::new(
            CommandErrorKind::Io,
            "I/O error while talking to the control shell.",
            command,
            err.to_string(),
        )
    }

    pub fn error_output(command: &str, stderr: impl Into<String>) -> Self {
        Self::new(
            CommandErrorKind::ErrorOutput,
            "Error executing command.",
            command,
            stderr,
        )
    }

    pub fn timeout(command: &str, stderr: impl Into<String>) -> Self {
        Self::new(
            CommandErrorKind::Timeout,
            "Command timeout. Bluetooth operation did not respond in time.",
            command,
            stderr,
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == CommandErrorKind::Timeout
    }
}

/// Command Executor trait
///
/// Implementations:
/// - ShellExecutor (infra-system): spawns the control shell per command
/// - mocks::ScriptedExecutor: canned output for tests
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` in a fresh control-shell session and return its stdout.
    ///
    /// `settle_time` is how long to wait after sending the command before
    /// asking the shell to exit. It is a heuristic, not a completion signal;
    /// `None` or zero means the configured scan timeout.
    ///
    /// # Errors
    /// - `CommandErrorKind::Spawn` if the shell cannot be started
    /// - `CommandErrorKind::ErrorOutput` if anything was written to stderr
    /// - `CommandErrorKind::Timeout` if the shell does not exit in time
    async fn execute(
        &self,
        command: &str,
        settle_time: Option<Duration>,
    ) -> Result<String, CommandError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Canned reaction to a command
    #[derive(Debug, Clone)]
    pub enum MockReply {
        /// Return this stdout
        Output(String),
        /// Fail with this error kind and raw error text
        Fail(CommandErrorKind, String),
        /// Panic with message (for task isolation testing)
        Panic(String),
    }

    /// Mock executor answering by command prefix
    ///
    /// The first rule whose prefix matches wins; unmatched commands get
    /// empty output. Tracks every call and the highest number of calls
    /// running at once.
    pub struct ScriptedExecutor {
        rules: Vec<(String, MockReply)>,
        delay: Duration,
        calls: Mutex<Vec<(String, Option<Duration>)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self {
                rules: Vec::new(),
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn on(mut self, prefix: impl Into<String>, reply: MockReply) -> Self {
            self.rules.push((prefix.into(), reply));
            self
        }

        pub fn on_output(self, prefix: impl Into<String>, output: impl Into<String>) -> Self {
            self.on(prefix, MockReply::Output(output.into()))
        }

        /// Simulated time each call spends "inside" the shell
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> Vec<(String, Option<Duration>)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn commands(&self) -> Vec<String> {
            self.calls().into_iter().map(|(c, _)| c).collect()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn reply_for(&self, command: &str) -> MockReply {
            self.rules
                .iter()
                .find(|(prefix, _)| command.starts_with(prefix.as_str()))
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| MockReply::Output(String::new()))
        }
    }

    impl Default for ScriptedExecutor {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            command: &str,
            settle_time: Option<Duration>,
        ) -> Result<String, CommandError> {
            self.calls
                .lock()
                .unwrap()
                .push((command.to_string(), settle_time));

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.reply_for(command) {
                MockReply::Output(out) => Ok(out),
                MockReply::Fail(kind, raw) => {
                    Err(CommandError::new(kind, "Mock failure.", command, raw))
                }
                MockReply::Panic(msg) => panic!("{}", msg),
            }
        }
    }
}
