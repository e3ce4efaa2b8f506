// Interactive control-shell executor
// reason: tokio for async process management, tracing for per-session logs
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use bluemgr_core::application::constants::EXIT_COMMAND;
use bluemgr_core::domain::Settings;
use bluemgr_core::port::{CommandError, CommandExecutor};

use crate::process::{kill_now, terminate, StreamCollector};

/// Runs each command in a fresh instance of the control shell.
///
/// One session is: spawn, write the command, wait the settle time, write
/// `exit`, then harvest stdout/stderr until the shell exits or the
/// collection bound elapses. The shell is always gone when `execute`
/// returns. Any stderr output fails the command.
pub struct ShellExecutor {
    tool_path: PathBuf,
    default_settle: Duration,
    collect_timeout: Duration,
    terminate_grace: Duration,
}

impl ShellExecutor {
    /// Create a new shell executor
    ///
    /// # Arguments
    /// * `tool_path` - Control-shell binary, started without arguments
    /// * `default_settle` - Settle time when the caller gives none
    /// * `collect_timeout` - Bound on waiting for exit after `exit` is sent
    /// * `terminate_grace` - SIGTERM-to-SIGKILL delay during cleanup
    pub fn new(
        tool_path: impl Into<PathBuf>,
        default_settle: Duration,
        collect_timeout: Duration,
        terminate_grace: Duration,
    ) -> Self {
        Self {
            tool_path: tool_path.into(),
            default_settle,
            collect_timeout,
            terminate_grace,
        }
    }

    /// Executor whose default settle time is the scan timeout
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.tool_path.clone(),
            settings.scan.timeout,
            settings.command.collect_timeout,
            settings.command.terminate_grace,
        )
    }

    /// Spawn the control shell with piped stdio and the caller's environment
    fn spawn(&self, command: &str) -> Result<Child, CommandError> {
        Command::new(&self.tool_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::spawn(command, e))
    }

    /// Drive one session on an already spawned child
    async fn interact(
        &self,
        child: &mut Child,
        command: &str,
        settle: Duration,
    ) -> Result<String, CommandError> {
        let missing = |stream: &str| CommandError::io(command, format!("{stream} not captured"));
        let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = StreamCollector::spawn(child.stdout.take().ok_or_else(|| missing("stdout"))?);
        let stderr = StreamCollector::spawn(child.stderr.take().ok_or_else(|| missing("stderr"))?);

        send_line(&mut stdin, command)
            .await
            .map_err(|e| CommandError::io(command, e))?;

        sleep(settle).await;

        match send_line(&mut stdin, EXIT_COMMAND).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!(command = %command, "Control shell already closed its input");
            }
            Err(e) => return Err(CommandError::io(command, e)),
        }
        // EOF on stdin as well, for shells that ignore `exit`
        drop(stdin);

        match timeout(self.collect_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(command = %command, exit_code = ?status.code(), "Control shell exited");
                let output = stdout
                    .finish(self.terminate_grace)
                    .await
                    .map_err(|e| CommandError::io(command, e))?;
                let errors = stderr
                    .finish(self.terminate_grace)
                    .await
                    .map_err(|e| CommandError::io(command, e))?;

                if !errors.is_empty() {
                    return Err(CommandError::error_output(command, errors));
                }
                Ok(output)
            }
            Ok(Err(e)) => Err(CommandError::io(command, e)),
            Err(_) => {
                warn!(
                    command = %command,
                    collect_timeout_ms = self.collect_timeout.as_millis() as u64,
                    "Control shell did not respond in time, killing it"
                );
                kill_now(child).await;
                let errors = stderr
                    .finish(self.terminate_grace)
                    .await
                    .unwrap_or_default();
                Err(CommandError::timeout(command, errors))
            }
        }
    }
}

async fn send_line(stdin: &mut ChildStdin, line: &str) -> io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(
        &self,
        command: &str,
        settle_time: Option<Duration>,
    ) -> Result<String, CommandError> {
        // A zero wait falls back to the default, like an unset one
        let settle = settle_time
            .filter(|d| !d.is_zero())
            .unwrap_or(self.default_settle);
        let start = Instant::now();

        info!(
            command = %command,
            tool = %self.tool_path.display(),
            settle_ms = settle.as_millis() as u64,
            "Starting control shell session"
        );

        let mut child = self.spawn(command)?;
        let result = self.interact(&mut child, command, settle).await;

        // Every path ends with the shell gone
        terminate(&mut child, self.terminate_grace).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(output) => info!(
                command = %command,
                duration_ms = duration_ms,
                output_bytes = output.len(),
                "Control shell session completed"
            ),
            Err(e) => warn!(
                command = %command,
                duration_ms = duration_ms,
                kind = ?e.kind,
                "Control shell session failed"
            ),
        }

        result
    }
}
