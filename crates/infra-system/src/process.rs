// Child process helpers: output draining and termination
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 4096;

/// Drains one output stream of a child in the background.
///
/// Bytes are appended to a shared buffer as they arrive, so whatever was
/// read is still available when the child had to be killed mid-stream.
pub struct StreamCollector {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<io::Result<()>>,
}

impl StreamCollector {
    pub fn spawn<R>(mut reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                let n = reader.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(());
                }
                sink.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .extend_from_slice(&chunk[..n]);
            }
        });
        Self { buf, task }
    }

    /// Wait up to `bound` for end-of-stream, then return what was read.
    ///
    /// A stream still open after `bound` (e.g. inherited by a grandchild) is
    /// abandoned rather than waited on.
    pub async fn finish(mut self, bound: Duration) -> io::Result<String> {
        match timeout(bound, &mut self.task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(join_err)) => return Err(io::Error::other(join_err)),
            Err(_) => {
                debug!("Output stream still open, abandoning reader");
                self.task.abort();
            }
        }
        let bytes = self.buf.lock().unwrap_or_else(|p| p.into_inner());
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for StreamCollector {
    // An unfinished collector must not outlive its session
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Make sure `child` is gone and reaped.
///
/// Already-exited children are left alone. Otherwise SIGTERM first, then
/// SIGKILL once `grace` has passed.
pub async fn terminate(child: &mut Child, grace: Duration) {
    match child.try_wait() {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not query child status, killing"),
    }

    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            info!(pid = %pid, "Sending SIGTERM to control shell");
            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => match timeout(grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        info!(pid = %pid, status = %status, "Control shell exited after SIGTERM");
                        return;
                    }
                    Ok(Err(e)) => warn!(pid = %pid, error = %e, "Waiting after SIGTERM failed"),
                    Err(_) => warn!(pid = %pid, "Control shell did not exit after SIGTERM, sending SIGKILL"),
                },
                Err(e) => warn!(pid = %pid, error = %e, "SIGTERM failed"),
            }
        }
    }

    kill_now(child).await;
}

/// SIGKILL (or platform equivalent) and reap.
pub async fn kill_now(child: &mut Child) {
    if let Err(e) = child.kill().await {
        // Only fails if the child is already reaped
        debug!(error = %e, "Kill after exit");
    }
}
