//! Helper process spawning and output collection.

use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant, Sleep};

use crate::errors::{AppError, AppResult};

/// Everything a finished helper left behind.
#[derive(Debug)]
pub struct HelperOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Inactivity window for a helper: `initial` until the first stdout chunk,
/// then `settle` re-armed after every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityTimeout {
    pub initial: Duration,
    pub settle: Duration,
}

/// A deadline that moves forward every time output is observed.
pub struct DebouncedDeadline {
    timeout: InactivityTimeout,
    started: Instant,
    timer: Pin<Box<Sleep>>,
}

impl DebouncedDeadline {
    pub fn new(timeout: InactivityTimeout) -> Self {
        Self {
            timeout,
            started: Instant::now(),
            timer: Box::pin(sleep(timeout.initial)),
        }
    }

    pub fn rearm(&mut self) {
        let next = Instant::now() + self.timeout.settle;
        self.timer.as_mut().reset(next);
        log::debug!("Helper produced output, deadline re-armed for {:?}", self.timeout.settle);
    }

    pub async fn expired(&mut self) {
        self.timer.as_mut().await
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

fn spawn_helper(mut command: Command, tool: &str) -> AppResult<Child> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    log::debug!("Launching capture helper: {:?}", command.as_std());

    command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            log::error!("Capture tool {} not found", tool);
            AppError::tool_missing(tool)
        } else {
            AppError::filesystem(format!("Failed to start {}: {}", tool, e))
        }
    })
}

/// Run a helper until it exits on its own.
pub async fn run_to_completion(command: Command, tool: &str) -> AppResult<HelperOutput> {
    let child = spawn_helper(command, tool)?;
    let output = child.wait_with_output().await?;

    Ok(HelperOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run a helper, killing it once it stays silent past its deadline.
pub async fn run_with_inactivity_deadline(
    command: Command,
    tool: &str,
    timeout: InactivityTimeout,
) -> AppResult<HelperOutput> {
    let mut child = spawn_helper(command, tool)?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::filesystem("Helper stdout was not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::filesystem("Helper stderr was not captured"))?;

    let mut deadline = DebouncedDeadline::new(timeout);
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut out_chunk = [0u8; 4096];
    let mut err_chunk = [0u8; 4096];
    let mut out_open = true;
    let mut err_open = true;

    let status = loop {
        tokio::select! {
            read = stdout.read(&mut out_chunk), if out_open => match read {
                Ok(0) => out_open = false,
                Ok(n) => {
                    out_buf.extend_from_slice(&out_chunk[..n]);
                    deadline.rearm();
                }
                Err(e) => {
                    log::warn!("Failed to read helper stdout: {}", e);
                    out_open = false;
                }
            },
            read = stderr.read(&mut err_chunk), if err_open => match read {
                Ok(0) => err_open = false,
                Ok(n) => err_buf.extend_from_slice(&err_chunk[..n]),
                Err(e) => {
                    log::warn!("Failed to read helper stderr: {}", e);
                    err_open = false;
                }
            },
            status = child.wait() => break status?,
            _ = deadline.expired() => {
                let elapsed = deadline.elapsed();
                log::warn!("Capture helper {} idle for too long after {:?}, killing it", tool, elapsed);
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill capture helper: {}", e);
                }
                return Err(AppError::SubprocessTimeout {
                    after_ms: elapsed.as_millis() as u64,
                });
            }
        }
    };

    // A backgrounded grandchild can keep the pipes open after the helper exits.
    if out_open {
        drain(&mut stdout, &mut out_buf, timeout.settle).await;
    }
    if err_open {
        drain(&mut stderr, &mut err_buf, timeout.settle).await;
    }

    Ok(HelperOutput {
        status,
        stdout: String::from_utf8_lossy(&out_buf).to_string(),
        stderr: String::from_utf8_lossy(&err_buf).to_string(),
    })
}

async fn drain<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>, limit: Duration) {
    match tokio::time::timeout(limit, reader.read_to_end(buf)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => log::warn!("Failed to drain helper output: {}", e),
        Err(_) => log::warn!(
            "Helper output still open {:?} after exit, keeping {} bytes",
            limit,
            buf.len()
        ),
    }
}
