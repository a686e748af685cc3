use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::process::run_to_completion;
use super::{classify_exit, ensure_script_exists, ClipboardCaptureStrategy};
use crate::errors::{AppError, AppResult};

/// Line the helper prints when `xclip` is not installed.
pub const NO_XCLIP_SENTINEL: &str = "no xclip";

/// Runs `linux.sh` through `sh` and watches stdout for the missing-xclip sentinel.
pub struct UnixShellCapture {
    script: PathBuf,
}

impl UnixShellCapture {
    pub fn new(script: PathBuf) -> Self {
        Self { script }
    }

    pub(crate) fn build_command(script: &Path, target: &Path) -> Command {
        let mut command = Command::new("sh");
        command.arg(script).arg(target);
        command
    }
}

/// Only the exact sentinel line counts; other tool absences stay generic failures.
fn reports_missing_xclip(stdout: &str) -> bool {
    stdout.lines().any(|line| line.trim() == NO_XCLIP_SENTINEL)
}

#[async_trait]
impl ClipboardCaptureStrategy for UnixShellCapture {
    fn name(&self) -> &'static str {
        "sh"
    }

    fn script_path(&self) -> &Path {
        &self.script
    }

    async fn capture(&self, target: &Path) -> AppResult<()> {
        let script = ensure_script_exists(&self.script).await?;
        let output = run_to_completion(Self::build_command(&script, target), "sh").await?;

        if reports_missing_xclip(&output.stdout) {
            log::error!("Clipboard helper reports that xclip is not installed");
            return Err(AppError::tool_missing("xclip"));
        }

        classify_exit(&output, target).await
    }
}
