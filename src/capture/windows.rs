use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::process::{run_with_inactivity_deadline, InactivityTimeout};
use super::{classify_exit, ensure_script_exists, ClipboardCaptureStrategy};
use crate::errors::AppResult;

const SYSTEM_POWERSHELL: &str = r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe";

/// Runs `pc.ps1` through a non-interactive, profile-less, hidden PowerShell.
///
/// This is the only variant with a local timeout: the helper is killed once it
/// stays silent past its inactivity window.
pub struct WindowsPowerShellCapture {
    script: PathBuf,
    timeout: InactivityTimeout,
}

impl WindowsPowerShellCapture {
    pub fn new(script: PathBuf, timeout: InactivityTimeout) -> Self {
        Self { script, timeout }
    }

    fn interpreter() -> PathBuf {
        let system = Path::new(SYSTEM_POWERSHELL);
        if system.exists() {
            system.to_path_buf()
        } else {
            PathBuf::from("powershell")
        }
    }

    pub(crate) fn build_command(interpreter: &Path, script: &Path, target: &Path) -> Command {
        let invocation = format!(
            "& '{}' -imagePath '{}'",
            quote_single(&script.to_string_lossy()),
            quote_single(&target.to_string_lossy())
        );

        let mut command = Command::new(interpreter);
        command.args([
            "-noprofile",
            "-noninteractive",
            "-nologo",
            "-sta",
            "-executionpolicy",
            "Bypass",
            "-windowstyle",
            "hidden",
            "-Command",
        ]);
        command.arg(invocation);
        command
    }
}

/// Escape a value for a single-quoted PowerShell string.
fn quote_single(value: &str) -> String {
    value.replace('\'', "''")
}

#[async_trait]
impl ClipboardCaptureStrategy for WindowsPowerShellCapture {
    fn name(&self) -> &'static str {
        "powershell"
    }

    fn script_path(&self) -> &Path {
        &self.script
    }

    fn inactivity_timeout(&self) -> Option<InactivityTimeout> {
        Some(self.timeout)
    }

    async fn capture(&self, target: &Path) -> AppResult<()> {
        let script = ensure_script_exists(&self.script).await?;
        let command = Self::build_command(&Self::interpreter(), &script, target);

        let output = run_with_inactivity_deadline(command, "PowerShell", self.timeout).await?;
        if !output.stdout.trim().is_empty() {
            log::debug!("PowerShell output: {}", output.stdout.trim());
        }

        classify_exit(&output, target).await
    }
}
