use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::process::run_to_completion;
use super::{classify_exit, ensure_script_exists, ClipboardCaptureStrategy};
use crate::errors::AppResult;

const OSASCRIPT: &str = "osascript";

/// Runs `mac.applescript` through `osascript`; the exit code alone decides success.
pub struct MacOsAppleScriptCapture {
    script: PathBuf,
}

impl MacOsAppleScriptCapture {
    pub fn new(script: PathBuf) -> Self {
        Self { script }
    }

    pub(crate) fn build_command(script: &Path, target: &Path) -> Command {
        let mut command = Command::new(OSASCRIPT);
        command.arg(script).arg(target);
        command
    }
}

#[async_trait]
impl ClipboardCaptureStrategy for MacOsAppleScriptCapture {
    fn name(&self) -> &'static str {
        "osascript"
    }

    fn script_path(&self) -> &Path {
        &self.script
    }

    async fn capture(&self, target: &Path) -> AppResult<()> {
        let script = ensure_script_exists(&self.script).await?;
        let output = run_to_completion(Self::build_command(&script, target), OSASCRIPT).await?;
        classify_exit(&output, target).await
    }
}
