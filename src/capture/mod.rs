// Clipboard capture - pulls the current clipboard image into a file on disk
//
// Each operating system family has its own helper and its own launch rules,
// so every family gets one ClipboardCaptureStrategy implementation.

pub mod macos;
pub mod process;
pub mod unix;
pub mod windows;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::errors::{AppError, AppResult};

pub use macos::MacOsAppleScriptCapture;
pub use process::{HelperOutput, InactivityTimeout};
pub use unix::UnixShellCapture;
pub use windows::WindowsPowerShellCapture;

/// Port for extracting the clipboard image into `target`.
#[async_trait]
pub trait ClipboardCaptureStrategy: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// The helper script this strategy runs.
    fn script_path(&self) -> &Path;

    /// Local inactivity timeout, if this variant has one. Only the Windows
    /// helper is bounded locally; the others run until they exit.
    fn inactivity_timeout(&self) -> Option<InactivityTimeout> {
        None
    }

    /// Write the clipboard image to `target`.
    ///
    /// Returns `ClipboardEmpty` when the helper succeeds without producing the file.
    async fn capture(&self, target: &Path) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Unix,
}

impl Platform {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Unix,
        }
    }

    pub fn helper_script_name(&self) -> &'static str {
        match self {
            Platform::Windows => "pc.ps1",
            Platform::MacOs => "mac.applescript",
            Platform::Unix => "linux.sh",
        }
    }
}

/// Pick the capture strategy for `platform`, with helpers from the configured directory.
pub fn strategy_for(platform: Platform, config: &Config) -> Box<dyn ClipboardCaptureStrategy> {
    let script = config
        .helpers_directory()
        .join(platform.helper_script_name());

    match platform {
        Platform::Windows => Box::new(WindowsPowerShellCapture::new(
            script,
            InactivityTimeout {
                initial: config.capture_initial_timeout(),
                settle: config.capture_settle_timeout(),
            },
        )),
        Platform::MacOs => Box::new(MacOsAppleScriptCapture::new(script)),
        Platform::Unix => Box::new(UnixShellCapture::new(script)),
    }
}

/// Strategy for the platform this process runs on.
pub fn platform_strategy(config: &Config) -> Box<dyn ClipboardCaptureStrategy> {
    let platform = Platform::detect();
    log::info!("Using {:?} clipboard capture", platform);
    strategy_for(platform, config)
}

pub(crate) async fn ensure_script_exists(script: &Path) -> AppResult<PathBuf> {
    if tokio::fs::try_exists(script).await.unwrap_or(false) {
        Ok(script.to_path_buf())
    } else {
        log::error!("Capture helper script missing: {}", script.display());
        Err(AppError::script_missing(script))
    }
}

/// Map a finished helper onto the capture contract.
pub(crate) async fn classify_exit(output: &HelperOutput, target: &Path) -> AppResult<()> {
    if !output.status.success() {
        log::error!(
            "Capture helper exited with {:?}: {}",
            output.status.code(),
            output.stderr.trim()
        );
        return Err(AppError::non_zero_exit(output.status.code(), &output.stderr));
    }

    if !tokio::fs::try_exists(target).await.unwrap_or(false) {
        log::info!("Capture helper succeeded but wrote no image; clipboard is empty");
        return Err(AppError::ClipboardEmpty);
    }

    log::info!("Captured clipboard image to {}", target.display());
    Ok(())
}
