use thiserror::Error;

/// Every way a capture-and-upload invocation can fail.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No image found on the clipboard")]
    ClipboardEmpty,

    #[error("Required tool not found: {tool}. Please install it and try again.")]
    ToolMissing { tool: String },

    #[error("Capture helper script not found: {path}")]
    ScriptMissing { path: String },

    #[error("Clipboard capture timed out after {after_ms}ms without output")]
    SubprocessTimeout { after_ms: u64 },

    #[error("Capture helper failed ({}): {stderr}", exit_code_label(.code))]
    SubprocessNonZeroExit { code: Option<i32>, stderr: String },

    #[error("Network error: {detail}")]
    NetworkFailure { detail: String },

    #[error("Upload failed: {detail}")]
    RemoteRejected { detail: String },

    #[error("Filesystem error: {detail}")]
    FilesystemFailure { detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },
}

/// Broad grouping of failures, used to pick how a front end words its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Environment,
    ClipboardState,
    Subprocess,
    Remote,
    Configuration,
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Convert to string for front ends
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::FilesystemFailure {
            detail: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        Self::NetworkFailure {
            detail: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::Config(error.to_string())
    }
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn tool_missing(tool: &str) -> Self {
        Self::ToolMissing {
            tool: tool.to_string(),
        }
    }

    pub fn script_missing(path: &std::path::Path) -> Self {
        Self::ScriptMissing {
            path: path.display().to_string(),
        }
    }

    pub fn non_zero_exit(code: Option<i32>, stderr: &str) -> Self {
        Self::SubprocessNonZeroExit {
            code,
            stderr: stderr.trim().to_string(),
        }
    }

    pub fn remote_rejected(detail: &str) -> Self {
        Self::RemoteRejected {
            detail: detail.to_string(),
        }
    }

    pub fn filesystem(detail: impl Into<String>) -> Self {
        Self::FilesystemFailure {
            detail: detail.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::ToolMissing { .. }
            | AppError::ScriptMissing { .. }
            | AppError::FilesystemFailure { .. } => ErrorCategory::Environment,
            AppError::ClipboardEmpty => ErrorCategory::ClipboardState,
            AppError::SubprocessTimeout { .. } | AppError::SubprocessNonZeroExit { .. } => {
                ErrorCategory::Subprocess
            }
            AppError::NetworkFailure { .. } | AppError::RemoteRejected { .. } => {
                ErrorCategory::Remote
            }
            AppError::Config(_) | AppError::Validation { .. } => ErrorCategory::Configuration,
        }
    }
}
