use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::errors::{AppError, AppResult};

/// Raster formats the normalizer re-encodes. Anything else is hashed raw.
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

const WRITE_PROBE_NAME: &str = ".write-probe";

pub struct InputValidator;

impl InputValidator {
    /// A user-selected file must exist and be a regular file.
    pub async fn validate_source_file(path: &Path) -> AppResult<()> {
        if path.as_os_str().is_empty() {
            return Err(AppError::validation("file_path", "File path cannot be empty"));
        }

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            AppError::filesystem(format!("Cannot read {}: {}", path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(AppError::filesystem(format!(
                "{} is not a file",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn is_supported_image(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

// Scratch directory utilities
pub struct FileSystemGuard;

impl FileSystemGuard {
    /// Create the scratch directory if needed and prove it is writable.
    pub async fn prepare_scratch_dir(dir: &Path) -> AppResult<()> {
        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AppError::filesystem(format!(
                    "Scratch directory {} could not be created: {}",
                    dir.display(),
                    e
                ))
            })?;
            log::info!("Created scratch directory: {}", dir.display());
        }

        let probe = dir.join(WRITE_PROBE_NAME);
        tokio::fs::write(&probe, b"probe").await.map_err(|e| {
            AppError::filesystem(format!(
                "Scratch directory {} is not writable: {}",
                dir.display(),
                e
            ))
        })?;

        if let Err(e) = tokio::fs::remove_file(&probe).await {
            log::debug!("Could not remove write probe {}: {}", probe.display(), e);
        }

        Ok(())
    }

    /// Time-based scratch file name; content naming happens at upload time.
    pub fn scratch_file_path(dir: &Path, created_at: DateTime<Utc>) -> PathBuf {
        dir.join(format!("image-{}.png", created_at.timestamp_millis()))
    }

    /// Remove a scratch file, logging rather than failing.
    pub async fn remove_scratch_file(path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => log::debug!("Removed scratch file: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove scratch file {}: {}", path.display(), e),
        }
    }
}
