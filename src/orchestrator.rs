use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::capture::{platform_strategy, ClipboardCaptureStrategy};
use crate::config::Config;
use crate::errors::AppResult;
use crate::files::{FileSystemGuard, InputValidator};
use crate::image_processor;
use crate::uploader::{ImageHostClient, ImagePayload, UploadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageOrigin {
    /// Written by a capture helper into the scratch directory; ours to delete.
    Scratch,
    /// Chosen by the user; never deleted.
    UserSelected,
}

/// An image on disk waiting to be uploaded exactly once.
#[derive(Debug)]
pub struct CapturedImage {
    path: PathBuf,
    created_at: DateTime<Utc>,
    origin: ImageOrigin,
}

impl CapturedImage {
    fn scratch(dir: &Path, created_at: DateTime<Utc>) -> Self {
        Self {
            path: FileSystemGuard::scratch_file_path(dir, created_at),
            created_at,
            origin: ImageOrigin::Scratch,
        }
    }

    fn user_selected(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            created_at: Utc::now(),
            origin: ImageOrigin::UserSelected,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_scratch(&self) -> bool {
        self.origin == ImageOrigin::Scratch
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// What a successful invocation hands to the insertion collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub display_name: String,
    pub url: String,
}

/// Terminal state of one invocation: the uploaded image or a classified failure.
pub type CaptureOutcome = AppResult<UploadedImage>;

/// Drives capture, naming and upload for a single user command.
pub struct CaptureOrchestrator {
    config: Config,
    strategy: Box<dyn ClipboardCaptureStrategy>,
    uploader: ImageHostClient,
}

impl CaptureOrchestrator {
    /// Orchestrator using the capture strategy for the running platform.
    pub fn new(config: Config) -> AppResult<Self> {
        let strategy = platform_strategy(&config);
        Self::with_strategy(config, strategy)
    }

    pub fn with_strategy(
        config: Config,
        strategy: Box<dyn ClipboardCaptureStrategy>,
    ) -> AppResult<Self> {
        let uploader = ImageHostClient::new(&config)?;
        Ok(Self {
            config,
            strategy,
            uploader,
        })
    }

    /// Capture the clipboard image into a scratch file, upload it, then delete the scratch file.
    pub async fn capture_from_clipboard(&self) -> CaptureOutcome {
        let scratch_dir = self.config.scratch_directory();
        FileSystemGuard::prepare_scratch_dir(&scratch_dir).await?;

        let image = CapturedImage::scratch(&scratch_dir, Utc::now());
        log::info!(
            "Capturing clipboard with {} helper {} into {}",
            self.strategy.name(),
            self.strategy.script_path().display(),
            image.path().display()
        );

        if let Err(e) = self.strategy.capture(image.path()).await {
            log::warn!("Clipboard capture failed: {}", e);
            // A helper may leave a partial file behind before failing.
            FileSystemGuard::remove_scratch_file(image.path()).await;
            return Err(e);
        }

        self.upload_image(image).await
    }

    /// Upload a file the user picked. The file is left untouched.
    pub async fn capture_from_file(&self, path: &Path) -> CaptureOutcome {
        InputValidator::validate_source_file(path).await?;

        if !InputValidator::is_supported_image(path) {
            log::warn!(
                "{} is not a recognised raster image; it will be hashed as raw bytes",
                path.display()
            );
        }

        self.upload_image(CapturedImage::user_selected(path)).await
    }

    async fn upload_image(&self, image: CapturedImage) -> CaptureOutcome {
        log::debug!(
            "Uploading {} (captured {})",
            image.display_name(),
            image.created_at().to_rfc3339()
        );
        let result = self.upload_path(image.path()).await;

        if image.is_scratch() {
            FileSystemGuard::remove_scratch_file(image.path()).await;
        }

        let upload = result?;
        Ok(UploadedImage {
            display_name: image.display_name(),
            url: upload.url,
        })
    }

    async fn upload_path(&self, path: &Path) -> AppResult<UploadResult> {
        let file_name = image_processor::content_file_name(path).await?;
        let payload = ImagePayload::from_path(path, file_name).await?;
        self.uploader.upload(payload).await
    }
}
