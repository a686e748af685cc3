//! Clipboard and file image upload to the OKY image store.
//!
//! Images are named by a month-scoped fingerprint of their normalized pixels,
//! so the same picture uploaded twice in a month lands on the same remote name.

pub mod capture;
pub mod config;
pub mod errors;
pub mod files;
pub mod image_processor;
pub mod orchestrator;
pub mod uploader;

pub use errors::{AppError, AppResult, ErrorCategory};
pub use orchestrator::{CaptureOrchestrator, CaptureOutcome, UploadedImage};
