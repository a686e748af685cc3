// Uploader module - sends content-named images to the image store
//
// The store deduplicates by filename, so every upload goes out under its
// content-derived name and failures are never retried here.

pub mod image_host_client;

pub use image_host_client::{ImageHostClient, ImagePayload, UploadResult};
