use chrono::{DateTime, Datelike, Utc};
use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat};
use md5::{Digest, Md5};
use std::io::Cursor;
use std::path::Path;

use crate::errors::{AppError, AppResult};
use crate::files::SUPPORTED_IMAGE_EXTENSIONS;

/// Number of hex characters kept from the MD5 digest.
pub const FINGERPRINT_LEN: usize = 8;

/// Canonical bytes of an image plus the extension it was read with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContent {
    pub bytes: Vec<u8>,
    pub extension: String,
}

/// Truncated MD5 of normalized content. Collisions are an accepted risk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let digest = Md5::digest(bytes);
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extension including the leading dot, case preserved; empty when absent.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn raster_format(extension: &str) -> Option<ImageFormat> {
    let ext = extension.trim_start_matches('.').to_lowercase();
    if !SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    ImageFormat::from_extension(&ext)
}

/// Whether a PNG carries `wanted` before its image data.
fn has_png_chunk(bytes: &[u8], wanted: &[u8; 4]) -> bool {
    const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
    if !bytes.starts_with(&PNG_SIGNATURE) {
        return false;
    }

    let mut offset = PNG_SIGNATURE.len();
    while offset + 8 <= bytes.len() {
        let length = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as usize;
        let chunk_type = &bytes[offset + 4..offset + 8];

        if chunk_type == wanted {
            return true;
        }
        // Animation control must precede the first IDAT
        if chunk_type == b"IDAT" || chunk_type == b"IEND" {
            break;
        }

        offset = offset.saturating_add(12).saturating_add(length);
    }

    false
}

/// Multi-frame input cannot round-trip through a single decoded frame.
fn is_animated(bytes: &[u8], format: ImageFormat) -> bool {
    match format {
        ImageFormat::Gif => GifDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.into_frames().take(2).count() > 1)
            .unwrap_or(false),
        ImageFormat::WebP => WebPDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.has_animation())
            .unwrap_or(false),
        ImageFormat::Png => has_png_chunk(bytes, b"acTL"),
        _ => false,
    }
}

/// Decode and re-encode in the same format so container metadata drops out.
///
/// Unknown extensions, animations, and anything that fails to decode or
/// encode come back unchanged; normalization never fails.
pub fn normalize_bytes(bytes: Vec<u8>, extension: &str) -> Vec<u8> {
    let Some(format) = raster_format(extension) else {
        return bytes;
    };

    if is_animated(&bytes, format) {
        log::debug!("Animated {} content, hashing raw bytes", extension);
        return bytes;
    }

    let reencoded = image::load_from_memory_with_format(&bytes, format).and_then(|img| {
        let mut output = Vec::new();
        img.write_to(&mut Cursor::new(&mut output), format)?;
        Ok(output)
    });

    match reencoded {
        Ok(output) => output,
        Err(e) => {
            log::debug!(
                "Normalization of {} content failed, hashing raw bytes: {}",
                extension,
                e
            );
            bytes
        }
    }
}

/// Read a file and normalize it off the async executor.
pub async fn normalized_content(file_path: &Path) -> AppResult<NormalizedContent> {
    let bytes = tokio::fs::read(file_path).await.map_err(|e| {
        AppError::filesystem(format!("Cannot read {}: {}", file_path.display(), e))
    })?;
    let extension = dotted_extension(file_path);

    let ext_for_task = extension.clone();
    let bytes = tokio::task::spawn_blocking(move || normalize_bytes(bytes, &ext_for_task))
        .await
        .map_err(|e| AppError::filesystem(format!("Normalization task failed to join: {}", e)))?;

    Ok(NormalizedContent { bytes, extension })
}

/// `YYYY-MM-<hash8><ext>` for the given moment.
pub fn file_name_for(content: &NormalizedContent, now: DateTime<Utc>) -> String {
    let fingerprint = ContentFingerprint::from_bytes(&content.bytes);
    format!(
        "{}-{:02}-{}{}",
        now.year(),
        now.month(),
        fingerprint,
        content.extension
    )
}

/// Content-derived remote filename for a file, month-scoped to now (UTC).
pub async fn content_file_name(file_path: &Path) -> AppResult<String> {
    let content = normalized_content(file_path).await?;
    let file_name = file_name_for(&content, Utc::now());
    log::info!("Named {} as {}", file_path.display(), file_name);
    Ok(file_name)
}
