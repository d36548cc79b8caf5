//! Image encoding: raw file bytes to a base64 data URI.
//!
//! Vision APIs accept images as base64 data URIs embedded in the JSON
//! request body. The photo bytes are sent exactly as they sit on disk;
//! no decoding, resizing, or re-compression happens here. The mime type
//! is derived from the file extension, which the scanner has already
//! constrained to JPEG or PNG.
//!
//! A file that cannot be read aborts only that file: the caller turns
//! the [`FileError::Unreadable`] into a sentinel row and moves on.

use crate::error::FileError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A photo ready for embedding in the request body.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Base64-encoded file bytes.
    pub data: String,
    /// Mime type derived from the file extension.
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// Render the `data:` URI the API expects in an `image_url` part.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Map a qualifying image extension to its mime type.
fn mime_for_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}

/// Read a photo from disk and base64-encode its bytes.
pub fn encode_image(path: &Path) -> Result<EncodedImage, FileError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let bytes = std::fs::read(path).map_err(|e| FileError::Unreadable {
        file: file_name,
        detail: e.to_string(),
    })?;

    let b64 = STANDARD.encode(&bytes);
    debug!("Encoded {} → {} bytes base64", path.display(), b64.len());

    Ok(EncodedImage {
        data: b64,
        mime_type: mime_for_extension(path),
    })
}
