//! Image encoding: page image file → base64 `data:` URL.
//!
//! The chat-completions endpoint accepts images as base64 data-URIs embedded
//! inline in the JSON request body. Page images are read from disk and
//! encoded as-is; rasterised pages are PNG (lossless text crispness) and
//! directly uploaded photos may be JPEG.

use crate::error::InferenceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A page image ready for the inference request, keyed by its filename.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    /// Originating filename (basename), the association key for results.
    pub filename: String,
    /// `data:<mime>;base64,<payload>` URL for the image content block.
    pub data_url: String,
}

/// Mime type inferred from the file extension.
///
/// Only PNG and JPEG are accepted as page inputs; anything else defaults to
/// PNG, matching the rasteriser's output format.
pub(crate) fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}

/// Read a page image from disk and wrap it as an [`EncodedPage`].
///
/// A read failure is a per-page condition: it surfaces as a contained
/// [`InferenceError`] so the page gets a failure record while its siblings
/// proceed.
pub fn encode_page(path: &Path) -> Result<EncodedPage, InferenceError> {
    let bytes = std::fs::read(path).map_err(|e| InferenceError::Transport {
        detail: format!("failed to read page image '{}': {}", path.display(), e),
    })?;
    let b64 = STANDARD.encode(&bytes);
    debug!("Encoded {} -> {} bytes base64", path.display(), b64.len());

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(EncodedPage {
        filename,
        data_url: format!("data:{};base64,{}", mime_for(path), b64),
    })
}
