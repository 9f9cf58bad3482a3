//! PDF rasterisation: render every page to a PNG file via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking thread pool
//! so Tokio worker threads don't stall during CPU-heavy rendering.
//!
//! ## Output contract
//!
//! One PNG per page, rendered at 2x the page's native dimensions (trading
//! file size for inference legibility), named with a zero-padded ordinal
//! whose width matches the total page count so lexical sort order equals
//! page order. Any failure is whole-document: files already written for this
//! document are removed before the error is returned, so later stages can
//! never mistake a half-populated directory for a complete rasterisation.

use crate::error::NotemarkError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Upscaling factor applied to each page's native dimensions.
const RENDER_SCALE: f32 = 2.0;

/// Rasterise every page of a PDF into `output_dir`.
///
/// # Returns
/// Paths of the written page images, in ascending page order.
///
/// # Errors
/// - [`NotemarkError::PdfiumBindingFailed`] if no pdfium library is available
/// - [`NotemarkError::DocumentFormat`] if the document cannot be opened/parsed
/// - [`NotemarkError::RasterizeFailed`] if any page fails to render or write
pub async fn rasterize(
    document_path: &Path,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, NotemarkError> {
    let doc = document_path.to_path_buf();
    let out = output_dir.to_path_buf();

    tokio::task::spawn_blocking(move || rasterize_blocking(&doc, &out))
        .await
        .map_err(|e| NotemarkError::Internal(format!("Rasterize task panicked: {}", e)))?
}

/// File name for a page: zero-padded ordinal matching the digit width of the
/// total page count, so lexical sort order equals page order.
pub fn page_file_name(ordinal: usize, total_pages: usize) -> String {
    let width = total_pages.to_string().len();
    format!("page_{:0width$}.png", ordinal)
}

fn bind_pdfium() -> Result<Pdfium, NotemarkError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                .or_else(|_| Pdfium::bind_to_system_library())
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| NotemarkError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn rasterize_blocking(
    document_path: &Path,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, NotemarkError> {
    let pdfium = bind_pdfium()?;

    let document =
        pdfium
            .load_pdf_from_file(document_path, None)
            .map_err(|e| NotemarkError::DocumentFormat {
                path: document_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!(
        "Rasterising {} ({} pages)",
        document_path.display(),
        total_pages
    );

    std::fs::create_dir_all(output_dir).map_err(|e| NotemarkError::OutputWrite {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(RENDER_SCALE);

    let mut written: Vec<PathBuf> = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let result = render_one(&page, &render_config, output_dir, idx + 1, total_pages);
        match result {
            Ok(path) => written.push(path),
            Err(e) => {
                // Whole-document failure: remove the pages already written.
                for path in &written {
                    let _ = std::fs::remove_file(path);
                }
                return Err(e);
            }
        }
    }

    Ok(written)
}

fn render_one(
    page: &PdfPage<'_>,
    render_config: &PdfRenderConfig,
    output_dir: &Path,
    ordinal: usize,
    total_pages: usize,
) -> Result<PathBuf, NotemarkError> {
    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| NotemarkError::RasterizeFailed {
            page: ordinal,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    let path = output_dir.join(page_file_name(ordinal, total_pages));
    image.save(&path).map_err(|e| NotemarkError::RasterizeFailed {
        page: ordinal,
        detail: format!("failed to write '{}': {}", path.display(), e),
    })?;

    debug!(
        "Rendered page {}/{} -> {} ({}x{} px)",
        ordinal,
        total_pages,
        path.display(),
        image.width(),
        image.height()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_width_follows_total_page_count() {
        assert_eq!(page_file_name(1, 1), "page_1.png");
        assert_eq!(page_file_name(9, 9), "page_9.png");
        assert_eq!(page_file_name(1, 10), "page_01.png");
        assert_eq!(page_file_name(10, 10), "page_10.png");
        assert_eq!(page_file_name(7, 99), "page_07.png");
        assert_eq!(page_file_name(1, 100), "page_001.png");
        assert_eq!(page_file_name(100, 100), "page_100.png");
    }

    #[test]
    fn lexical_sort_order_equals_page_order() {
        for total in [1usize, 9, 10, 99, 100] {
            let names: Vec<String> = (1..=total).map(|i| page_file_name(i, total)).collect();
            let mut sorted = names.clone();
            sorted.sort();
            assert_eq!(sorted, names, "ordering broken for total={total}");
        }
    }

    /// Needs a bindable pdfium library; skipped otherwise (CI may lack it).
    #[tokio::test]
    async fn corrupted_document_fails_whole_with_no_partial_output() {
        if bind_pdfium().is_err() {
            println!("SKIP — no pdfium library available");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("broken.pdf");
        std::fs::write(&doc, b"this is not a pdf").unwrap();

        let out = dir.path().join("pages");
        let err = rasterize(&doc, &out).await.unwrap_err();
        assert!(matches!(err, NotemarkError::DocumentFormat { .. }));
        // The output directory must not have been created for a failed open.
        assert!(!out.exists());
    }
}
