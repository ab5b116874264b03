//! PDF text extraction via pdfium, with OCR for pages lacking a text layer.
//!
//! pdfium's C library keeps thread-local state and blocks, so all document
//! work happens on one `spawn_blocking` thread: bind, load, walk pages,
//! rasterise where OCR is needed.
//!
//! A page goes to OCR when its cleaned text layer has fewer than
//! `min_text_chars` visible characters, or always when `force_ocr` is set.
//! If OCR fails on a page that was only a fallback candidate, the (possibly
//! empty) text layer is kept and a warning logged; with `force_ocr` the
//! failure is fatal.

use crate::config::NotesConfig;
use crate::error::{NotesError, OcrError};
use crate::pipeline::clean::{clean_text, visible_chars};
use crate::pipeline::lines::LineReconstructor;
use crate::pipeline::ocr::{OcrEngine, TesseractOcr};
use crate::pipeline::segment::Page;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Result of extracting one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Pages with visible text, in document order.
    pub pages: Vec<Page>,
    /// Pages in the PDF, including blank ones.
    pub page_count: usize,
    /// Page numbers whose text came from OCR.
    pub ocr_pages: Vec<usize>,
}

#[derive(Debug, Clone)]
struct ExtractSettings {
    pdfium_lib_path: Option<PathBuf>,
    ocr_dpi: u32,
    min_text_chars: usize,
    force_ocr: bool,
    y_threshold: f32,
}

impl From<&NotesConfig> for ExtractSettings {
    fn from(config: &NotesConfig) -> Self {
        Self {
            pdfium_lib_path: config.pdfium_lib_path.clone(),
            ocr_dpi: config.ocr_dpi,
            min_text_chars: config.min_text_chars,
            force_ocr: config.force_ocr,
            y_threshold: config.y_threshold,
        }
    }
}

/// Extract pages using tesseract for OCR.
///
/// tesseract is probed once up front. Missing it is fatal with `force_ocr`;
/// otherwise the fallback is disabled and pages keep their text layer.
pub async fn extract_pdf(pdf_path: &Path, config: &NotesConfig) -> Result<Extraction, NotesError> {
    let ocr = TesseractOcr::new(config.ocr_language.clone());
    let settings = with_ocr_availability(
        ExtractSettings::from(config),
        ocr.name(),
        ocr.is_available(),
    )?;
    run_extraction(pdf_path, settings, Arc::new(ocr)).await
}

/// Extract pages with a caller-supplied OCR engine.
pub async fn extract_pages(
    pdf_path: &Path,
    config: &NotesConfig,
    ocr: Arc<dyn OcrEngine>,
) -> Result<Extraction, NotesError> {
    run_extraction(pdf_path, ExtractSettings::from(config), ocr).await
}

fn with_ocr_availability(
    mut settings: ExtractSettings,
    program: &str,
    available: bool,
) -> Result<ExtractSettings, NotesError> {
    if available {
        return Ok(settings);
    }
    if settings.force_ocr {
        return Err(NotesError::OcrUnavailable {
            program: program.to_string(),
        });
    }
    warn!("{} not found; OCR fallback disabled, using text layer only", program);
    settings.min_text_chars = 0;
    Ok(settings)
}

async fn run_extraction(
    pdf_path: &Path,
    settings: ExtractSettings,
    ocr: Arc<dyn OcrEngine>,
) -> Result<Extraction, NotesError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || extract_blocking(&path, &settings, ocr.as_ref()))
        .await
        .map_err(|e| NotesError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Bind pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the system library.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, NotesError> {
    let from_env = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);

    if let Some(path) = explicit.map(Path::to_path_buf).or(from_env) {
        debug!("Binding pdfium from {}", path.display());
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| NotesError::PdfiumBindingFailed(format!("{}: {}", path.display(), e)));
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| NotesError::PdfiumBindingFailed(e.to_string()))
}

fn extract_blocking(
    pdf_path: &Path,
    settings: &ExtractSettings,
    ocr: &dyn OcrEngine,
) -> Result<Extraction, NotesError> {
    let pdfium = bind_pdfium(settings.pdfium_lib_path.as_deref())?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| NotesError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF loaded: {} pages", page_count);

    let render_config =
        PdfRenderConfig::new().scale_page_by_factor(settings.ocr_dpi as f32 / 72.0);
    let reconstructor = LineReconstructor::new(settings.y_threshold);
    let scratch = TempDir::new().map_err(|e| NotesError::Internal(e.to_string()))?;

    let mut extracted = Vec::with_capacity(page_count);
    let mut ocr_pages = Vec::new();

    for (i, page) in pages.iter().enumerate() {
        let index = i + 1;

        let layer = match page.text() {
            Ok(text) => clean_text(&text.all()),
            Err(e) => {
                warn!("Page {}: text layer unreadable ({:?})", index, e);
                String::new()
            }
        };

        let needs_ocr = settings.force_ocr || visible_chars(&layer) < settings.min_text_chars;
        let text = if needs_ocr {
            debug!("Page {}: {} visible chars, running {}", index, visible_chars(&layer), ocr.name());
            match ocr_page(&page, index, &render_config, scratch.path(), ocr, &reconstructor) {
                Ok(text) => {
                    ocr_pages.push(index);
                    text
                }
                Err(source) if settings.force_ocr => {
                    return Err(NotesError::Ocr { page: index, source });
                }
                Err(e) => {
                    warn!("Page {}: OCR fallback failed ({}); keeping text layer", index, e);
                    layer
                }
            }
        } else {
            layer
        };

        if visible_chars(&text) == 0 {
            debug!("Page {} has no text, skipping", index);
            continue;
        }
        extracted.push(Page::new(index, text));
    }

    if extracted.is_empty() {
        return Err(NotesError::NoTextExtracted {
            path: pdf_path.to_path_buf(),
        });
    }

    info!(
        "Extracted {} of {} pages ({} via OCR)",
        extracted.len(),
        page_count,
        ocr_pages.len()
    );

    Ok(Extraction {
        pages: extracted,
        page_count,
        ocr_pages,
    })
}

/// Rasterise one page to a PNG in `scratch` and OCR it.
fn ocr_page(
    page: &PdfPage,
    index: usize,
    render_config: &PdfRenderConfig,
    scratch: &Path,
    ocr: &dyn OcrEngine,
    reconstructor: &LineReconstructor,
) -> Result<String, OcrError> {
    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| OcrError::Render(format!("{:?}", e)))?;
    let image = bitmap.as_image();

    let image_path = scratch.join(format!("page-{:04}.png", index));
    image
        .save_with_format(&image_path, image::ImageFormat::Png)
        .map_err(|e| OcrError::Render(e.to_string()))?;
    debug!(
        "Rendered page {} → {}x{} px",
        index,
        image.width(),
        image.height()
    );

    let fragments = ocr.recognise(&image_path)?;
    Ok(reconstructor.reconstruct(&fragments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let config = NotesConfig::builder()
            .api_key("k")
            .ocr_dpi(150)
            .min_text_chars(20)
            .force_ocr(true)
            .y_threshold(6.0)
            .build()
            .unwrap();
        let s = ExtractSettings::from(&config);
        assert_eq!(s.ocr_dpi, 150);
        assert_eq!(s.min_text_chars, 20);
        assert!(s.force_ocr);
        assert_eq!(s.y_threshold, 6.0);
        assert!(s.pdfium_lib_path.is_none());
    }

    #[test]
    fn missing_engine_disables_fallback() {
        let config = NotesConfig::builder()
            .api_key("k")
            .min_text_chars(20)
            .build()
            .unwrap();
        let s = with_ocr_availability(ExtractSettings::from(&config), "tesseract", false).unwrap();
        assert_eq!(s.min_text_chars, 0);
        assert!(!s.force_ocr);

        let s = with_ocr_availability(ExtractSettings::from(&config), "tesseract", true).unwrap();
        assert_eq!(s.min_text_chars, 20);
    }

    #[test]
    fn missing_engine_is_fatal_when_forced() {
        let config = NotesConfig::builder()
            .api_key("k")
            .force_ocr(true)
            .build()
            .unwrap();
        let err =
            with_ocr_availability(ExtractSettings::from(&config), "tesseract", false).unwrap_err();
        assert!(matches!(err, NotesError::OcrUnavailable { .. }), "{err:?}");
        assert!(err.to_string().contains("tesseract"));
    }

    #[test]
    fn bind_from_missing_library_fails_cleanly() {
        let err = bind_pdfium(Some(Path::new("/nonexistent/libpdfium.so"))).unwrap_err();
        assert!(matches!(err, NotesError::PdfiumBindingFailed(_)), "{err:?}");
        assert!(err.to_string().contains("/nonexistent/libpdfium.so"));
    }
}
