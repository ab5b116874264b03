//! Error types for the pdf2notes library.
//!
//! Two error types mirror the two ways a run can go wrong:
//!
//! * [`NotesError`] — **Fatal**: the run cannot start or must stop (unreadable
//!   PDF, bad configuration, output file not writable, or a page failure under
//!   the `abort` strategy). Returned as `Err(NotesError)` from the top-level
//!   entry points and mapped to a non-zero exit by the CLI.
//!
//! * [`PageError`] — **Page-level**: one model call failed (timeout, non-2xx
//!   status, malformed body). Under the `skip` strategy it is written into the
//!   page's note as a failure notice and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2notes library.
#[derive(Debug, Error)]
pub enum NotesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is neither a PDF nor UTF-8 page-marked text.
    #[error("'{path}' is neither a PDF nor an extracted text file\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH (or `pdfium_lib_path` in the config) to an existing libpdfium."
    )]
    PdfiumBindingFailed(String),

    /// Every page came back empty, from both the text layer and OCR.
    #[error("No text could be extracted from '{path}'")]
    NoTextExtracted { path: PathBuf },

    /// OCR was forced but the engine binary cannot be started.
    #[error("OCR engine '{program}' is not available; install it or drop --ocr")]
    OcrUnavailable { program: String },

    /// The OCR engine failed on a page that needed it.
    #[error("OCR failed on page {page}: {source}")]
    Ocr {
        page: usize,
        #[source]
        source: OcrError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The config file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`crate::NotesConfig`].
    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Run errors ────────────────────────────────────────────────────────
    /// Could not create or append to the notes file (or the stats file).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A page failed while `error_strategy = abort`.
    ///
    /// Every page written before `page` stays on disk.
    #[error("Stopped at page {page} (error strategy 'abort'): {source}")]
    Aborted {
        page: usize,
        #[source]
        source: PageError,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A model-call failure for a single page.
///
/// The `Display` text is what ends up after `生成失败: ` in the notes file.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The request exceeded the configured timeout.
    #[error("API request timed out after {secs}s (page {page})")]
    Timeout { page: usize, secs: u64 },

    /// The endpoint answered with a non-success status.
    #[error("API call failed (status {status}): {body}")]
    ApiError {
        page: usize,
        status: u16,
        body: String,
    },

    /// A 2xx response whose body is not a chat completion.
    #[error("Malformed API response: {detail}")]
    MalformedResponse { page: usize, detail: String },

    /// Connection-level failure (DNS, TLS, reset).
    #[error("API request failed: {detail}")]
    Request { page: usize, detail: String },
}

impl PageError {
    /// The 1-indexed page this failure belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::Timeout { page, .. }
            | PageError::ApiError { page, .. }
            | PageError::MalformedResponse { page, .. }
            | PageError::Request { page, .. } => *page,
        }
    }
}

/// Errors from the OCR engine seam.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine binary could not be started.
    #[error("could not run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// A TSV row is missing a column or carries a non-numeric coordinate.
    #[error("malformed OCR row {line}: {detail}")]
    MalformedRow { line: usize, detail: String },

    /// The page could not be rasterised for OCR.
    #[error("could not rasterise page: {0}")]
    Render(String),
}
