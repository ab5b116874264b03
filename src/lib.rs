//! # pdf2notes
//!
//! Turn a PDF into per-page study notes with a chat-completions model.
//!
//! Each page's text is pulled from the PDF text layer (or OCR'd when the page
//! is a scan), sent to the model with a structured analysis prompt, and the
//! reply is appended to a Markdown notes file next to the page's original
//! text. Token usage and cost are tracked across the run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / page-marked text
//!  │
//!  ├─ 1. Input    classify local file (PDF magic or UTF-8 text)
//!  ├─ 2. Extract  pdfium text layer → TextCleaner; OCR + LineReconstructor
//!  │              for pages without text (spawn_blocking)
//!  ├─ 3. Segment  page list → context-window chunks (logged, never split)
//!  ├─ 4. Prompt   one chat-completions call per page, sequential
//!  └─ 5. Output   "# Page n / ## 原文 / ## 内容解读" appended per page
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2notes::{generate_notes, NotesConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NotesConfig::from_json_file("config.json")?;
//!     let run = generate_notes("paper.pdf", None, &config).await?;
//!     println!("notes written to {}", run.output_path.display());
//!     println!("{}", run.summary.usage);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2notes` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! ```toml
//! pdf2notes = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod usage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ErrorStrategy, LogLevel, NotesConfig, NotesConfigBuilder};
pub use error::{NotesError, OcrError, PageError};
pub use generate::{
    decide, generate_notes, load_pages, Decision, NoteGenerator, NotesRun, PageOutcome, PageReport,
    PageState, RunSummary,
};
pub use output::{write_stats_json, NoteBody, NoteEntry, NoteWriter};
pub use pipeline::extract::{extract_pages, extract_pdf, Extraction};
pub use pipeline::lines::{LineReconstructor, TextFragment};
pub use pipeline::llm::{Completion, HttpModelClient, ModelClient};
pub use pipeline::ocr::{OcrEngine, TesseractOcr};
pub use pipeline::segment::{parse_pages, render_page_text, Chunk, Page, PageSegmenter, TokenCounter};
pub use progress::{NoopProgressCallback, NotesProgressCallback, ProgressCallback};
pub use usage::{TokenUsage, UsageStats, UsageTracker};
