//! Pipeline stages from input file to model reply.
//!
//! Each submodule implements one transformation step and is tested on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ segment ──▶ llm ──▶ postprocess
//!            │  ▲
//!            ▼  │
//!          clean / ocr ──▶ lines
//! ```
//!
//! 1. [`input`]   — classify the path as PDF or page-marked text
//! 2. [`extract`] — per-page text via pdfium; runs in `spawn_blocking`
//! 3. [`clean`]   — rejoin wrapped text-layer lines into paragraphs
//! 4. [`ocr`]     — rasterised page → positioned words (tesseract)
//! 5. [`lines`]   — positioned words → reading-order lines
//! 6. [`segment`] — page-marked text ⇄ pages; token-bounded chunks
//! 7. [`llm`]     — the only stage with network I/O
//! 8. [`postprocess`] — strip wrapper artefacts from the reply

pub mod clean;
pub mod extract;
pub mod input;
pub mod lines;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod segment;
