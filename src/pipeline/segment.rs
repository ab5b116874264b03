//! Page segmentation and context-window chunking.
//!
//! Extracted text travels between stages in one page-marked format:
//!
//! ```text
//! ### Page 1
//!
//! first page text
//!
//! ### Page 2
//!
//! second page text
//! ```
//!
//! [`parse_pages`] and [`render_page_text`] convert between that blob and
//! [`Page`] values. [`PageSegmenter`] then packs consecutive pages into
//! [`Chunk`]s that stay below `context_window − reserved_margin` tokens.
//! Chunks never split a page: a page that is too large on its own becomes a
//! single oversized chunk.

use crate::config::NotesConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokenizers::tokenizer::Tokenizer;
use tracing::{debug, info, warn};

/// One page of extracted text. `index` is the 1-based page number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,
    pub raw_text: String,
}

impl Page {
    pub fn new(index: usize, raw_text: impl Into<String>) -> Self {
        Self {
            index,
            raw_text: raw_text.into(),
        }
    }
}

// ── Page-marked text ─────────────────────────────────────────────────────────

static RE_PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^### Page ([1-9][0-9]*)[ \t]*\r?$").unwrap());

/// Split page-marked text into pages, in document order.
///
/// Text before the first marker is ignored and pages whose body is blank are
/// dropped. Input without any marker is treated as a single page 1.
pub fn parse_pages(text: &str) -> Vec<Page> {
    let markers: Vec<(usize, usize, usize)> = RE_PAGE_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let index = caps[1].parse::<usize>().ok()?;
            Some((index, whole.start(), whole.end()))
        })
        .collect();

    if markers.is_empty() {
        let body = text.trim();
        return if body.is_empty() {
            Vec::new()
        } else {
            vec![Page::new(1, body)]
        };
    }

    let mut pages = Vec::with_capacity(markers.len());
    for (i, &(index, _, body_start)) in markers.iter().enumerate() {
        let body_end = markers.get(i + 1).map_or(text.len(), |m| m.1);
        let body = text[body_start..body_end].trim();
        if body.is_empty() {
            debug!("Page {} is blank, skipping", index);
            continue;
        }
        pages.push(Page::new(index, body));
    }
    pages
}

/// Render pages in the page-marked format read by [`parse_pages`].
pub fn render_page_text(pages: &[Page]) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(&format!("### Page {}\n\n{}\n\n", page.index, page.raw_text));
    }
    out.trim_end().to_string()
}

// ── Token counting ───────────────────────────────────────────────────────────

/// Anything that can measure text in model tokens.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Short label for logs.
    fn name(&self) -> &str;
}

/// `bytes / 4` — the usual rule of thumb when no tokenizer is at hand.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteEstimate;

impl TokenCounter for ByteEstimate {
    fn count(&self, text: &str) -> usize {
        text.len() / 4
    }

    fn name(&self) -> &str {
        "bytes/4 estimate"
    }
}

/// A HuggingFace tokenizer loaded from a `tokenizer.json`.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        Tokenizer::from_file(path)
            .map(|tokenizer| Self { tokenizer })
            .map_err(|e| e.to_string())
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.get_ids().len(),
            Err(e) => {
                warn!("Tokenizer failed on {} bytes ({}), estimating", text.len(), e);
                ByteEstimate.count(text)
            }
        }
    }

    fn name(&self) -> &str {
        "tokenizer.json"
    }
}

/// Load the configured tokenizer, degrading to [`ByteEstimate`].
///
/// Never fails: a missing or unreadable tokenizer is logged and the estimate
/// is used instead.
pub fn load_token_counter(path: Option<&Path>) -> Box<dyn TokenCounter> {
    let Some(path) = path else {
        info!("No tokenizer configured; token counts use the bytes/4 estimate");
        return Box::new(ByteEstimate);
    };

    match HfTokenCounter::from_file(path) {
        Ok(counter) => {
            debug!("Loaded tokenizer from {}", path.display());
            Box::new(counter)
        }
        Err(e) => {
            warn!(
                "Tokenizer unavailable at {} ({}); falling back to the bytes/4 estimate",
                path.display(),
                e
            );
            Box::new(ByteEstimate)
        }
    }
}

// ── Chunking ─────────────────────────────────────────────────────────────────

/// A run of consecutive pages sized for one context window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Page numbers in this chunk, ascending.
    pub pages: Vec<usize>,
    /// Page texts joined with `"\n\n"`.
    pub text: String,
    pub tokens: usize,
    /// A single page whose own size reaches the limit.
    pub oversized: bool,
}

/// Packs pages into token-bounded chunks.
pub struct PageSegmenter {
    counter: Box<dyn TokenCounter>,
    limit: usize,
}

impl PageSegmenter {
    /// `limit` is the exclusive upper bound on chunk tokens.
    pub fn new(counter: Box<dyn TokenCounter>, limit: usize) -> Self {
        Self { counter, limit }
    }

    /// Segmenter using the configured tokenizer and `context_window − reserved_margin`.
    pub fn from_config(config: &NotesConfig) -> Self {
        Self::new(
            load_token_counter(config.tokenizer_path.as_deref()),
            config.chunk_token_limit(),
        )
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Parse page-marked text and chunk it.
    pub fn chunk_text(&self, text: &str) -> Vec<Chunk> {
        self.chunk_pages(&parse_pages(text))
    }

    /// Greedily pack pages in order.
    ///
    /// A page joins the open chunk when the combined text stays strictly
    /// below the limit; otherwise the open chunk is closed and the page
    /// starts a new one.
    pub fn chunk_pages(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut acc_pages: Vec<usize> = Vec::new();
        let mut acc_text = String::new();

        for page in pages {
            let candidate = if acc_text.is_empty() {
                page.raw_text.clone()
            } else {
                format!("{}\n\n{}", acc_text, page.raw_text)
            };

            if self.counter.count(&candidate) < self.limit {
                acc_text = candidate;
                acc_pages.push(page.index);
                continue;
            }

            if !acc_pages.is_empty() {
                chunks.push(self.close(std::mem::take(&mut acc_pages), std::mem::take(&mut acc_text)));
            }
            acc_pages.push(page.index);
            acc_text = page.raw_text.clone();
        }

        if !acc_pages.is_empty() {
            chunks.push(self.close(acc_pages, acc_text));
        }

        debug!(
            "Segmented {} pages into {} chunks ({} via {})",
            pages.len(),
            chunks.len(),
            self.limit,
            self.counter.name()
        );
        chunks
    }

    fn close(&self, pages: Vec<usize>, text: String) -> Chunk {
        let tokens = self.counter.count(&text);
        Chunk {
            oversized: tokens >= self.limit,
            pages,
            text,
            tokens,
        }
    }
}
