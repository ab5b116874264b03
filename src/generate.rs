//! Note generation: one model call per page, one appended section per page.
//!
//! ## Page lifecycle
//!
//! ```text
//! Pending ──▶ Prompted ──▶ Succeeded
//!                     └──▶ Failed
//! ```
//!
//! Pages are processed strictly in order. A page's section is on disk before
//! the next page is prompted. What happens after a failed call is decided by
//! [`decide`] from the outcome and the configured [`ErrorStrategy`]:
//! `skip` writes a failure notice in place of the interpretation and moves
//! on, `abort` stops the run with [`NotesError::Aborted`] and writes nothing
//! for the failing page.

use crate::config::{ErrorStrategy, NotesConfig};
use crate::error::{NotesError, PageError};
use crate::output::{NoteBody, NoteEntry, NoteWriter};
use crate::pipeline::extract;
use crate::pipeline::input::{self, InputKind};
use crate::pipeline::llm::{HttpModelClient, ModelClient};
use crate::pipeline::postprocess::clean_reply;
use crate::pipeline::segment::{parse_pages, Page, PageSegmenter};
use crate::prompts::build_prompt;
use crate::usage::{TokenUsage, UsageStats, UsageTracker};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Terminal result of prompting one page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Succeeded {
        interpretation: String,
        usage: TokenUsage,
    },
    Failed(PageError),
}

impl PageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PageOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageState {
    Pending,
    Prompted,
    Succeeded,
    Failed,
}

/// What the loop does with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Write the interpretation and continue.
    Continue,
    /// Write the failure notice and continue.
    RecordFailure,
    /// Stop without writing this page.
    Abort,
}

/// Pure policy: outcome × strategy → decision.
pub fn decide(outcome: &PageOutcome, strategy: ErrorStrategy) -> Decision {
    match (outcome, strategy) {
        (PageOutcome::Succeeded { .. }, _) => Decision::Continue,
        (PageOutcome::Failed(_), ErrorStrategy::Skip) => Decision::RecordFailure,
        (PageOutcome::Failed(_), ErrorStrategy::Abort) => Decision::Abort,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    pub page_index: usize,
    pub state: PageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

/// Returned by a run that was not aborted.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pages_total: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    pub usage: UsageStats,
    pub elapsed_ms: u64,
    pub page_reports: Vec<PageReport>,
}

/// Drives the per-page prompt → call → append loop.
pub struct NoteGenerator {
    client: Arc<dyn ModelClient>,
    segmenter: PageSegmenter,
    config: NotesConfig,
}

impl NoteGenerator {
    /// Use a caller-supplied model client.
    pub fn new(client: Arc<dyn ModelClient>, config: NotesConfig) -> Self {
        Self {
            segmenter: PageSegmenter::from_config(&config),
            client,
            config,
        }
    }

    /// Talk to the configured chat-completions endpoint.
    pub fn from_config(config: NotesConfig) -> Result<Self, NotesError> {
        let client = Arc::new(HttpModelClient::from_config(&config)?);
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &NotesConfig {
        &self.config
    }

    /// Prompt the model for one page. Never fails; errors are an outcome.
    pub async fn generate_page(&self, page: &Page) -> PageOutcome {
        let prompt = build_prompt(&page.raw_text, &self.config.topic);
        debug!(
            "Page {}: prompt ≈ {} tokens",
            page.index,
            self.segmenter.count_tokens(&prompt)
        );

        match self.client.complete(page.index, &prompt).await {
            Ok(completion) => PageOutcome::Succeeded {
                interpretation: clean_reply(&completion.content),
                usage: completion.usage,
            },
            Err(e) => PageOutcome::Failed(e),
        }
    }

    /// Process every page in order, appending to `output_path`.
    ///
    /// The file is truncated first. Usage of successful calls is recorded in
    /// `tracker`, which the caller keeps after the run (also on abort).
    pub async fn run(
        &self,
        pages: &[Page],
        output_path: &Path,
        tracker: &mut UsageTracker,
    ) -> Result<RunSummary, NotesError> {
        let start = Instant::now();
        let total = pages.len();
        let callback = self.config.progress_callback.as_ref();

        self.log_chunk_plan(pages);
        let writer = NoteWriter::create(output_path).await?;
        info!("Writing notes for {} pages to {}", total, output_path.display());

        if let Some(cb) = callback {
            cb.on_run_start(total);
        }

        let mut reports: Vec<PageReport> = pages
            .iter()
            .map(|p| PageReport {
                page_index: p.index,
                state: PageState::Pending,
                error: None,
            })
            .collect();

        for (slot, page) in pages.iter().enumerate() {
            if let Some(cb) = callback {
                cb.on_page_start(page.index, total);
            }
            reports[slot].state = PageState::Prompted;

            let outcome = self.generate_page(page).await;
            if let PageOutcome::Succeeded { usage, .. } = &outcome {
                let cost = tracker.record(usage, self.config.price_per_1m_tokens);
                debug!(
                    "Page {}: {} total tokens, cost {:.4}",
                    page.index, usage.total_tokens, cost
                );
            }

            let body = match &outcome {
                PageOutcome::Succeeded { interpretation, .. } => {
                    reports[slot].state = PageState::Succeeded;
                    NoteBody::Interpretation(interpretation.clone())
                }
                PageOutcome::Failed(e) => {
                    reports[slot].state = PageState::Failed;
                    if decide(&outcome, self.config.error_strategy) == Decision::Abort {
                        error!("Page {} failed: {}", page.index, e);
                        if let Some(cb) = callback {
                            cb.on_page_complete(page.index, total, &outcome, &tracker.snapshot());
                        }
                        return Err(NotesError::Aborted {
                            page: page.index,
                            source: e.clone(),
                        });
                    }
                    warn!("Page {} failed, recording and continuing: {}", page.index, e);
                    reports[slot].error = Some(e.clone());
                    NoteBody::Failure(e.clone())
                }
            };

            writer
                .append(&NoteEntry {
                    page_index: page.index,
                    original_text: page.raw_text.clone(),
                    body,
                })
                .await?;

            if let Some(cb) = callback {
                cb.on_page_complete(page.index, total, &outcome, &tracker.snapshot());
            }
        }

        let succeeded = reports
            .iter()
            .filter(|r| r.state == PageState::Succeeded)
            .count();
        let summary = RunSummary {
            pages_total: total,
            pages_succeeded: succeeded,
            pages_failed: total - succeeded,
            usage: tracker.snapshot(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            page_reports: reports,
        };

        info!(
            "Notes complete: {}/{} pages succeeded in {}ms",
            summary.pages_succeeded, summary.pages_total, summary.elapsed_ms
        );
        if let Some(cb) = callback {
            cb.on_run_complete(&summary);
        }

        Ok(summary)
    }

    fn log_chunk_plan(&self, pages: &[Page]) {
        let chunks = self.segmenter.chunk_pages(pages);
        info!(
            "{} pages fit into {} context-window chunks (limit {} tokens)",
            pages.len(),
            chunks.len(),
            self.segmenter.limit()
        );
        for chunk in chunks.iter().filter(|c| c.oversized) {
            warn!(
                "Page {:?} alone is {} tokens, over the {} token limit",
                chunk.pages,
                chunk.tokens,
                self.segmenter.limit()
            );
        }
    }
}

// ── Top-level entry points ───────────────────────────────────────────────────

/// Read pages from a PDF or a page-marked text file.
pub async fn load_pages(input_path: &Path, config: &NotesConfig) -> Result<Vec<Page>, NotesError> {
    let resolved = input::resolve_input(input_path)?;

    let pages = match resolved.kind {
        InputKind::Pdf => extract::extract_pdf(&resolved.path, config).await?.pages,
        InputKind::Text(text) => parse_pages(&text),
    };

    if pages.is_empty() {
        return Err(NotesError::NoTextExtracted {
            path: resolved.path,
        });
    }
    info!("Found {} pages in {}", pages.len(), input_path.display());
    Ok(pages)
}

/// A finished run and where its notes went.
#[derive(Debug, Clone)]
pub struct NotesRun {
    pub output_path: PathBuf,
    pub summary: RunSummary,
}

/// Load `input_path`, generate notes and write them.
///
/// `output_path` defaults to `<input stem>_notes.md` next to the input.
pub async fn generate_notes(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &NotesConfig,
) -> Result<NotesRun, NotesError> {
    let input_path = input_path.as_ref();
    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input::default_output_path(input_path));

    let pages = load_pages(input_path, config).await?;
    let generator = NoteGenerator::from_config(config.clone())?;
    let mut tracker = UsageTracker::new();
    let summary = generator.run(&pages, &output_path, &mut tracker).await?;

    Ok(NotesRun {
        output_path,
        summary,
    })
}
