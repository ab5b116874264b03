//! CLI binary for pdf2notes.
//!
//! A thin shim over the library crate that maps CLI flags onto
//! `NotesConfig`, draws a progress bar and prints the usage report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2notes::pipeline::input::{default_output_path, default_text_path};
use pdf2notes::{
    load_pages, render_page_text, write_stats_json, ErrorStrategy, LogLevel, NoteGenerator,
    NotesConfig, NotesProgressCallback, PageOutcome, ProgressCallback, RunSummary, UsageStats,
    UsageTracker,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar with a per-page log line and the running usage as its
/// message.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:32.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating notes");
        self.bar.set_message(UsageStats::default().brief());
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn abandon(&self) {
        self.bar.abandon();
    }
}

impl NotesProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_pages} pages"))
        ));
    }

    fn on_page_start(&self, _page: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
    }

    fn on_page_complete(&self, page: usize, total: usize, outcome: &PageOutcome, usage: &UsageStats) {
        let elapsed = dim(&format!("{:.1}s", self.page_elapsed()));
        match outcome {
            PageOutcome::Succeeded { interpretation, .. } => self.bar.println(format!(
                "  {} Page {:>3}/{:<3}  {}  {}",
                green("✓"),
                page,
                total,
                dim(&format!("{:>5} chars", interpretation.chars().count())),
                elapsed,
            )),
            PageOutcome::Failed(e) => {
                let msg = e.to_string();
                let msg = if msg.chars().count() > 80 {
                    format!("{}…", msg.chars().take(79).collect::<String>())
                } else {
                    msg
                };
                self.bar.println(format!(
                    "  {} Page {:>3}/{:<3}  {}  {}",
                    red("✗"),
                    page,
                    total,
                    red(&msg),
                    elapsed,
                ));
            }
        }
        self.bar.set_message(usage.brief());
        self.bar.inc(1);
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        self.bar.finish_and_clear();
        if summary.pages_failed == 0 {
            eprintln!(
                "{} {} pages done",
                green("✔"),
                bold(&summary.pages_succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages done  ({} failed)",
                cyan("⚠"),
                bold(&summary.pages_succeeded.to_string()),
                summary.pages_total,
                red(&summary.pages_failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Notes for a PDF, written to paper_notes.md
  pdf2notes paper.pdf

  # Notes from an already-extracted text file
  pdf2notes paper.txt --topic 深度学习

  # Only extract page-marked text (no API key needed)
  pdf2notes --extract-only scan.pdf --ocr -o scan.txt

  # Stop at the first failed page and keep the usage numbers
  pdf2notes paper.pdf --error-strategy abort --save-stats stats.json

CONFIG FILE (config.json):
  {
    "api_key": "sk-...",
    "api_base": "https://api.openai.com/v1",
    "model": "gpt-4o-mini",
    "temperature": 0.7,
    "max_tokens": 4096,
    "context_window": 8192,
    "price_per_1m_tokens": 1.0,
    "log_level": "info"
  }

ENVIRONMENT VARIABLES:
  PDF2NOTES_API_KEY   Overrides api_key from the config file
  PDFIUM_LIB_PATH     Path to libpdfium when it is not on the system path
  RUST_LOG            Full tracing filter, overrides --log-level
"#;

/// Generate per-page study notes from a PDF with a chat-completions model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2notes",
    version,
    about = "Generate per-page study notes from a PDF with an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file, or text file with "### Page n" markers.
    input: PathBuf,

    /// JSON config file. Defaults to ./config.json when present.
    #[arg(long, env = "PDF2NOTES_CONFIG")]
    config: Option<PathBuf>,

    /// API key; overrides the config file.
    #[arg(long, env = "PDF2NOTES_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Topic the analysis is framed around.
    #[arg(long, env = "PDF2NOTES_TOPIC")]
    topic: Option<String>,

    /// What to do when a page fails: skip or abort.
    #[arg(long, env = "PDF2NOTES_ERROR_STRATEGY")]
    error_strategy: Option<ErrorStrategy>,

    /// Write the final usage statistics as JSON to this path.
    #[arg(long, env = "PDF2NOTES_SAVE_STATS")]
    save_stats: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, env = "PDF2NOTES_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    /// Output path. Defaults to <input>_notes.md (or <input>.txt with --extract-only).
    #[arg(short, long, env = "PDF2NOTES_OUTPUT")]
    output: Option<PathBuf>,

    /// Only extract page-marked text; no model calls.
    #[arg(long)]
    extract_only: bool,

    /// OCR every page instead of only pages without a text layer.
    #[arg(long, env = "PDF2NOTES_OCR")]
    ocr: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2NOTES_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli)?;
    let show_progress = !cli.no_progress && !cli.extract_only;
    init_logging(&config, show_progress);

    if cli.extract_only {
        return extract_only(&cli, &config).await;
    }

    let progress = show_progress.then(CliProgressCallback::new);
    if let Some(cb) = &progress {
        config.progress_callback = Some(cb.clone() as ProgressCallback);
    }
    config.validate().context("Invalid configuration")?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    let pages = match load_pages(&cli.input, &config).await {
        Ok(pages) => pages,
        Err(e) => {
            if let Some(cb) = &progress {
                cb.abandon();
            }
            return Err(e).with_context(|| format!("Failed to read {}", cli.input.display()));
        }
    };

    let generator = NoteGenerator::from_config(config.clone()).context("Failed to set up model client")?;
    let mut tracker = UsageTracker::new();
    let result = generator.run(&pages, &output_path, &mut tracker).await;
    let stats = tracker.snapshot();

    if let Some(ref path) = cli.save_stats {
        write_stats_json(path, &stats)
            .await
            .with_context(|| format!("Failed to save statistics to {}", path.display()))?;
        eprintln!("Statistics saved to {}", bold(&path.display().to_string()));
    }

    match result {
        Ok(_) => {
            eprintln!("Notes written to {}", bold(&output_path.display().to_string()));
            println!("{stats}");
            Ok(())
        }
        Err(e) => {
            if let Some(cb) = &progress {
                cb.abandon();
            }
            eprintln!("{stats}");
            Err(e).context("Note generation stopped")
        }
    }
}

/// Config file (if any) with CLI overrides applied. Not validated yet.
fn load_config(cli: &Cli) -> Result<NotesConfig> {
    let mut config = match &cli.config {
        Some(path) => NotesConfig::read_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if Path::new("config.json").exists() => NotesConfig::read_json_file("config.json")
            .context("Failed to load ./config.json")?,
        None => NotesConfig::default(),
    };

    if let Some(ref key) = cli.api_key {
        config.api_key = key.clone();
    }
    if let Some(ref topic) = cli.topic {
        config.topic = topic.clone();
    }
    if let Some(strategy) = cli.error_strategy {
        config.error_strategy = strategy;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.ocr {
        config.force_ocr = true;
    }
    Ok(config)
}

/// `RUST_LOG` wins; otherwise the configured level, quietened to `error`
/// under the progress bar unless debugging.
fn init_logging(config: &NotesConfig, show_progress: bool) {
    let level = config.log_level;
    let verbose = matches!(level, LogLevel::Debug | LogLevel::Trace);
    let filter = if show_progress && !verbose {
        "error"
    } else {
        level.as_filter()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();
}

async fn extract_only(cli: &Cli, config: &NotesConfig) -> Result<()> {
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_text_path(&cli.input));
    if output_path == cli.input {
        bail!(
            "Refusing to overwrite the input {}; pass --output",
            cli.input.display()
        );
    }

    let pages = load_pages(&cli.input, config)
        .await
        .with_context(|| format!("Failed to extract {}", cli.input.display()))?;
    tokio::fs::write(&output_path, render_page_text(&pages))
        .await
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    eprintln!(
        "{} {} pages extracted  →  {}",
        green("✔"),
        pages.len(),
        bold(&output_path.display().to_string())
    );
    Ok(())
}
