//! Configuration types for note generation.
//!
//! All run behaviour is controlled through [`NotesConfig`]. It can be built in
//! code via [`NotesConfigBuilder`] or loaded once at startup from a JSON file
//! with [`NotesConfig::from_json_file`]; both paths end in the same
//! validation, so a bad value is rejected before the first page is touched.
//!
//! A minimal config file:
//!
//! ```json
//! {
//!   "api_key": "sk-...",
//!   "api_base": "https://api.openai.com/v1",
//!   "model": "gpt-4o-mini",
//!   "temperature": 0.7,
//!   "max_tokens": 4096,
//!   "context_window": 8192,
//!   "price_per_1m_tokens": 1.0,
//!   "log_level": "info"
//! }
//! ```

use crate::error::NotesError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration for a notes run.
///
/// Missing keys in a config file fall back to [`NotesConfig::default()`];
/// `api_key` has no usable default and must always be provided.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Bearer token sent with every model request.
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API, without the trailing
    /// `/chat/completions`. Default: `https://api.openai.com/v1`.
    pub api_base: String,

    /// Model identifier sent in the request body. Default: `gpt-4o-mini`.
    pub model: String,

    /// Sampling temperature. Range: 0.0–2.0. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Token budget of a single request. Default: 8192.
    pub context_window: usize,

    /// Tokens kept free below `context_window` when chunking. Default: 1000.
    pub reserved_margin: usize,

    /// Price per one million total tokens, in the account's currency. Default: 0.0.
    pub price_per_1m_tokens: f64,

    /// Library log level used by the CLI when `RUST_LOG` is unset. Default: info.
    pub log_level: LogLevel,

    /// Subject area injected into every prompt. Default: `技术综述`.
    pub topic: String,

    /// What to do when a page's model call fails. Default: [`ErrorStrategy::Skip`].
    pub error_strategy: ErrorStrategy,

    /// Per-request timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Vertical tolerance, in OCR pixels, for two fragments to share a line. Default: 10.
    pub y_threshold: f32,

    /// Path to a HuggingFace `tokenizer.json`. When absent or unloadable,
    /// token counts fall back to `bytes / 4`.
    pub tokenizer_path: Option<PathBuf>,

    /// Explicit libpdfium path. Falls back to `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Tesseract language code for OCR. Default: `eng`.
    pub ocr_language: String,

    /// Rasterisation DPI for OCR pages. Range: 72–600. Default: 300.
    pub ocr_dpi: u32,

    /// Pages whose text layer has fewer non-whitespace chars than this go to OCR. Default: 1.
    pub min_text_chars: usize,

    /// OCR every page, ignoring the text layer. Default: false.
    pub force_ocr: bool,

    /// Subscriber for per-page events. Never read from a config file.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            context_window: 8192,
            reserved_margin: 1000,
            price_per_1m_tokens: 0.0,
            log_level: LogLevel::default(),
            topic: "技术综述".to_string(),
            error_strategy: ErrorStrategy::default(),
            api_timeout_secs: 60,
            y_threshold: 10.0,
            tokenizer_path: None,
            pdfium_lib_path: None,
            ocr_language: "eng".to_string(),
            ocr_dpi: 300,
            min_text_chars: 1,
            force_ocr: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for NotesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("context_window", &self.context_window)
            .field("reserved_margin", &self.reserved_margin)
            .field("price_per_1m_tokens", &self.price_per_1m_tokens)
            .field("log_level", &self.log_level)
            .field("topic", &self.topic)
            .field("error_strategy", &self.error_strategy)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("y_threshold", &self.y_threshold)
            .field("tokenizer_path", &self.tokenizer_path)
            .field("force_ocr", &self.force_ocr)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn NotesProgressCallback>"),
            )
            .finish()
    }
}

impl NotesConfig {
    /// Create a new builder for `NotesConfig`.
    pub fn builder() -> NotesConfigBuilder {
        NotesConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, NotesError> {
        let config = Self::read_json_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file without validating it, so callers can
    /// apply overrides first.
    pub fn read_json_file(path: impl AsRef<Path>) -> Result<Self, NotesError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| NotesError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| NotesError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Token limit a chunk must stay below.
    pub fn chunk_token_limit(&self) -> usize {
        self.context_window.saturating_sub(self.reserved_margin)
    }

    /// `POST` target for chat completions.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    /// Check every constraint a run depends on.
    pub fn validate(&self) -> Result<(), NotesError> {
        let invalid = |msg: String| Err(NotesError::InvalidConfig(msg));

        if self.api_key.trim().is_empty() {
            return invalid("api_key must be set".into());
        }
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return invalid(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            ));
        }
        if self.model.trim().is_empty() {
            return invalid("model must be set".into());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return invalid(format!("temperature must be 0–2, got {}", self.temperature));
        }
        if self.max_tokens == 0 {
            return invalid("max_tokens must be ≥ 1".into());
        }
        if self.context_window <= self.reserved_margin {
            return invalid(format!(
                "context_window ({}) must exceed reserved_margin ({})",
                self.context_window, self.reserved_margin
            ));
        }
        if !self.price_per_1m_tokens.is_finite() || self.price_per_1m_tokens < 0.0 {
            return invalid(format!(
                "price_per_1m_tokens must be ≥ 0, got {}",
                self.price_per_1m_tokens
            ));
        }
        if self.api_timeout_secs == 0 {
            return invalid("api_timeout_secs must be ≥ 1".into());
        }
        if !self.y_threshold.is_finite() || self.y_threshold < 0.0 {
            return invalid(format!("y_threshold must be ≥ 0, got {}", self.y_threshold));
        }
        if !(72..=600).contains(&self.ocr_dpi) {
            return invalid(format!("ocr_dpi must be 72–600, got {}", self.ocr_dpi));
        }
        Ok(())
    }
}

/// Builder for [`NotesConfig`].
#[derive(Debug)]
pub struct NotesConfigBuilder {
    config: NotesConfig,
}

impl NotesConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn context_window(mut self, n: usize) -> Self {
        self.config.context_window = n;
        self
    }

    pub fn reserved_margin(mut self, n: usize) -> Self {
        self.config.reserved_margin = n;
        self
    }

    pub fn price_per_1m_tokens(mut self, price: f64) -> Self {
        self.config.price_per_1m_tokens = price.max(0.0);
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.config.topic = topic.into();
        self
    }

    pub fn error_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.config.error_strategy = strategy;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn y_threshold(mut self, y: f32) -> Self {
        self.config.y_threshold = y.max(0.0);
        self
    }

    pub fn tokenizer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tokenizer_path = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.config.force_ocr = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NotesConfig, NotesError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Policy for a page whose model call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStrategy {
    /// Write the failure notice in place of the interpretation and move on. (default)
    #[default]
    Skip,
    /// Stop the run; pages already written stay on disk.
    Abort,
}

impl fmt::Display for ErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStrategy::Skip => f.write_str("skip"),
            ErrorStrategy::Abort => f.write_str("abort"),
        }
    }
}

impl FromStr for ErrorStrategy {
    type Err = NotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(ErrorStrategy::Skip),
            "abort" => Ok(ErrorStrategy::Abort),
            other => Err(NotesError::InvalidConfig(format!(
                "error_strategy must be 'skip' or 'abort', got '{other}'"
            ))),
        }
    }
}

/// Log verbosity accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    /// Adds per-request detail: URL, model, token counts, latency and cost.
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string for a `tracing` env filter.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = NotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(NotesError::InvalidConfig(format!(
                "unknown log_level '{other}'"
            ))),
        }
    }
}
