//! Chat-completion calls: one prompt in, one interpretation out.
//!
//! The generator only sees the [`ModelClient`] trait, so tests and alternative
//! backends plug in behind an `Arc<dyn ModelClient>`. [`HttpModelClient`] is
//! the real implementation: a single `POST {api_base}/chat/completions` per
//! page with bearer auth and no retries.

use crate::config::NotesConfig;
use crate::error::{NotesError, PageError};
use crate::usage::TokenUsage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// What a successful call yields.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
}

/// A backend able to answer one prompt for one page.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// `page` is only used to tag errors and logs.
    async fn complete(&self, page: usize, prompt: &str) -> Result<Completion, PageError>;
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ── HTTP client ──────────────────────────────────────────────────────────────

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl HttpModelClient {
    pub fn from_config(config: &NotesConfig) -> Result<Self, NotesError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| NotesError::Internal(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, page: usize, prompt: &str) -> Result<Completion, PageError> {
        let start = Instant::now();
        debug!("Page {}: POST {} (model {})", page, self.url, self.model);

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| self.map_send_error(page, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(page, e))?;

        if !status.is_success() {
            return Err(PageError::ApiError {
                page,
                status: status.as_u16(),
                body,
            });
        }

        let completion = parse_completion(page, &body)?;
        debug!(
            "Page {}: {} prompt + {} completion tokens in {:?}",
            page,
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens,
            start.elapsed()
        );
        Ok(completion)
    }
}

impl HttpModelClient {
    fn map_send_error(&self, page: usize, e: reqwest::Error) -> PageError {
        if e.is_timeout() {
            PageError::Timeout {
                page,
                secs: self.timeout_secs,
            }
        } else {
            PageError::Request {
                page,
                detail: e.to_string(),
            }
        }
    }
}

/// Pull `choices[0].message.content` and `usage` out of a 2xx body.
///
/// A missing `usage` object counts as zero tokens.
pub fn parse_completion(page: usize, body: &str) -> Result<Completion, PageError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| PageError::MalformedResponse {
            page,
            detail: format!("invalid JSON: {}", e),
        })?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| PageError::MalformedResponse {
            page,
            detail: "missing choices[0].message.content".to_string(),
        })?;

    Ok(Completion {
        content,
        usage: parsed.usage.unwrap_or_default(),
    })
}
