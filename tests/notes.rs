//! Integration tests for the public note-generation API.
//!
//! Everything here runs offline: the model is either a scripted
//! `ModelClient` or a one-file HTTP stub bound to localhost.

use async_trait::async_trait;
use pdf2notes::{
    generate_notes, load_pages, render_page_text, Completion, ErrorStrategy, ModelClient,
    NoteGenerator, NotesConfig, NotesError, Page, PageError, PageSegmenter, TokenCounter,
    TokenUsage, UsageTracker,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Helpers ──────────────────────────────────────────────────────────────────

const PAPER: &str = "### Page 1

Transformer 完全基于注意力机制。

### Page 2

多头注意力把表示投影到多个子空间。

### Page 3

位置编码为序列注入顺序信息。
";

struct Scripted {
    replies: Mutex<VecDeque<Result<Completion, PageError>>>,
}

impl Scripted {
    fn new(replies: Vec<Result<Completion, PageError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl ModelClient for Scripted {
    async fn complete(&self, page: usize, _prompt: &str) -> Result<Completion, PageError> {
        self.replies.lock().unwrap().pop_front().unwrap_or(Err(PageError::Request {
            page,
            detail: "no scripted reply".into(),
        }))
    }
}

fn reply(text: &str, tokens: u64) -> Result<Completion, PageError> {
    Ok(Completion {
        content: text.into(),
        usage: TokenUsage {
            prompt_tokens: tokens,
            completion_tokens: tokens,
            total_tokens: tokens * 2,
        },
    })
}

fn config(strategy: ErrorStrategy) -> NotesConfig {
    NotesConfig::builder()
        .api_key("sk-test")
        .error_strategy(strategy)
        .price_per_1m_tokens(1.0)
        .build()
        .unwrap()
}

/// Route library logs through the test harness; `RUST_LOG=debug` shows requests.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_input(dir: &Path) -> PathBuf {
    let path = dir.join("paper.txt");
    std::fs::write(&path, PAPER).unwrap();
    path
}

/// Answer every HTTP request on a fresh port with the same JSON body.
async fn stub_server(status_line: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v1", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let Ok(n) = socket.read(&mut chunk).await else {
                        return;
                    };
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let len = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                if k.eq_ignore_ascii_case("content-length") {
                                    v.trim().parse::<usize>().ok()
                                } else {
                                    None
                                }
                            })
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + len {
                            break;
                        }
                    }
                }
                let response = format!(
                    "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.ok();
                socket.shutdown().await.ok();
            });
        }
    });

    (base, hits)
}

// ── Orchestration through the public API ─────────────────────────────────────

#[tokio::test]
async fn text_input_produces_one_section_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let out = dir.path().join("paper_notes.md");

    let cfg = config(ErrorStrategy::Skip);
    let pages = load_pages(&input, &cfg).await.unwrap();
    assert_eq!(pages.len(), 3);

    let client = Scripted::new(vec![reply("解读一", 10), reply("解读二", 20), reply("解读三", 30)]);
    let generator = NoteGenerator::new(client, cfg);
    let mut tracker = UsageTracker::new();
    let summary = generator.run(&pages, &out, &mut tracker).await.unwrap();

    assert_eq!(summary.pages_succeeded, 3);
    assert_eq!(summary.usage.api_calls, 3);
    assert_eq!(summary.usage.total_tokens, 120);

    let notes = std::fs::read_to_string(&out).unwrap();
    assert!(notes.starts_with(
        "# Page 1\n\n## 原文\n\nTransformer 完全基于注意力机制。\n\n## 内容解读\n\n解读一\n\n"
    ));
    assert_eq!(notes.matches("## 原文").count(), 3);
    assert_eq!(notes.matches("## 内容解读").count(), 3);
}

#[tokio::test]
async fn skip_writes_failure_notice_with_response_body() {
    let dir = tempfile::tempdir().unwrap();
    let pages = load_pages(&write_input(dir.path()), &config(ErrorStrategy::Skip))
        .await
        .unwrap();
    let out = dir.path().join("notes.md");

    let client = Scripted::new(vec![
        reply("好", 1),
        Err(PageError::ApiError {
            page: 2,
            status: 500,
            body: r#"{"error":"overloaded"}"#.into(),
        }),
        reply("也好", 1),
    ]);
    let summary = NoteGenerator::new(client, config(ErrorStrategy::Skip))
        .run(&pages, &out, &mut UsageTracker::new())
        .await
        .unwrap();

    assert_eq!(summary.pages_failed, 1);
    let notes = std::fs::read_to_string(&out).unwrap();
    let page2 = &notes[notes.find("# Page 2").unwrap()..notes.find("# Page 3").unwrap()];
    assert!(page2.contains("## 内容解读\n\n生成失败: "), "{page2}");
    assert!(page2.contains("overloaded"), "{page2}");
    assert!(notes.contains("也好"));
}

#[tokio::test]
async fn abort_leaves_only_earlier_pages_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let pages = load_pages(&write_input(dir.path()), &config(ErrorStrategy::Abort))
        .await
        .unwrap();
    let out = dir.path().join("notes.md");

    let client = Scripted::new(vec![
        reply("好", 1),
        Err(PageError::Timeout { page: 2, secs: 60 }),
    ]);
    let mut tracker = UsageTracker::new();
    let err = NoteGenerator::new(client, config(ErrorStrategy::Abort))
        .run(&pages, &out, &mut tracker)
        .await
        .unwrap_err();

    assert!(matches!(err, NotesError::Aborted { page: 2, .. }), "{err:?}");
    let notes = std::fs::read_to_string(&out).unwrap();
    assert!(notes.contains("# Page 1"));
    assert!(!notes.contains("# Page 2"));
    assert!(!notes.contains("# Page 3"));
    assert_eq!(tracker.snapshot().api_calls, 1);
}

#[test]
fn summary_serialises_page_reports() {
    let dir = tempfile::tempdir().unwrap();
    let pages = vec![Page::new(1, "甲"), Page::new(2, "乙")];
    let client = Scripted::new(vec![
        reply("a", 1),
        Err(PageError::MalformedResponse {
            page: 2,
            detail: "missing choices[0].message.content".into(),
        }),
    ]);

    let summary = tokio_test::block_on(
        NoteGenerator::new(client, config(ErrorStrategy::Skip)).run(
            &pages,
            &dir.path().join("n.md"),
            &mut UsageTracker::new(),
        ),
    )
    .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["pages_total"], 2);
    assert_eq!(json["page_reports"][0]["state"], "succeeded");
    assert_eq!(json["page_reports"][1]["state"], "failed");
    assert!(json["page_reports"][0].get("error").is_none());
    assert!(json["page_reports"][1]["error"]["MalformedResponse"].is_object());
}

// ── Segmentation on extracted text ───────────────────────────────────────────

struct CharCounter;

impl TokenCounter for CharCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn name(&self) -> &str {
        "chars"
    }
}

#[test]
fn extracted_text_round_trips_through_segmenter() {
    let pages = pdf2notes::parse_pages(PAPER);
    let rendered = render_page_text(&pages);
    let segmenter = PageSegmenter::new(Box::new(CharCounter), 40);

    let chunks = segmenter.chunk_text(&rendered);
    let covered: Vec<usize> = chunks.iter().flat_map(|c| c.pages.clone()).collect();
    assert_eq!(covered, vec![1, 2, 3]);
    assert!(chunks.iter().all(|c| c.tokens < 40 || c.pages.len() == 1));
}

// ── Full path over HTTP ──────────────────────────────────────────────────────

#[tokio::test]
async fn generate_notes_over_http_stub() {
    init_tracing();
    let (base, hits) = stub_server(
        "HTTP/1.1 200 OK",
        r####"{"choices":[{"message":{"role":"assistant","content":"### 概念解释\n注意力"}}],"usage":{"prompt_tokens":100,"completion_tokens":50,"total_tokens":150}}"####,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let cfg = NotesConfig::builder()
        .api_key("sk-test")
        .api_base(base)
        .price_per_1m_tokens(4.0)
        .build()
        .unwrap();

    let run = generate_notes(&input, None, &cfg).await.unwrap();

    assert_eq!(run.output_path, dir.path().join("paper_notes.md"));
    assert_eq!(run.summary.pages_succeeded, 3);
    assert_eq!(run.summary.usage.api_calls, 3);
    assert_eq!(run.summary.usage.total_tokens, 450);
    assert!((run.summary.usage.total_cost - 450.0 / 1_000_000.0 * 4.0).abs() < 1e-12);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let notes = std::fs::read_to_string(&run.output_path).unwrap();
    assert_eq!(notes.matches("### 概念解释\n注意力").count(), 3);
}

#[tokio::test]
async fn generate_notes_http_error_is_recorded_under_skip() {
    init_tracing();
    let (base, _) = stub_server("HTTP/1.1 503 Service Unavailable", r#"{"error":"busy"}"#).await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let out = dir.path().join("custom.md");
    let cfg = NotesConfig::builder()
        .api_key("sk-test")
        .api_base(base)
        .build()
        .unwrap();

    let run = generate_notes(&input, Some(&out), &cfg).await.unwrap();
    assert_eq!(run.summary.pages_failed, 3);
    assert_eq!(run.summary.usage.api_calls, 0);

    let notes = std::fs::read_to_string(&out).unwrap();
    assert_eq!(notes.matches("生成失败: API call failed (status 503)").count(), 3);
}

#[tokio::test]
async fn missing_input_is_fatal() {
    let err = generate_notes("/no/such/paper.pdf", None, &config(ErrorStrategy::Skip))
        .await
        .unwrap_err();
    assert!(matches!(err, NotesError::FileNotFound { .. }));
}
