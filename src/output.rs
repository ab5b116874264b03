//! The notes file and its per-page sections.
//!
//! Every page becomes one section:
//!
//! ```text
//! # Page 3
//!
//! ## 原文
//!
//! <page text>
//!
//! ## 内容解读
//!
//! <interpretation, or "生成失败: <error>">
//! ```
//!
//! Sections are appended one at a time; the file is opened in append mode,
//! written, flushed and closed per page so an interrupted run keeps every
//! finished page.

use crate::error::{NotesError, PageError};
use crate::usage::UsageStats;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// What goes under `## 内容解读`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NoteBody {
    Interpretation(String),
    Failure(PageError),
}

/// One page's section of the notes file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteEntry {
    pub page_index: usize,
    pub original_text: String,
    pub body: NoteBody,
}

impl NoteEntry {
    pub fn render(&self) -> String {
        let body = match &self.body {
            NoteBody::Interpretation(text) => text.clone(),
            NoteBody::Failure(err) => format!("生成失败: {}", err),
        };
        format!(
            "# Page {}\n\n## 原文\n\n{}\n\n## 内容解读\n\n{}\n\n",
            self.page_index, self.original_text, body
        )
    }
}

/// Append-only writer for the notes file.
#[derive(Debug, Clone)]
pub struct NoteWriter {
    path: PathBuf,
}

impl NoteWriter {
    /// Create the file, truncating anything left from an earlier run.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, NotesError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_failed(&path, e))?;
        }
        tokio::fs::File::create(&path)
            .await
            .map_err(|e| write_failed(&path, e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one section and flush it before returning.
    pub async fn append(&self, entry: &NoteEntry) -> Result<(), NotesError> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| write_failed(&self.path, e))?;
        file.write_all(entry.render().as_bytes())
            .await
            .map_err(|e| write_failed(&self.path, e))?;
        file.flush().await.map_err(|e| write_failed(&self.path, e))?;
        Ok(())
    }
}

/// Write a usage snapshot as pretty JSON.
pub async fn write_stats_json(path: impl AsRef<Path>, stats: &UsageStats) -> Result<(), NotesError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(stats)
        .map_err(|e| NotesError::Internal(format!("stats serialisation: {}", e)))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| write_failed(path, e))
}

fn write_failed(path: &Path, source: std::io::Error) -> NotesError {
    NotesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}
