//! Input resolution: classify a user-supplied path before any heavy work.
//!
//! Two inputs are accepted: a PDF (recognised by the `%PDF` magic bytes) or
//! an already-extracted UTF-8 text file in the page-marked format. Anything
//! else is rejected up front so callers get a clear error instead of a
//! pdfium failure halfway through.

use crate::error::NotesError;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What kind of document a path holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    /// Page-marked text; the content is already loaded.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub kind: InputKind,
}

/// Check the path exists and is readable, then sniff its kind.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<ResolvedInput, NotesError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(NotesError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(NotesError::PermissionDenied { path });
        }
        Err(_) => return Err(NotesError::FileNotFound { path }),
    };

    let read_failed = |e: std::io::Error, path: &Path| match e.kind() {
        ErrorKind::PermissionDenied => NotesError::PermissionDenied {
            path: path.to_path_buf(),
        },
        // directories open fine on unix but fail here
        _ => NotesError::FileNotFound {
            path: path.to_path_buf(),
        },
    };

    let mut bytes = Vec::with_capacity(4);
    (&mut file)
        .take(4)
        .read_to_end(&mut bytes)
        .map_err(|e| read_failed(e, &path))?;

    if bytes.starts_with(b"%PDF") {
        debug!("Resolved PDF input: {}", path.display());
        return Ok(ResolvedInput {
            path,
            kind: InputKind::Pdf,
        });
    }

    file.read_to_end(&mut bytes)
        .map_err(|e| read_failed(e, &path))?;

    match String::from_utf8(bytes) {
        Ok(text) => {
            debug!("Resolved text input: {} ({} bytes)", path.display(), text.len());
            Ok(ResolvedInput {
                path,
                kind: InputKind::Text(text),
            })
        }
        Err(e) => {
            let raw = e.into_bytes();
            let mut magic = [0u8; 4];
            let n = raw.len().min(4);
            magic[..n].copy_from_slice(&raw[..n]);
            Err(NotesError::NotAPdf { path, magic })
        }
    }
}

/// `paper.pdf` → `paper_notes.md`, next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    with_stem_suffix(input, "_notes", "md")
}

/// `paper.pdf` → `paper.txt`, where `--extract-only` writes.
pub fn default_text_path(input: &Path) -> PathBuf {
    with_stem_suffix(input, "", "txt")
}

fn with_stem_suffix(input: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.{}", stem, suffix, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file() {
        let err = resolve_input("/no/such/file.pdf").unwrap_err();
        assert!(matches!(err, NotesError::FileNotFound { .. }));
    }

    #[test]
    fn pdf_magic_detected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n\xff\xfe binary").unwrap();
        let resolved = resolve_input(f.path()).unwrap();
        assert_eq!(resolved.kind, InputKind::Pdf);
    }

    #[test]
    fn utf8_text_detected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all("### Page 1\n\n注意力机制".as_bytes()).unwrap();
        let resolved = resolve_input(f.path()).unwrap();
        assert_eq!(
            resolved.kind,
            InputKind::Text("### Page 1\n\n注意力机制".to_string())
        );
    }

    #[test]
    fn binary_rejected_with_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0x89, b'P', b'N', b'G', 0xff, 0x00]).unwrap();
        match resolve_input(f.path()).unwrap_err() {
            NotesError::NotAPdf { magic, .. } => assert_eq!(magic, [0x89, b'P', b'N', b'G']),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn output_paths_derive_from_stem() {
        assert_eq!(
            default_output_path(Path::new("/data/attention.pdf")),
            PathBuf::from("/data/attention_notes.md")
        );
        assert_eq!(
            default_text_path(Path::new("paper.pdf")),
            PathBuf::from("paper.txt")
        );
    }
}
