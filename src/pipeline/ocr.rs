//! OCR seam for pages without a usable text layer.
//!
//! [`OcrEngine`] takes a rendered page image and returns positioned text
//! fragments; [`crate::pipeline::lines::LineReconstructor`] turns those into
//! reading-order lines. [`TesseractOcr`] drives the `tesseract` CLI in TSV
//! mode, where every recognised word arrives with its bounding box.

use crate::error::OcrError;
use crate::pipeline::lines::TextFragment;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Recognises text in a page image.
pub trait OcrEngine: Send + Sync {
    fn recognise(&self, image: &Path) -> Result<Vec<TextFragment>, OcrError>;

    fn name(&self) -> &str;
}

/// `tesseract <image> stdout -l <lang> tsv`
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self::with_program("tesseract", language)
    }

    pub fn with_program(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }

    /// Whether the binary can be started at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractOcr {
    fn recognise(&self, image: &Path) -> Result<Vec<TextFragment>, OcrError> {
        let output = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("tsv")
            .output()
            .map_err(|source| OcrError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let fragments = parse_tsv(&String::from_utf8_lossy(&output.stdout))?;
        debug!("{}: {} words from {}", self.program, fragments.len(), image.display());
        Ok(fragments)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

const LEVEL_LINE: u32 = 4;
const LEVEL_WORD: u32 = 5;
const COL_LEVEL: usize = 0;
const COL_LINE_KEY: std::ops::Range<usize> = 1..5;
const COL_TOP: usize = 7;
const COL_TEXT: usize = 11;

/// Parse tesseract TSV output into word fragments.
///
/// Only word rows (level 5) with non-blank text are kept. Each word is
/// anchored at the `top` of its enclosing line row (level 4), so words of one
/// line share an anchor and keep tesseract's reading order; a word with no
/// preceding line row falls back to its own `top`. A row with too few columns
/// or a non-numeric level/top is an error rather than silently dropped.
pub fn parse_tsv(tsv: &str) -> Result<Vec<TextFragment>, OcrError> {
    let mut fragments = Vec::new();
    // (page, block, par, line) of the last line row, and its top
    let mut current_line: Option<(Vec<&str>, f32)> = None;

    for (i, line) in tsv.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() || (i == 0 && line.starts_with("level")) {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < COL_TEXT {
            return Err(OcrError::MalformedRow {
                line: line_no,
                detail: format!("expected at least 11 columns, found {}", cols.len()),
            });
        }

        let level: u32 = cols[COL_LEVEL].trim().parse().map_err(|_| OcrError::MalformedRow {
            line: line_no,
            detail: format!("level '{}' is not a number", cols[COL_LEVEL]),
        })?;
        if level != LEVEL_LINE && level != LEVEL_WORD {
            continue;
        }

        let top: f32 = cols[COL_TOP].trim().parse().map_err(|_| OcrError::MalformedRow {
            line: line_no,
            detail: format!("top '{}' is not a number", cols[COL_TOP]),
        })?;
        let key = cols[COL_LINE_KEY].to_vec();

        if level == LEVEL_LINE {
            current_line = Some((key, top));
            continue;
        }

        let text = cols.get(COL_TEXT).map(|t| t.trim()).unwrap_or("");
        if text.is_empty() {
            continue;
        }

        let anchor_y = match &current_line {
            Some((line_key, line_top)) if *line_key == key => *line_top,
            _ => top,
        };
        fragments.push(TextFragment::new(text, anchor_y));
    }

    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t2480\t3508\t-1\t
2\t1\t1\t0\t0\t0\t200\t300\t900\t80\t-1\t
4\t1\t1\t1\t1\t0\t200\t300\t900\t40\t-1\t
5\t1\t1\t1\t1\t1\t200\t302\t180\t38\t96.1\tAttention
5\t1\t1\t1\t1\t2\t400\t300\t60\t38\t95.0\tis
5\t1\t1\t1\t1\t3\t480\t301\t60\t38\t94.2\tall
4\t1\t1\t1\t2\t0\t200\t359\t200\t40\t-1\t
5\t1\t1\t1\t2\t1\t200\t360\t60\t38\t93.0\tyou
5\t1\t1\t1\t2\t2\t280\t361\t80\t38\t92.5\tneed
5\t1\t1\t1\t2\t3\t380\t361\t10\t38\t10.0\t
";

    #[test]
    fn keeps_only_nonblank_words() {
        let frags = parse_tsv(SAMPLE).unwrap();
        let words: Vec<&str> = frags.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(words, vec!["Attention", "is", "all", "you", "need"]);
    }

    #[test]
    fn words_share_their_line_anchor() {
        let frags = parse_tsv(SAMPLE).unwrap();
        let anchors: Vec<f32> = frags.iter().map(|f| f.anchor_y).collect();
        assert_eq!(anchors, vec![300.0, 300.0, 300.0, 359.0, 359.0]);
    }

    #[test]
    fn word_without_line_row_uses_own_top() {
        let tsv = "5\t1\t1\t1\t1\t1\t200\t42\t10\t10\t90\tword\n";
        let frags = parse_tsv(tsv).unwrap();
        assert_eq!(frags[0].anchor_y, 42.0);
    }

    #[test]
    fn words_rebuild_into_lines() {
        use crate::pipeline::lines::LineReconstructor;
        let frags = parse_tsv(SAMPLE).unwrap();
        assert_eq!(
            LineReconstructor::new(10.0).reconstruct(&frags),
            "Attention is all\n\nyou need"
        );
    }

    #[test]
    fn empty_output_has_no_fragments() {
        assert!(parse_tsv("").unwrap().is_empty());
        assert!(parse_tsv("level\tpage_num\n").unwrap().is_empty());
    }

    #[test]
    fn short_row_is_malformed() {
        let err = parse_tsv("5\t1\t1\t1\n").unwrap_err();
        assert!(matches!(err, OcrError::MalformedRow { line: 1, .. }), "{err:?}");
    }

    #[test]
    fn non_numeric_top_is_malformed() {
        let tsv = "5\t1\t1\t1\t1\t1\t200\tabc\t10\t10\t90\tword\n";
        let err = parse_tsv(tsv).unwrap_err();
        assert!(err.to_string().contains("top"), "{err}");
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let ocr = TesseractOcr::with_program("pdf2notes-no-such-ocr-binary", "eng");
        assert!(!ocr.is_available());
        let err = ocr.recognise(Path::new("/tmp/page.png")).unwrap_err();
        assert!(matches!(err, OcrError::Spawn { .. }), "{err:?}");
    }
}
