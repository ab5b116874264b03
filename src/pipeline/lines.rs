//! Reading-order line reconstruction for OCR output.
//!
//! OCR engines report words as boxes in no guaranteed order. Sorting by the
//! vertical anchor and merging fragments whose anchors sit within
//! `y_threshold` of the line's first fragment recovers the visual rows.
//!
//! Only the y axis is considered. Fragments on the same row keep their input
//! order, so two columns sharing a baseline are merged into one line; there
//! is no column detection.

use serde::{Deserialize, Serialize};

/// One recognised text span with the y coordinate of its first corner point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub anchor_y: f32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, anchor_y: f32) -> Self {
        Self {
            text: text.into(),
            anchor_y,
        }
    }
}

/// Groups fragments into lines by vertical proximity.
#[derive(Debug, Clone, Copy)]
pub struct LineReconstructor {
    y_threshold: f32,
}

impl Default for LineReconstructor {
    fn default() -> Self {
        Self { y_threshold: 10.0 }
    }
}

impl LineReconstructor {
    pub fn new(y_threshold: f32) -> Self {
        Self {
            y_threshold: y_threshold.max(0.0),
        }
    }

    /// Ordered lines, each the space-joined texts of one visual row.
    ///
    /// The reference y of a line is its first fragment's anchor and does not
    /// drift as fragments are added.
    pub fn lines(&self, fragments: &[TextFragment]) -> Vec<String> {
        let mut sorted: Vec<&TextFragment> = fragments.iter().collect();
        // stable: equal anchors keep input order
        sorted.sort_by(|a, b| a.anchor_y.total_cmp(&b.anchor_y));

        let mut lines = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut reference_y: Option<f32> = None;

        for frag in sorted {
            match reference_y {
                Some(y) if (frag.anchor_y - y).abs() <= self.y_threshold => {
                    current.push(frag.text.as_str());
                }
                Some(_) => {
                    lines.push(current.join(" "));
                    current = vec![frag.text.as_str()];
                    reference_y = Some(frag.anchor_y);
                }
                None => {
                    current.push(frag.text.as_str());
                    reference_y = Some(frag.anchor_y);
                }
            }
        }

        if !current.is_empty() {
            lines.push(current.join(" "));
        }

        lines
    }

    /// Lines joined with a blank-line paragraph separator.
    pub fn reconstruct(&self, fragments: &[TextFragment]) -> String {
        self.lines(fragments).join("\n\n")
    }
}
