//! Text-layer cleanup: turn raw extracted page text into paragraphs.
//!
//! PDF text layers break lines wherever the layout did, not where sentences
//! end. The cleaner rejoins wrapped lines into paragraphs and keeps list
//! items on their own paragraph so the model sees the page's structure.

/// Line prefixes that start a new paragraph of their own.
const LIST_MARKERS: [&str; 6] = ["•", "-", "*", "1.", "2.", "3."];

/// Normalise raw page text into `"\n\n"`-separated paragraphs.
///
/// 1. Trim every line and drop blank ones
/// 2. Collapse runs of whitespace inside a line to one space
/// 3. Join consecutive plain lines with a space
/// 4. Lines starting with a list marker close the open paragraph and stand alone
pub fn clean_text(raw: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            continue;
        }

        if starts_list_item(&line) {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
            paragraphs.push(line);
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs.join("\n\n")
}

/// Count of non-whitespace characters, used to decide whether a page needs OCR.
pub fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn starts_list_item(line: &str) -> bool {
    LIST_MARKERS.iter().any(|m| line.starts_with(m))
}
