//! Post-processing: light, deterministic cleanup of the model's reply.
//!
//! The interpretation is embedded verbatim under `## 内容解读`, so only
//! wrapper artefacts are touched; headings, lists and prose are left as the
//! model wrote them.
//!
//! Rules (applied in order):
//! 1. Normalise line endings (CRLF → LF)
//! 2. Strip an outer ```` ```markdown ```` fence wrapping the whole reply
//! 3. Trim trailing whitespace per line
//! 4. Collapse 3+ consecutive blank lines down to 2
//! 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 6. Trim leading/trailing blank lines

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every rule to a raw model reply.
pub fn clean_reply(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fence(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer fence ────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode ─────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}
