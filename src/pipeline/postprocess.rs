//! Markdown cleanup applied to successful page transcriptions.
//!
//! Models intermittently wrap the whole page in a code fence or emit stray
//! control characters despite the prompt forbidding both. The rules here are
//! deliberately conservative: they only remove artifacts that are never valid
//! page content, and each rule is unit-tested in isolation.

use once_cell::sync::Lazy;
use regex::Regex;

static OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    // A fence that wraps the entire output, optionally language-tagged.
    Regex::new(r"(?s)\A```(?:markdown|md)?\s*\n(.*?)\n?```\s*\z").unwrap()
});

static INVISIBLE: Lazy<Regex> = Lazy::new(|| {
    // Zero-width spaces/joiners, BOM, soft hyphen.
    Regex::new("[\u{200B}\u{200C}\u{200D}\u{FEFF}\u{00AD}]").unwrap()
});

static TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());

static EXCESS_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalise a page transcription for persistence.
pub fn clean_markdown(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let text = strip_outer_fence(&text);
    let text = INVISIBLE.replace_all(&text, "");
    let text = TRAILING_WS.replace_all(&text, "");
    let text = EXCESS_BLANKS.replace_all(&text, "\n\n");

    let trimmed = text.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

/// Remove a code fence wrapping the entire output, leaving inner fences alone.
fn strip_outer_fence(text: &str) -> String {
    match OUTER_FENCE.captures(text.trim()) {
        Some(caps) => caps[1].to_string(),
        None => text.to_string(),
    }
}
