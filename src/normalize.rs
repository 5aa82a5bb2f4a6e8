//! Text normalization for labels and descriptions.
//!
//! DBpedia Lookup highlights matches with `<B>…</B>` and abstracts sometimes
//! carry stray HTML. Everything shown to callers passes through [`normalize`]
//! so local and remote text render the same way.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Marker that replaces bold markup.
pub const EMPHASIS: &str = "**";

static RE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*/?\s*(?:b|strong)\s*>").unwrap());

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").unwrap());

static RE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip markup from free text.
///
/// Bold tags become [`EMPHASIS`], every other tag is removed, leftover angle
/// brackets from malformed fragments are dropped, whitespace runs collapse to
/// a single space and the ends are trimmed. `normalize(normalize(x)) ==
/// normalize(x)` for every input.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = RE_BOLD.replace_all(text, EMPHASIS);
    let text = RE_TAG.replace_all(&text, " ");
    // Brackets go before composing so a removed `<` cannot leave a combining
    // mark that only the next pass would compose.
    let text: String = text
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .nfc()
        .collect();
    RE_SPACE.replace_all(&text, " ").trim().to_string()
}

/// Normalize an optional field; text that normalizes to nothing becomes `None`.
pub fn normalize_opt(text: Option<&str>) -> Option<String> {
    text.map(normalize).filter(|t| !t.is_empty())
}

/// Truncate to at most `max` characters, appending `...` when anything was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
