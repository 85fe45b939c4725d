//! Text Normalization Module
//!
//! Provides functions to:
//! - Decode numeric, hex, and named HTML/XML entities
//! - Strip HTML tags (including truncated/unterminated tags)
//! - Collapse whitespace and split bullet/line-break item lists

use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|\d+);").expect("numeric entity regex"));
static STYLE_SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<\s*(style|script)[^>]*>.*?</\s*(?:style|script)\s*>")
        .expect("style/script regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static TRUNCATED_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*$").expect("truncated tag regex"));
static ITEM_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\n\r\u{2022}\u{00B7}\-\*]+").expect("item separator regex"));

/// Decode HTML/XML entities, including numeric (`&#50;`), hex (`&#x32;`)
/// and the named entities that actually show up in scraped announcements.
pub fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&NBSP;", " ")
        .replace("&amp;", "&")
        .replace("&AMP;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&middot;", "·")
        .replace("&hellip;", "…");

    NUMERIC_ENTITY
        .replace_all(&named, |caps: &regex::Captures| {
            let body = &caps[1];
            let code = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                body.parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Strip HTML down to readable text. Entities are decoded both before and
/// after tag removal, since entities can hide inside removed attributes.
/// Never fails; empty input yields an empty string.
pub fn strip_html(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let decoded_first = decode_entities(text);
    let without_blocks = STYLE_SCRIPT_BLOCK.replace_all(&decoded_first, " ");
    let without_tags = TAG.replace_all(&without_blocks, " ");
    let without_truncated = TRUNCATED_TAG.replace_all(&without_tags, " ");
    let decoded_again = decode_entities(&without_truncated);
    collapse_whitespace(&decoded_again)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split plain text into list items on line breaks and bullet markers.
pub fn split_text_items(text: &str) -> Vec<String> {
    ITEM_SEPARATOR
        .split(text)
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}
