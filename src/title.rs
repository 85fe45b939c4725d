//! Title Sanitization Module
//!
//! Cleans scraped announcement titles:
//! - Strips countdown markers ("D-3"), deadline phrases, view counters
//! - Truncates to the semantically meaningful announcement phrase
//! - Collapses doubled-title scraping artifacts
//!
//! Also hosts the title-adjacent helpers: agency fallback extraction,
//! source platform labels, and the normalized title key used by the
//! deduplicator.

use crate::text::{collapse_whitespace, decode_entities, strip_html};
use once_cell::sync::Lazy;
use regex::Regex;

static COUNTDOWN_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[가-힣A-Za-z]*\s*D-\d+\b").expect("countdown regex"));
static DEADLINE_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"마감일자?\s*\d{4}[-.]\d{2}[-.]\d{2}").expect("deadline phrase regex"));
static VIEW_COUNTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b조회\s*[\d,]+").expect("view counter regex"));
static VIEW_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b조회\b.*$").expect("view tail regex"));
static BARE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}[-.]\d{2}[-.]\d{2}").expect("bare date regex"));
static ANNOUNCEMENT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?(?:공고|모집|안내|선정))").expect("announcement suffix regex"));
static SUPPORT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?지원(?:사업)?)").expect("support suffix regex"));
static LEADING_BRACKET_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:\[[^\]]+\]|\([^)]+\)|【[^】]+】|「[^」]+」)\s*)+").expect("bracket prefix regex")
});
static NEW_BADGE_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:새로운게시글|새\s*글|신규\s*게시글|신규\s*글|NEW)\s*$").expect("new badge regex")
});
static LEADING_BRACKET_AGENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\[([^\]]+)\]|\(([^)]+)\)|【([^】]+)】|「([^」]+)」)").expect("bracket agency regex")
});
static SUMMARY_AGENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\]\s*([^|]+)\s*\|").expect("summary agency regex"));
static TITLE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)title\s*=\s*["']([^"']+)["']"#).expect("title attr regex"));

/// Sanitize a raw announcement title.
///
/// After noise removal the shortest semantically-terminated prefix wins:
/// first an announcement-type suffix (공고/모집/안내/선정), then a
/// "...지원(사업)" phrase, then the doubled-title check, then the cleaned
/// string unchanged.
pub fn sanitize_title(raw: &str) -> String {
    let cleaned = strip_html(raw);
    if cleaned.is_empty() {
        return String::new();
    }

    let mut cleaned = collapse_whitespace(&cleaned);
    cleaned = COUNTDOWN_TOKEN.replace_all(&cleaned, "").into_owned();
    cleaned = DEADLINE_PHRASE.replace_all(&cleaned, "").into_owned();
    cleaned = VIEW_COUNTER.replace_all(&cleaned, "").into_owned();
    cleaned = VIEW_TAIL.replace_all(&cleaned, "").into_owned();
    cleaned = BARE_DATE.replace_all(&cleaned, "").into_owned();
    let cleaned = collapse_whitespace(&cleaned);

    if let Some(caps) = ANNOUNCEMENT_SUFFIX.captures(&cleaned) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = SUPPORT_SUFFIX.captures(&cleaned) {
        return caps[1].trim().to_string();
    }

    // Doubled-title scraping artifact: "S + S" collapses to "S"
    let chars: Vec<char> = cleaned.chars().collect();
    let half = chars.len() / 2;
    if half > 10 && chars[..half] == chars[half..] {
        let first: String = chars[..half].iter().collect();
        return first.trim().to_string();
    }

    cleaned
}

/// Title cleaned for use as a search term: sanitized, leading bracketed
/// prefixes and NEW badges removed.
pub fn clean_search_title(title: &str) -> String {
    let cleaned = sanitize_title(title);
    let cleaned = LEADING_BRACKET_PREFIX.replace(&cleaned, "").into_owned();
    let cleaned = NEW_BADGE_TAIL.replace(&cleaned, "").into_owned();
    collapse_whitespace(&cleaned)
}

/// Normalized key used when grouping records that refer to the same
/// announcement: sanitized title, lowercased, whitespace-folded.
pub fn normalize_title_key(title: &str) -> String {
    collapse_whitespace(&sanitize_title(title).to_lowercase())
}

/// Some rows store the title as an HTML fragment whose `title="..."`
/// attribute carries the actual text. Prefer that attribute when present.
pub fn extract_title_from_html(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let decoded = decode_entities(text);
    if let Some(caps) = TITLE_ATTR.captures(&decoded) {
        let candidate = strip_html(&caps[1]);
        if !candidate.is_empty() {
            return Some(candidate);
        }
    }
    let stripped = strip_html(&decoded);
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Derive an agency name when the record lacks one: leading bracketed
/// token in the title, else the "] 기관명 |" pattern in the summary.
pub fn extract_agency_fallback(title: &str, summary: &str) -> Option<String> {
    if let Some(caps) = LEADING_BRACKET_AGENCY.captures(title.trim()) {
        let agency = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4));
        if let Some(m) = agency {
            let trimmed = m.as_str().trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    if let Some(caps) = SUMMARY_AGENCY.captures(summary.trim()) {
        let trimmed = caps[1].trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

/// Map a URL host to its display platform label.
pub fn infer_source_platform_from_url(raw_url: &str) -> Option<&'static str> {
    let url = raw_url.to_lowercase();
    if url.contains("k-startup.go.kr") {
        Some("K-Startup")
    } else if url.contains("bizinfo.go.kr") {
        Some("기업마당")
    } else if url.contains("smtech.go.kr") {
        Some("SMTECH")
    } else if url.contains("semas.or.kr") || url.contains("sbiz.or.kr") {
        Some("소상공인마당")
    } else if url.contains("gov24.go.kr") || url.contains("gov.kr") {
        Some("정부24")
    } else {
        None
    }
}

/// Normalize a stored source_site label to its display form.
pub fn normalize_source_label(source: &str) -> Option<String> {
    if source.trim().is_empty() {
        return None;
    }
    let upper = source.to_uppercase();
    let label = if upper == "K-STARTUP" || upper == "KSTARTUP" {
        "K-Startup"
    } else if upper == "BIZINFO" || source == "기업마당" {
        "기업마당"
    } else if upper == "SMTECH" {
        "SMTECH"
    } else if upper.contains("SEMAS") || upper.contains("SBIZ") {
        "소상공인마당"
    } else if upper == "GOV24_API" || upper == "GOV24" {
        "정부24"
    } else {
        return Some(source.to_string());
    };
    Some(label.to_string())
}
