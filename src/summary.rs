//! Summary Extraction Module
//!
//! Derives a short display summary for an announcement through a
//! prioritized fallback chain, first success wins:
//! 1. The provided summary, when long enough and not generic boilerplate
//! 2. A "모집계획 ... 공고합니다" plan-announcement sentence from the content
//! 3. Up to three keyword-bearing sentences from the content
//! 4. The first one or two non-boilerplate sentences
//!
//! Every strategy is total; the chain as a whole returns an empty string
//! only when nothing usable exists anywhere.

use crate::text::{collapse_whitespace, strip_html};
use once_cell::sync::Lazy;
use regex::Regex;

static NOISE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(새로운게시글|새\s*글|신규\s*게시글|NEW)").expect("summary noise regex")
});
static GENERIC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(요약\s*정보\s*없음|요약\s*정보가\s*없습니다|상세\s*내용\s*참조|내용\s*참조|홈페이지\s*참조|공고문\s*참조|미정|해당\s*없음)")
        .expect("generic summary regex")
});
static META_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\|\s*(?:마감|마감일|마감일자|조회|접수|등록|기간|공고일)").expect("meta summary regex")
});
static SKIP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(공고문\s*참조|홈페이지\s*참조|자세한\s*내용|자세한\s*사항|상세\s*내용|본문\s*참조)")
        .expect("skip sentence regex")
});
static PLAN_ANNOUNCEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([^.!?]*(?:모집계획|모집\s*공고)[^.!?]*공고합니다\.?)").expect("plan announcement regex")
});
static CONNECTIVE_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"다음과\s*같이\s*").expect("connective regex"));
static ANNOUNCEMENT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"공고\s*제?\s*\d{4}[-.]\d+\s*호?").expect("announcement number regex"));
static SENTENCE_FINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([.!?]|다\.|니다\.|합니다\.|됩니다\.|있습니다\.)\s+").expect("sentence final regex")
});

const SUMMARY_KEYWORDS: &[&str] = &[
    "모집", "지원", "대상", "혜택", "자금", "기간", "신청", "선정", "평가", "프로그램", "패키지",
    "교육", "멘토링", "사업화",
];

const MIN_SENTENCE_LEN: usize = 10;
const MAX_SENTENCE_LEN: usize = 220;

/// Strip HTML and noise badges from a candidate summary.
pub fn clean_summary_text(text: &str) -> String {
    let cleaned = strip_html(text);
    let cleaned = NOISE_PATTERN.replace_all(&cleaned, " ");
    collapse_whitespace(&cleaned)
}

/// True when the summary carries no real information: "요약정보 없음"
/// placeholders, or short metadata rows like "마감일 | 조회 | ...".
pub fn is_generic_summary(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let len = text.chars().count();
    if GENERIC_PATTERN.is_match(text) && len <= 50 {
        return true;
    }
    if META_PATTERN.is_match(text) && len <= 120 {
        return true;
    }
    false
}

/// Extract a summary: the provided one when usable, otherwise mined from
/// the raw content. Always whitespace-normalized and noise-stripped.
pub fn extract_summary(provided: Option<&str>, raw_content: Option<&str>, title: &str) -> String {
    if let Some(provided) = provided {
        let cleaned = clean_summary_text(provided);
        if cleaned.chars().count() > 10 && !is_generic_summary(&cleaned) {
            return cleaned;
        }
    }
    let content = match raw_content {
        Some(content) => content,
        None => return String::new(),
    };

    let text = prepare_content_text(content, title);
    if text.is_empty() {
        return String::new();
    }

    let strategies: &[fn(&str) -> Option<String>] = &[
        plan_announcement_sentence,
        keyword_sentences,
        leading_sentences,
    ];
    for strategy in strategies {
        if let Some(summary) = strategy(&text) {
            return summary;
        }
    }
    String::new()
}

fn prepare_content_text(raw_content: &str, title: &str) -> String {
    let mut text = strip_html(raw_content);
    if !title.is_empty() {
        text = text.replacen(title, " ", 1);
    }
    let text = ANNOUNCEMENT_NUMBER.replace_all(&text, " ");
    let text = NOISE_PATTERN.replace_all(&text, " ");
    collapse_whitespace(&text)
}

/// Strategy 1: the formal "~을 다음과 같이 공고합니다" sentence, with the
/// connective phrase dropped.
fn plan_announcement_sentence(text: &str) -> Option<String> {
    let caps = PLAN_ANNOUNCEMENT.captures(text)?;
    let sentence = CONNECTIVE_PHRASE.replace_all(&caps[1], "");
    let cleaned = clean_summary_text(&sentence);
    if cleaned.chars().count() > 20 {
        Some(cleaned)
    } else {
        None
    }
}

/// Strategy 2: up to three sentences inside the length window that carry
/// at least one domain keyword.
fn keyword_sentences(text: &str) -> Option<String> {
    let mut selected = Vec::new();
    for sentence in split_sentences(text) {
        if SKIP_PATTERN.is_match(&sentence) {
            continue;
        }
        let len = sentence.chars().count();
        if len < MIN_SENTENCE_LEN || len > MAX_SENTENCE_LEN {
            continue;
        }
        if SUMMARY_KEYWORDS.iter().any(|kw| sentence.contains(kw)) {
            selected.push(sentence);
        }
        if selected.len() >= 3 {
            break;
        }
    }
    if selected.is_empty() {
        None
    } else {
        Some(clean_summary_text(&selected.join(" ")))
    }
}

/// Strategy 3: first one or two non-boilerplate sentences, keywords or not.
fn leading_sentences(text: &str) -> Option<String> {
    let mut selected = Vec::new();
    for sentence in split_sentences(text) {
        if SKIP_PATTERN.is_match(&sentence) {
            continue;
        }
        if sentence.chars().count() < MIN_SENTENCE_LEN {
            continue;
        }
        selected.push(sentence);
        if selected.len() >= 2 {
            break;
        }
    }
    if selected.is_empty() {
        None
    } else {
        Some(clean_summary_text(&selected.join(" ")))
    }
}

/// Segment text on sentence-final punctuation and the common Korean
/// sentence-final endings.
pub fn split_sentences(text: &str) -> Vec<String> {
    let marked = SENTENCE_FINAL.replace_all(text, "$1\n");
    marked
        .split('\n')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
