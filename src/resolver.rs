//! Source URL Resolution Module
//!
//! K-Startup announcement links arrive in three shapes: a canonical
//! detail URL carrying `pbancSn`, a JavaScript stub like `go_view(123)`,
//! or nothing usable at all. This module:
//! - Canonicalizes what can be canonicalized without network access
//! - Builds a prioritized list of search terms from the title
//! - Scores listing-page entries against those terms (pure function)
//! - Drives the disambiguation crawl: search listing pages candidate by
//!   candidate until one entry matches the title
//!
//! Resolution of an already-canonical URL is a no-op, so repeated
//! resolution is safe.

use crate::text::{collapse_whitespace, strip_html};
use crate::title::clean_search_title;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

/// Canonical K-Startup announcement listing endpoint.
pub const KSTARTUP_BASE: &str = "https://www.k-startup.go.kr/web/contents/bizpbanc-ongoing.do";

/// How many search candidates the crawl will actually try.
const MAX_CRAWL_CANDIDATES: usize = 4;

/// How many listing entries are considered per page.
const MAX_LISTING_ENTRIES: usize = 50;

static GO_VIEW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)go_view(?:_blank)?\((\d+)\)").expect("go_view regex"));
static PBANC_SN: Lazy<Regex> = Lazy::new(|| Regex::new(r"pbancSn=(\d+)").expect("pbancSn regex"));
static PBANC_SN_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[?&]pbancSn=(\d+)").expect("pbancSn param regex"));
static SCH_STR_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]schStr=([^&]+)").expect("schStr param regex"));
static PAREN_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").expect("paren group regex"));
static BRACKET_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("bracket group regex"));
static QUOTE_MARKS: Lazy<Regex> = Lazy::new(|| Regex::new("[「」『』【】<>]").expect("quote marks regex"));
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[~!@#$%^&*_=+|;:'",.?/\\-]"#).expect("punctuation regex"));
static YEAR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b20\d{2}\s*년도?\b").expect("year token regex"));
static ANNOUNCEMENT_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:모집공고|모집\s*공고|모집|공고|시행계획|사업공고)\b").expect("announcement word regex")
});
static PRIORITY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"사업|패키지|프로그램|바우처|아카데미|펀드|창업|재창업|수출").expect("priority token regex")
});
static NON_MATCH_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9a-z가-힣]").expect("non-match char regex"));
static NON_TOKEN_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9a-z가-힣\s]").expect("non-token char regex"));
static TITLE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)title=["']([^"']+)["']"#).expect("title attr regex"));
static TEXT_SNIPPET: Lazy<Regex> = Lazy::new(|| Regex::new(r">([^<]{6,})<").expect("text snippet regex"));
static PBANC_SN_LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"pbancsn=\d+").expect("pbancsn lower regex"));

const SEARCH_STOPWORDS: &[&str] = &[
    "공고", "모집", "안내", "사업", "지원", "대상", "신청", "접수", "예비", "년도", "년", "및", "관련", "운영",
];

/// Tunable acceptance threshold for the listing matcher. Containment and
/// the `min(2, candidate_len)` overlap rule accept outright; entries below
/// those still win when the best overlap reaches `min_token_overlap`.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    pub min_token_overlap: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig { min_token_overlap: 1 }
    }
}

/// Pick the shortest phrase that still identifies the program: a
/// priority-keyword token plus one companion token, else the first long
/// token plus a companion, else the first two tokens.
pub fn extract_core_search_phrase(text: &str) -> Option<String> {
    let cleaned = clean_search_title(text);
    let cleaned = PAREN_GROUP.replace_all(&cleaned, " ");
    let cleaned = BRACKET_GROUP.replace_all(&cleaned, " ");
    let cleaned = QUOTE_MARKS.replace_all(&cleaned, " ");
    let cleaned = PUNCTUATION.replace_all(&cleaned, " ");
    let normalized = collapse_whitespace(&cleaned);
    if normalized.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = normalized
        .split(' ')
        .filter(|t| !t.is_empty() && !SEARCH_STOPWORDS.contains(t))
        .collect();

    let companion = |primary: &str| {
        tokens
            .iter()
            .find(|t| **t != primary && t.chars().count() >= 2)
            .copied()
    };

    if let Some(priority) = tokens
        .iter()
        .find(|t| PRIORITY_TOKEN.is_match(t) && t.chars().count() >= 4)
    {
        return Some(match companion(priority) {
            Some(second) => format!("{priority} {second}"),
            None => priority.to_string(),
        });
    }

    if let Some(long) = tokens.iter().find(|t| t.chars().count() >= 4) {
        return Some(match companion(long) {
            Some(second) => format!("{long} {second}"),
            None => long.to_string(),
        });
    }

    let joined = tokens.iter().take(2).copied().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Prioritized, deduplicated search terms for a title: core phrase first,
/// then progressively less aggressive cleanups, then the existing search
/// term recovered from the URL.
pub fn build_search_candidates(title: &str, existing_search: Option<&str>) -> Vec<String> {
    let cleaned_title = clean_search_title(title);
    let cleaned_existing = clean_search_title(existing_search.unwrap_or(""));

    let without_paren = {
        let text = PAREN_GROUP.replace_all(&cleaned_title, " ");
        let text = BRACKET_GROUP.replace_all(&text, " ");
        collapse_whitespace(&text)
    };
    let stripped = {
        let text = YEAR_TOKEN.replace_all(&without_paren, " ");
        let text = ANNOUNCEMENT_WORD.replace_all(&text, " ");
        collapse_whitespace(&text)
    };

    let core_source = [&stripped, &without_paren, &cleaned_title, &cleaned_existing]
        .into_iter()
        .find(|s| !s.is_empty());
    let core = core_source.and_then(|s| extract_core_search_phrase(s));

    let mut candidates = Vec::new();
    let mut push = |candidate: String| {
        let trimmed = candidate.trim().to_string();
        if !trimmed.is_empty() && !candidates.contains(&trimmed) {
            candidates.push(trimmed);
        }
    };
    if let Some(core) = core {
        push(core);
    }
    push(stripped);
    push(without_paren);
    push(cleaned_existing);
    push(cleaned_title);
    candidates
}

pub fn is_kstartup_url(url: &str) -> bool {
    url.to_lowercase().contains("k-startup.go.kr")
}

/// A URL that already points at a single announcement rather than a
/// search listing.
pub fn is_kstartup_view_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("k-startup.go.kr")
        && (lower.contains("schm=view") || PBANC_SN_LOWER.is_match(&lower))
        && !lower.contains("schm=list")
}

/// Recover the `schStr` search term from an existing search URL,
/// percent-decoded with `+` as space.
pub fn extract_search_term(url: &str) -> Option<String> {
    if let Ok(parsed) = Url::parse(url) {
        for (key, value) in parsed.query_pairs() {
            if key == "schStr" {
                let trimmed = value.trim().to_string();
                return if trimmed.is_empty() { None } else { Some(trimmed) };
            }
        }
        return None;
    }
    SCH_STR_PARAM
        .captures(url)
        .map(|caps| caps[1].to_string())
        .filter(|term| !term.is_empty())
}

/// Listing/detail pages that link announcements through `go_view(123)`
/// JavaScript calls instead of real hrefs.
pub fn has_js_view_stub(html: &str) -> bool {
    GO_VIEW.is_match(html)
}

pub fn extract_pbanc_from_url(url: &str) -> Option<String> {
    PBANC_SN_PARAM.captures(url).map(|caps| caps[1].to_string())
}

pub fn build_view_url(pbanc_sn: &str) -> String {
    format!("{KSTARTUP_BASE}?schM=view&pbancSn={pbanc_sn}")
}

pub fn build_search_url(term: &str) -> String {
    Url::parse_with_params(KSTARTUP_BASE, &[("schM", "list"), ("schStr", term)])
        .map(|url| url.to_string())
        .unwrap_or_else(|_| format!("{KSTARTUP_BASE}?schM=list&schStr={term}"))
}

/// Canonicalize a K-Startup URL without network access. Non-K-Startup
/// URLs pass through untouched; canonical view URLs come out unchanged.
pub fn canonicalize_url(raw_url: &str, title: &str, source_site: Option<&str>) -> Option<String> {
    let mut url = raw_url.trim().to_string();
    if url.is_empty() {
        return None;
    }
    let is_kstartup = url.contains("k-startup.go.kr") || source_site == Some("K-STARTUP");
    if !is_kstartup {
        return Some(url);
    }

    if let Some(rest) = url.strip_prefix("http://") {
        url = format!("https://{rest}");
    }
    url = url.replace("/web/contents/bizpbanc-detail.do", "/web/contents/bizpbanc-ongoing.do");

    if let Some(caps) = GO_VIEW.captures(&url) {
        return Some(build_view_url(&caps[1]));
    }
    if let Some(caps) = PBANC_SN.captures(&url) {
        return Some(build_view_url(&caps[1]));
    }

    let existing = extract_search_term(&url);
    let candidates = build_search_candidates(title, existing.as_deref());
    match candidates.first() {
        Some(term) => Some(build_search_url(term)),
        None => Some(url),
    }
}

/// Case-folded, whitespace-free, alphanumeric+Hangul-only comparison form.
pub fn normalize_for_match(text: &str) -> String {
    let stripped = strip_html(text).to_lowercase();
    NON_MATCH_CHAR.replace_all(&stripped.replace(char::is_whitespace, ""), "").into_owned()
}

/// Comparison tokens of at least two characters.
pub fn tokenize_for_match(text: &str) -> Vec<String> {
    let stripped = strip_html(text).to_lowercase();
    let spaced = NON_TOKEN_CHAR.replace_all(&stripped, " ");
    spaced
        .split_whitespace()
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_string())
        .collect()
}

struct ListingEntry {
    id: String,
    offset: usize,
}

fn collect_listing_entries(html: &str) -> Vec<ListingEntry> {
    let mut entries: Vec<ListingEntry> = GO_VIEW
        .captures_iter(html)
        .take(MAX_LISTING_ENTRIES)
        .map(|caps| ListingEntry {
            id: caps[1].to_string(),
            offset: caps.get(0).map(|m| m.start()).unwrap_or(0),
        })
        .collect();
    if entries.is_empty() {
        entries = PBANC_SN
            .captures_iter(html)
            .take(MAX_LISTING_ENTRIES)
            .map(|caps| ListingEntry {
                id: caps[1].to_string(),
                offset: caps.get(0).map(|m| m.start()).unwrap_or(0),
            })
            .collect();
    }
    entries
}

fn entry_window(html: &str, offset: usize) -> &str {
    let mut end = (offset + 800).min(html.len());
    while end > offset && !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[offset..end]
}

/// Score a listing page against a record title and pick the matching
/// announcement id. Pure: no network, no clock.
///
/// Acceptance, in order: normalized containment either way; token overlap
/// reaching `min(2, candidate_len)`; a sole listing entry; the best-overlap
/// entry when its score reaches the configured floor.
pub fn find_pbanc_in_listing(html: &str, title: &str, config: MatchConfig) -> Option<String> {
    let entries = collect_listing_entries(html);
    if entries.is_empty() {
        return PBANC_SN.captures(html).map(|caps| caps[1].to_string());
    }

    let candidates = build_search_candidates(title, None);
    let normalized_candidates: Vec<String> = candidates
        .iter()
        .map(|c| normalize_for_match(c))
        .filter(|c| !c.is_empty())
        .collect();
    let token_candidates: Vec<Vec<String>> = candidates
        .iter()
        .map(|c| tokenize_for_match(c))
        .filter(|tokens| !tokens.is_empty())
        .collect();

    // Without a usable title, linking to an arbitrary first result would
    // be worse than leaving the search URL in place
    if normalized_candidates.is_empty() {
        return None;
    }

    let mut best_by_overlap: Option<(String, usize)> = None;

    for entry in &entries {
        let window = entry_window(html, entry.offset);
        let candidate_raw = TITLE_ATTR
            .captures(window)
            .map(|caps| caps[1].to_string())
            .or_else(|| TEXT_SNIPPET.captures(window).map(|caps| caps[1].to_string()));
        let candidate_raw = match candidate_raw {
            Some(raw) => raw,
            None => continue,
        };
        let candidate = normalize_for_match(&candidate_raw);
        if candidate.is_empty() {
            continue;
        }
        if normalized_candidates
            .iter()
            .any(|needle| candidate.contains(needle.as_str()) || needle.contains(candidate.as_str()))
        {
            return Some(entry.id.clone());
        }

        let candidate_tokens: std::collections::HashSet<String> =
            tokenize_for_match(&candidate_raw).into_iter().collect();
        let overlap = token_candidates
            .iter()
            .map(|tokens| tokens.iter().filter(|t| candidate_tokens.contains(*t)).count())
            .max()
            .unwrap_or(0);
        if token_candidates
            .iter()
            .any(|tokens| overlap >= 2.min(tokens.len()))
        {
            return Some(entry.id.clone());
        }
        match &best_by_overlap {
            Some((_, best)) if *best >= overlap => {}
            _ => best_by_overlap = Some((entry.id.clone(), overlap)),
        }
    }

    if entries.len() == 1 {
        return Some(entries[0].id.clone());
    }
    match best_by_overlap {
        Some((id, score)) if score >= config.min_token_overlap => Some(id),
        _ => None,
    }
}

/// Resolve a K-Startup URL all the way to a canonical view URL, crawling
/// search listings when the URL alone is not enough. Falls back to the
/// best search URL when no listing entry matches.
pub async fn resolve_detail_url(
    client: &reqwest::Client,
    raw_url: &str,
    title: &str,
    source_site: Option<&str>,
    config: MatchConfig,
) -> Option<String> {
    let mut url = raw_url.trim().to_string();
    if url.is_empty() {
        return None;
    }
    let is_kstartup = url.contains("k-startup.go.kr") || source_site == Some("K-STARTUP");
    if !is_kstartup {
        return Some(url);
    }

    if let Some(rest) = url.strip_prefix("http://") {
        url = format!("https://{rest}");
    }
    url = url.replace("/web/contents/bizpbanc-detail.do", "/web/contents/bizpbanc-ongoing.do");

    if let Some(caps) = GO_VIEW.captures(&url) {
        return Some(build_view_url(&caps[1]));
    }
    if let Some(caps) = PBANC_SN.captures(&url) {
        return Some(build_view_url(&caps[1]));
    }

    let existing = extract_search_term(&url);
    let candidates = build_search_candidates(title, existing.as_deref());
    let fallback = match candidates.first() {
        Some(term) => build_search_url(term),
        None => return Some(url),
    };

    for term in candidates.iter().take(MAX_CRAWL_CANDIDATES) {
        let search_url = build_search_url(term);
        let response = match client.get(&search_url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(term = %term, error = %err, "listing search failed");
                return Some(fallback);
            }
        };
        if !response.status().is_success() {
            continue;
        }
        let html = match response.text().await {
            Ok(html) => html,
            Err(_) => continue,
        };
        if let Some(id) = find_pbanc_in_listing(&html, title, config) {
            tracing::debug!(pbanc_sn = %id, term = %term, "resolved announcement id");
            return Some(build_view_url(&id));
        }
    }

    Some(fallback)
}
