//! Section Mining Module
//!
//! Shared heading-anchored extraction over announcement HTML, used by the
//! roadmap and document extractors:
//! - Locate a section heading (h1-h6/strong/b/p/th/td) matching a keyword set
//! - Harvest the nearest following <ul>/<ol> list items
//! - Fall back to the lines between the heading and the next heading
//! - Site-specific fallback for K-Startup's <p class="title"> markers
//!
//! Everything is capped at 12 items and returns an empty list rather than
//! erroring when nothing matches.

use crate::text::{decode_entities, split_text_items, strip_html};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// Hard cap on harvested section items.
pub const MAX_SECTION_ITEMS: usize = 12;

static LIST_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<\s*(?:ul|ol)[^>]*>(.*?)</\s*(?:ul|ol)\s*>").expect("list block regex"));
static NEXT_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)<\s*(?:h[1-6]|strong|b|th|td)\b[^>]*>|<\s*p\b[^>]*class=["'][^"']*(?:title|tit|sub|section)[^"']*["'][^>]*>"#,
    )
    .expect("next heading regex")
});
static ITEM_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+[.)]|[-•·*])\s*").expect("item marker regex"));
static KOREAN_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[가-힣][.)]\s").expect("korean marker regex"));
static SECTION_TITLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:제출|신청|구비|필수|필요|증빙)\s*서류").expect("section title regex"));
static PAGE_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\s*부").expect("page count regex"));
static TAG_TO_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag to line regex"));
static NEXT_TITLE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<\s*p[^>]*class=["']title["'][^>]*>"#).expect("title marker regex"));

/// A section keyword set plus its precompiled heading matcher.
pub struct SectionMatcher {
    keywords: Regex,
    heading: Regex,
}

impl SectionMatcher {
    fn new(keywords: &str) -> Self {
        let heading = format!(
            r"(?i)<\s*(?:h[1-6]|strong|b|p|th|td)[^>]*>[^<]*(?:{keywords})[^<]*</\s*(?:h[1-6]|strong|b|p|th|td)\s*>"
        );
        SectionMatcher {
            keywords: Regex::new(&format!("(?i){keywords}")).expect("section keywords regex"),
            heading: Regex::new(&heading).expect("section heading regex"),
        }
    }
}

/// Roadmap-style section headings.
pub static ROADMAP_SECTIONS: Lazy<SectionMatcher> = Lazy::new(|| {
    SectionMatcher::new(r"로드맵|신청\s*절차|선정\s*절차|평가\s*절차|진행\s*절차|진행\s*프로세스|프로세스")
});

/// Document-checklist section headings.
pub static DOCUMENT_SECTIONS: Lazy<SectionMatcher> =
    Lazy::new(|| SectionMatcher::new(r"필요\s*서류|제출\s*서류|구비\s*서류|증빙\s*서류|신청\s*서류"));

/// Strip a list-item line of its enumeration markers.
pub fn clean_list_item_line(line: &str) -> String {
    let cleaned = ITEM_MARKER.replace(line.trim(), "");
    KOREAN_MARKER.replace(&cleaned, "").trim().to_string()
}

/// Lines that merely repeat a section title ("제출서류") rather than
/// naming an item. Lines mentioning copy counts ("3부") are real items.
pub fn is_section_title_line(line: &str) -> bool {
    SECTION_TITLE_LINE.is_match(line) && !PAGE_COUNT.is_match(line)
}

/// Pull the items out of one HTML section: <li> elements first, bullet/
/// line-break separated text second.
pub fn extract_list_items(section_html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(section_html);
    let mut items = Vec::new();
    if let Ok(selector) = Selector::parse("li") {
        for element in fragment.select(&selector) {
            let raw = element.text().collect::<String>();
            let cleaned = clean_list_item_line(&strip_html(&raw));
            if !cleaned.is_empty() && !is_section_title_line(&cleaned) {
                items.push(cleaned);
            }
            if items.len() >= MAX_SECTION_ITEMS {
                break;
            }
        }
    }
    if !items.is_empty() {
        return items;
    }

    // No list markup: treat each tag boundary as a line break
    let lined = TAG_TO_LINE.replace_all(section_html, "\n");
    split_text_items(&lined)
        .iter()
        .map(|line| clean_list_item_line(line))
        .filter(|line| !line.is_empty() && !is_section_title_line(line))
        .take(MAX_SECTION_ITEMS)
        .collect()
}

/// Find a matching section heading in the raw HTML and harvest its items:
/// the nearest following list, else the block up to the next heading,
/// else heading-anchored lines in the tag-separated text.
pub fn extract_section_items(raw: &str, matcher: &SectionMatcher) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let html = decode_entities(raw);

    if let Some(heading) = matcher.heading.find(&html) {
        let tail = &html[heading.end()..];
        if let Some(caps) = LIST_BLOCK.captures(tail) {
            let items = extract_list_items(&caps[1]);
            if !items.is_empty() {
                return items;
            }
        }
        let section = match NEXT_HEADING.find(tail) {
            Some(next) => &tail[..next.start()],
            None => tail,
        };
        let items = extract_list_items(section);
        if !items.is_empty() {
            return items;
        }
    }

    // No heading element: fall back to the text with tags as line breaks
    let lined = TAG_TO_LINE.replace_all(&html, "\n");
    let lines: Vec<String> = lined
        .split('\n')
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect();
    let start = match lines.iter().position(|line| matcher.keywords.is_match(line)) {
        Some(index) => index,
        None => return Vec::new(),
    };
    lines[start + 1..]
        .iter()
        .map(|line| clean_list_item_line(line))
        .filter(|line| {
            !line.is_empty() && !matcher.keywords.is_match(line) && !is_section_title_line(line)
        })
        .take(MAX_SECTION_ITEMS)
        .collect()
}

/// K-Startup detail pages label sections with bare `<p class="title">`
/// markers instead of headings; harvest list items between two markers.
pub fn extract_marker_section_items(html: &str, section_title: &str) -> Vec<String> {
    let decoded = decode_entities(html);
    let marker = match Regex::new(&format!(
        r#"(?i)<\s*p[^>]*class=["']title["'][^>]*>\s*{}\s*</\s*p\s*>"#,
        regex::escape(section_title)
    )) {
        Ok(marker) => marker,
        Err(_) => return Vec::new(),
    };
    let found = match marker.find(&decoded) {
        Some(found) => found,
        None => return Vec::new(),
    };
    let tail = &decoded[found.end()..];
    let section = match NEXT_TITLE_MARKER.find(tail) {
        Some(next) => &tail[..next.start()],
        None => tail,
    };
    extract_list_items(section)
        .into_iter()
        .map(|item| item.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|item| !item.is_empty())
        .take(MAX_SECTION_ITEMS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_list_item_line() {
        assert_eq!(clean_list_item_line("1. 서류 접수"), "서류 접수");
        assert_eq!(clean_list_item_line("- 사업계획서"), "사업계획서");
        assert_eq!(clean_list_item_line("가. 신청서 제출"), "신청서 제출");
    }

    #[test]
    fn test_section_title_line_detection() {
        assert!(is_section_title_line("제출서류"));
        assert!(is_section_title_line("필요 서류 안내"));
        assert!(!is_section_title_line("사업계획서 3부"));
    }

    #[test]
    fn test_extract_items_from_list() {
        let html = r#"<h3>신청절차</h3><ul><li>서류 접수</li><li>발표 평가</li><li>최종 선정</li></ul>"#;
        let items = extract_section_items(html, &ROADMAP_SECTIONS);
        assert_eq!(items, vec!["서류 접수", "발표 평가", "최종 선정"]);
    }

    #[test]
    fn test_extract_items_stops_at_next_heading() {
        let html = r#"<strong>제출서류</strong><p>사업계획서 1부</p><p>주민등록등본 1부</p><strong>문의처</strong><p>02-000-0000</p>"#;
        let items = extract_section_items(html, &DOCUMENT_SECTIONS);
        assert_eq!(items, vec!["사업계획서 1부", "주민등록등본 1부"]);
    }

    #[test]
    fn test_extract_items_without_heading_element() {
        let html = "<div>선정절차</div><div>서류 심사</div><div>대면 평가</div>";
        let items = extract_section_items(html, &ROADMAP_SECTIONS);
        assert_eq!(items, vec!["서류 심사", "대면 평가"]);
    }

    #[test]
    fn test_extract_items_caps_at_twelve() {
        let lis: String = (1..=20).map(|i| format!("<li>단계 {i}</li>")).collect();
        let html = format!("<h4>진행절차</h4><ul>{lis}</ul>");
        assert_eq!(extract_section_items(&html, &ROADMAP_SECTIONS).len(), MAX_SECTION_ITEMS);
    }

    #[test]
    fn test_no_section_yields_empty() {
        assert!(extract_section_items("<p>본문에는 절차 안내가 없습니다</p>", &DOCUMENT_SECTIONS).is_empty());
        assert!(extract_section_items("", &ROADMAP_SECTIONS).is_empty());
    }

    #[test]
    fn test_marker_section_items() {
        let html = r#"
            <p class="title">선정절차</p>
            <ul><li>서류 평가</li><li>발표 평가</li></ul>
            <p class="title">제출서류</p>
            <ul><li>사업계획서</li></ul>
        "#;
        assert_eq!(extract_marker_section_items(html, "선정절차"), vec!["서류 평가", "발표 평가"]);
        assert_eq!(extract_marker_section_items(html, "제출서류"), vec!["사업계획서"]);
    }
}
