//! Document Checklist Extraction Module
//!
//! Mirrors the roadmap extractor's fallback structure for the paperwork
//! checklist:
//! 1. Structured documents column (array, object with required/optional
//!    buckets, or a flat item list)
//! 2. Plain-text column split on line breaks and bullets
//! 3. Section mining over raw content (via the `sections` module, done by
//!    the caller)
//!
//! Every harvested name passes a filter/split refinement: junk lines are
//! dropped and comma-joined multi-document lines are split apart.

use crate::roadmap::array_from_object;
use crate::sections::{is_section_title_line, MAX_SECTION_ITEMS};
use crate::text::split_text_items;
use crate::types::{DocumentCategory, DocumentItem, StructuredField};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const REQUIRED_KEYS: &[&str] = &["required", "requiredDocs", "required_documents", "mandatory", "must"];
const OPTIONAL_KEYS: &[&str] = &["optional", "optionalDocs", "optional_documents", "recommended", "additional"];
const ITEM_KEYS: &[&str] = &["items", "documents", "documentList"];

static OPTIONAL_CATEGORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)우대|추가|선택|옵션|참고").expect("optional category regex"));
static PURE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("pure number regex"));
static PURE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://\S+$").expect("pure url regex"));
static META_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"압축파일|하여\s*제출|하시기\s*바랍니다|바랍니다\.?$|제출\s*방법|작성\s*요령|페이지\s*이내")
        .expect("meta line regex")
});
static DOC_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"서류|확인서|신청서|계획서|증명서|증빙|동의서|확약서|명세서|양식|서식|등록증|등본|사본|통장|원본|부본")
        .expect("document keyword regex")
});
static NAME_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:,|，|·|ㆍ)\s*|\s+및\s+").expect("name separator regex"));

/// Classify a category hint. Unknown or missing hints mean required.
pub fn classify_category(hint: Option<&str>) -> DocumentCategory {
    match hint {
        Some(raw) if OPTIONAL_CATEGORY.is_match(raw) => DocumentCategory::Optional,
        _ => DocumentCategory::Required,
    }
}

/// Normalize the stored documents column into typed items. Objects may
/// carry separate required/optional buckets; flat arrays and text default
/// to required.
pub fn normalize_documents(field: &StructuredField) -> Vec<DocumentItem> {
    match field {
        StructuredField::Array(items) => map_documents(items, DocumentCategory::Required),
        StructuredField::Text(text) => split_text_items(text)
            .into_iter()
            .map(|name| DocumentItem::named(name, DocumentCategory::Required))
            .collect(),
        StructuredField::Object(map) => {
            let required = array_from_object(map, REQUIRED_KEYS);
            let optional = array_from_object(map, OPTIONAL_KEYS);
            let mut merged = map_documents(&required, DocumentCategory::Required);
            merged.extend(map_documents(&optional, DocumentCategory::Optional));
            if !merged.is_empty() {
                return merged;
            }
            map_documents(&array_from_object(map, ITEM_KEYS), DocumentCategory::Required)
        }
        StructuredField::Empty => Vec::new(),
    }
}

fn map_documents(items: &[Value], default_category: DocumentCategory) -> Vec<DocumentItem> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) if !name.trim().is_empty() => {
                Some(DocumentItem::named(name.trim(), default_category))
            }
            Value::Object(obj) => {
                let name = ["name", "title", "document", "doc"]
                    .iter()
                    .find_map(|key| obj.get(*key).and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())?;
                let category = match obj.get("category").and_then(Value::as_str) {
                    Some(hint) => classify_category(Some(hint)),
                    None => default_category,
                };
                Some(DocumentItem {
                    name: name.to_string(),
                    category,
                    where_to_get: obj
                        .get("whereToGet")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    link: obj.get("link").and_then(Value::as_str).map(str::to_string),
                    description: obj.get("description").and_then(Value::as_str).map(str::to_string),
                })
            }
            _ => None,
        })
        .collect()
}

/// Turn section-mined item names into checklist entries, classifying each
/// by its own text.
pub fn documents_from_names<I, S>(names: I) -> Vec<DocumentItem>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| {
            let name = name.as_ref();
            DocumentItem::named(name, classify_category(Some(name)))
        })
        .collect()
}

fn is_junk_name(name: &str) -> bool {
    name.chars().count() < 3
        || PURE_NUMBER.is_match(name)
        || PURE_URL.is_match(name)
        || META_LINE.is_match(name)
        || is_section_title_line(name)
}

/// Split one line naming several documents into fragments, but only when
/// at least two fragments independently look like document names.
fn split_combined_name(name: &str) -> Vec<String> {
    let fragments: Vec<String> = NAME_SEPARATOR
        .split(name)
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();
    let keyword_hits = fragments.iter().filter(|part| DOC_KEYWORD.is_match(part)).count();
    if fragments.len() >= 2 && keyword_hits >= 2 {
        fragments
    } else {
        vec![name.to_string()]
    }
}

/// Filter/split refinement over a raw checklist: junk entries dropped,
/// combined lines split, exact-name repeats removed, capped at 12.
pub fn refine_documents(documents: Vec<DocumentItem>) -> Vec<DocumentItem> {
    let mut seen = std::collections::HashSet::new();
    let mut refined = Vec::new();
    for document in documents {
        for name in split_combined_name(document.name.trim()) {
            if is_junk_name(&name) {
                continue;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            refined.push(DocumentItem {
                name,
                category: document.category,
                where_to_get: document.where_to_get.clone(),
                link: document.link.clone(),
                description: document.description.clone(),
            });
            if refined.len() >= MAX_SECTION_ITEMS {
                return refined;
            }
        }
    }
    refined
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(value: Value) -> StructuredField {
        StructuredField::parse(Some(&value))
    }

    #[test]
    fn test_normalize_string_array() {
        let docs = normalize_documents(&field(json!(["사업계획서", "주민등록등본"])));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].category, DocumentCategory::Required);
    }

    #[test]
    fn test_normalize_required_optional_buckets() {
        let docs = normalize_documents(&field(json!({
            "required": ["사업계획서"],
            "optional": ["특허 등록증"]
        })));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].category, DocumentCategory::Required);
        assert_eq!(docs[1].category, DocumentCategory::Optional);
    }

    #[test]
    fn test_normalize_object_entries_with_category_hint() {
        let docs = normalize_documents(&field(json!([
            {"name": "사업자등록증", "whereToGet": "홈택스"},
            {"title": "추천서", "category": "우대 제출"}
        ])));
        assert_eq!(docs[0].where_to_get, "홈택스");
        assert_eq!(docs[1].category, DocumentCategory::Optional);
    }

    #[test]
    fn test_classify_category_keywords() {
        assert_eq!(classify_category(Some("우대")), DocumentCategory::Optional);
        assert_eq!(classify_category(Some("참고용")), DocumentCategory::Optional);
        assert_eq!(classify_category(Some("필수")), DocumentCategory::Required);
        assert_eq!(classify_category(None), DocumentCategory::Required);
    }

    #[test]
    fn test_refine_drops_junk_names() {
        let docs = documents_from_names(["123", "http://x.go.kr", "ab", "사업계획서"]);
        let refined = refine_documents(docs);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].name, "사업계획서");
    }

    #[test]
    fn test_refine_drops_instructional_lines() {
        let docs = documents_from_names(["압축파일로 제출", "신청서를 작성하여 제출", "법인 등기부등본"]);
        let refined = refine_documents(docs);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].name, "법인 등기부등본");
    }

    #[test]
    fn test_refine_splits_combined_names() {
        let docs = documents_from_names(["사업계획서, 주민등록등본 및 통장 사본"]);
        let refined = refine_documents(docs);
        let names: Vec<&str> = refined.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["사업계획서", "주민등록등본", "통장 사본"]);
    }

    #[test]
    fn test_refine_keeps_line_without_two_keyword_fragments() {
        // Only one fragment looks like a document name, so no split
        let docs = documents_from_names(["창업 3년 이내, 사업계획서 지참"]);
        let refined = refine_documents(docs);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].name, "창업 3년 이내, 사업계획서 지참");
    }

    #[test]
    fn test_refine_dedupes_and_caps() {
        let names: Vec<String> = (0..30)
            .map(|i| format!("증명서 {}", i % 20))
            .collect();
        let refined = refine_documents(documents_from_names(names.iter()));
        assert_eq!(refined.len(), MAX_SECTION_ITEMS);
    }
}
