//! Roadmap Extraction Module
//!
//! Builds the ordered application-procedure steps for an announcement:
//! 1. Structured roadmap column (array, or object holding an array)
//! 2. Plain-text roadmap column split on line breaks and bullets
//! 3. Section mining over the raw content HTML (handled by the caller
//!    through the `sections` module)
//!
//! Also owns single-step explosion: a lone step whose title is really a
//! comma/및/middle-dot joined list becomes multiple ordered steps.

use crate::sections::MAX_SECTION_ITEMS;
use crate::text::{split_text_items, strip_html};
use crate::types::{RoadmapStep, StructuredField};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Object keys that may hold the step array when the stored roadmap is an
/// object rather than a bare array.
const ROADMAP_ARRAY_KEYS: &[&str] = &["steps", "roadmap", "items", "process", "procedures"];

static LIST_LIKE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,，·ㆍ;/]|\s(?:및|그리고)\s").expect("list-like title regex"));
static REFERENCE_ASIDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*참조[^)]*\)").expect("reference aside regex"));
static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").expect("parenthetical regex"));
static ETC_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*등.*$").expect("etc suffix regex"));
static STEP_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:,|，|·|ㆍ|;|/|및|그리고)\s*").expect("step separator regex"));

/// Find the first array value under any of the recognized keys.
pub fn array_from_object(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Vec<Value> {
    for key in keys {
        if let Some(Value::Array(items)) = map.get(*key) {
            if !items.is_empty() {
                return items.clone();
            }
        }
    }
    Vec::new()
}

/// Normalize the stored roadmap column into typed steps. Strings become
/// title-only steps; objects pull title/name/stepTitle/label and
/// description/desc/detail. Never errors; unusable input yields an empty
/// list.
pub fn normalize_roadmap(field: &StructuredField) -> Vec<RoadmapStep> {
    let items = match field {
        StructuredField::Array(items) => items.clone(),
        StructuredField::Object(map) => array_from_object(map, ROADMAP_ARRAY_KEYS),
        StructuredField::Text(text) => {
            return split_text_items(text)
                .into_iter()
                .enumerate()
                .map(|(index, title)| RoadmapStep::titled(index as u32 + 1, title))
                .collect();
        }
        StructuredField::Empty => return Vec::new(),
    };

    items
        .iter()
        .filter(|item| item.is_string() || item.is_object())
        .enumerate()
        .map(|(index, item)| normalize_step(item, index))
        .collect()
}

fn normalize_step(item: &Value, index: usize) -> RoadmapStep {
    let fallback_step = index as u32 + 1;
    match item {
        Value::String(title) => RoadmapStep::titled(fallback_step, title.clone()),
        Value::Object(obj) => {
            let title = first_string(obj, &["title", "name", "stepTitle", "label"])
                .unwrap_or_else(|| format!("단계 {fallback_step}"));
            let description = first_string(obj, &["description", "desc", "detail"]).unwrap_or_default();
            let step = obj
                .get("step")
                .and_then(value_as_u32)
                .unwrap_or(fallback_step);
            let estimated_days = obj.get("estimatedDays").and_then(value_as_u32);
            RoadmapStep {
                step,
                title,
                description,
                estimated_days,
            }
        }
        _ => RoadmapStep::titled(fallback_step, format!("단계 {fallback_step}")),
    }
}

fn first_string(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match obj.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => continue,
        }
    }
    None
}

fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Turn a list of step titles (mined from HTML sections) into steps.
pub fn steps_from_titles<I, S>(titles: I) -> Vec<RoadmapStep>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    titles
        .into_iter()
        .enumerate()
        .map(|(index, title)| RoadmapStep::titled(index as u32 + 1, title))
        .collect()
}

/// Explode a single list-like step into multiple steps.
///
/// Applies only when the roadmap is exactly one step whose title carries
/// list punctuation. Parenthetical "참조" asides and trailing "등..."
/// suffixes are stripped from each fragment. Returns the input unchanged
/// when fewer than two fragments survive.
pub fn expand_single_step(steps: Vec<RoadmapStep>) -> Vec<RoadmapStep> {
    if steps.len() != 1 {
        return renumber(steps);
    }
    let raw_title = strip_html(&steps[0].title);
    if raw_title.is_empty() || !LIST_LIKE_TITLE.is_match(&raw_title) {
        return renumber(steps);
    }

    // Footnote markers (※) start explanatory text, not steps
    let text = raw_title.split('※').next().unwrap_or("");
    let text = REFERENCE_ASIDE.replace_all(text, " ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return renumber(steps);
    }

    let parts: Vec<String> = STEP_SEPARATOR
        .split(&text)
        .map(|part| {
            let part = PARENTHETICAL.replace_all(part, " ");
            let part = ETC_SUFFIX.replace_all(&part, "");
            part.trim().to_string()
        })
        .filter(|part| !part.is_empty())
        .collect();

    if parts.len() <= 1 {
        return renumber(steps);
    }

    parts
        .into_iter()
        .take(MAX_SECTION_ITEMS)
        .enumerate()
        .map(|(index, title)| RoadmapStep::titled(index as u32 + 1, title))
        .collect()
}

/// Force step numbers to 1..N regardless of what the source claimed.
pub fn renumber(mut steps: Vec<RoadmapStep>) -> Vec<RoadmapStep> {
    for (index, step) in steps.iter_mut().enumerate() {
        step.step = index as u32 + 1;
    }
    steps
}
