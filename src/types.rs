use serde::{Deserialize, Serialize};
use serde_json::Value;

/// D-day value used on the wire when no deadline could be derived.
pub const UNKNOWN_DDAY: i32 = 999;

/// Raw announcement row as the scraper stored it. Read-only input;
/// every field is best-effort and may be missing or noisy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPolicyRecord {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source_site: Option<String>,
    #[serde(default)]
    pub content_summary: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub biz_age: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub raw_content: Option<String>,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub application_period: Option<String>,
    #[serde(default)]
    pub d_day: Option<i64>,
    #[serde(default)]
    pub mobile_url: Option<String>,
    #[serde(default)]
    pub inquiry: Option<String>,
    #[serde(default)]
    pub application_method: Option<String>,
    /// JSON array, JSON object, or plain text - shape unknown until parsed.
    #[serde(default)]
    pub roadmap: Option<Value>,
    #[serde(default)]
    pub documents: Option<Value>,
    #[serde(default)]
    pub criteria: Option<RawCriteria>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl RawPolicyRecord {
    /// Preferred source URL: `link` first, then `url`.
    pub fn source_url(&self) -> Option<&str> {
        self.link
            .as_deref()
            .or(self.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCriteria {
    #[serde(default, rename = "entityTypes")]
    pub entity_types: Vec<String>,
    #[serde(default, rename = "ageGroups")]
    pub age_groups: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default, rename = "businessPeriods")]
    pub business_periods: Vec<String>,
}

/// Untyped roadmap/documents column, classified once at the ingestion
/// boundary so extraction logic never branches on runtime JSON shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredField {
    Array(Vec<Value>),
    Object(serde_json::Map<String, Value>),
    Text(String),
    Empty,
}

impl StructuredField {
    /// Classify a stored column value. Strings holding valid JSON are
    /// parsed; strings that fail to parse stay plain text.
    pub fn parse(value: Option<&Value>) -> Self {
        let value = match value {
            Some(v) => v,
            None => return StructuredField::Empty,
        };
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    StructuredField::Empty
                } else {
                    StructuredField::Array(items.clone())
                }
            }
            Value::Object(map) => StructuredField::Object(map.clone()),
            Value::String(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return StructuredField::Empty;
                }
                match serde_json::from_str::<Value>(trimmed) {
                    Ok(Value::Array(items)) if !items.is_empty() => StructuredField::Array(items),
                    Ok(Value::Object(map)) => StructuredField::Object(map),
                    _ => StructuredField::Text(trimmed.to_string()),
                }
            }
            Value::Null => StructuredField::Empty,
            other => StructuredField::Text(other.to_string()),
        }
    }
}

/// One procedural step an applicant follows.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RoadmapStep {
    pub step: u32,
    pub title: String,
    pub description: String,
    #[serde(rename = "estimatedDays", skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<u32>,
}

impl RoadmapStep {
    pub fn titled(step: u32, title: impl Into<String>) -> Self {
        RoadmapStep {
            step,
            title: title.into(),
            description: String::new(),
            estimated_days: None,
        }
    }
}

/// Closed two-value document classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DocumentCategory {
    #[serde(rename = "필수")]
    Required,
    #[serde(rename = "우대/추가")]
    Optional,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DocumentItem {
    pub name: String,
    pub category: DocumentCategory,
    #[serde(rename = "whereToGet")]
    pub where_to_get: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DocumentItem {
    pub fn named(name: impl Into<String>, category: DocumentCategory) -> Self {
        DocumentItem {
            name: name.into(),
            category,
            where_to_get: String::new(),
            link: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PolicyCriteria {
    #[serde(rename = "entityTypes")]
    pub entity_types: Vec<String>,
    #[serde(rename = "ageGroups")]
    pub age_groups: Vec<String>,
    pub regions: Vec<String>,
    pub industries: Vec<String>,
    #[serde(rename = "businessPeriods")]
    pub business_periods: Vec<String>,
}

/// Pipeline output, computed fresh per request and never persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NormalizedPolicy {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(rename = "supportAmount")]
    pub support_amount: String,
    /// Signed days until deadline; `UNKNOWN_DDAY` when unparseable,
    /// negative when already past.
    #[serde(rename = "dDay")]
    pub d_day: i32,
    #[serde(rename = "applicationPeriod")]
    pub application_period: Option<String>,
    pub agency: String,
    #[serde(rename = "sourcePlatform", skip_serializing_if = "Option::is_none")]
    pub source_platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "mobileUrl", skip_serializing_if = "Option::is_none")]
    pub mobile_url: Option<String>,
    #[serde(rename = "detailContent", skip_serializing_if = "Option::is_none")]
    pub detail_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inquiry: Option<String>,
    #[serde(rename = "applicationMethod", skip_serializing_if = "Option::is_none")]
    pub application_method: Option<String>,
    pub criteria: PolicyCriteria,
    pub roadmap: Vec<RoadmapStep>,
    pub documents: Vec<DocumentItem>,
}

impl NormalizedPolicy {
    pub fn dday_known(&self) -> bool {
        self.d_day != UNKNOWN_DDAY
    }
}

/// Snapshot of everything a single upstream fetch could derive for a URL.
#[derive(Debug, Clone, Default)]
pub struct FetchMetaResult {
    pub d_day: Option<i64>,
    pub application_period: Option<String>,
    pub roadmap: Vec<RoadmapStep>,
    pub documents: Vec<DocumentItem>,
    pub resolved_url: Option<String>,
}

/// HTTP envelope for the listing endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyListResponse {
    pub success: bool,
    pub data: Vec<NormalizedPolicy>,
    pub count: usize,
    pub error: Option<String>,
}
