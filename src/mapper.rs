//! Record Mapping Module
//!
//! Assembles a `NormalizedPolicy` from a raw stored record by running the
//! whole extractor chain: title sanitization, summary fallback, period and
//! d-day derivation, roadmap/document normalization with raw-content
//! mining as backup, URL canonicalization, and criteria backfill.
//!
//! D-day resolution order: recomputed from the final period string, then
//! computed from the record's own text, then the stored value when it is
//! plausible, then the unknown sentinel.

use crate::documents::{documents_from_names, normalize_documents, refine_documents};
use crate::period::{
    compute_application_period, compute_dday, compute_dday_from_period,
    normalize_application_period_text, PeriodTexts, ALWAYS_OPEN,
};
use crate::resolver::canonicalize_url;
use crate::roadmap::{expand_single_step, normalize_roadmap, steps_from_titles};
use crate::sections::{extract_section_items, DOCUMENT_SECTIONS, ROADMAP_SECTIONS, MAX_SECTION_ITEMS};
use crate::summary::{clean_summary_text, extract_summary};
use crate::text::strip_html;
use crate::title::{
    extract_agency_fallback, extract_title_from_html, infer_source_platform_from_url,
    normalize_source_label, sanitize_title,
};
use crate::types::{NormalizedPolicy, PolicyCriteria, RawPolicyRecord, StructuredField, UNKNOWN_DDAY};
use chrono::{DateTime, Utc};

/// Stored d-day values outside this window are treated as garbage.
const STORED_DDAY_MIN: i64 = -30;
const STORED_DDAY_MAX: i64 = 370;

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn criteria_from_record(record: &RawPolicyRecord) -> PolicyCriteria {
    let stored = record.criteria.clone().unwrap_or_default();
    let regions = if stored.regions.is_empty() {
        non_empty(record.region.as_deref()).map(|r| vec![r]).unwrap_or_default()
    } else {
        stored.regions
    };
    let industries = if stored.industries.is_empty() {
        record
            .industry
            .as_deref()
            .map(|industry| {
                industry
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        stored.industries
    };
    let business_periods = if stored.business_periods.is_empty() {
        non_empty(record.biz_age.as_deref()).map(|b| vec![b]).unwrap_or_default()
    } else {
        stored.business_periods
    };
    PolicyCriteria {
        entity_types: stored.entity_types,
        age_groups: stored.age_groups,
        regions,
        industries,
        business_periods,
    }
}

/// Map one raw record to its normalized form. Pure over `now`; no network
/// access (enrichment fetches happen later in the orchestrator).
pub fn map_record(record: &RawPolicyRecord, now: DateTime<Utc>) -> NormalizedPolicy {
    let source_url = record.source_url();
    let source_platform = source_url
        .and_then(infer_source_platform_from_url)
        .map(str::to_string)
        .or_else(|| record.source_site.as_deref().and_then(normalize_source_label));

    let raw_title = record.title.as_deref().unwrap_or("");
    let title_text = extract_title_from_html(raw_title).unwrap_or_else(|| strip_html(raw_title));
    let cleaned_title = sanitize_title(&title_text);

    let cleaned_summary = clean_summary_text(record.content_summary.as_deref().unwrap_or(""));
    let summary = extract_summary(
        record.content_summary.as_deref(),
        record.raw_content.as_deref(),
        &cleaned_title,
    );

    let texts = PeriodTexts::from_record_fields(
        record.application_period.as_deref(),
        record.content_summary.as_deref(),
        record.raw_content.as_deref(),
    );
    let computed_period = compute_application_period(&texts, now);
    let computed_dday = compute_dday(&texts, now);
    let final_period = computed_period
        .as_deref()
        .and_then(|p| normalize_application_period_text(p, now))
        .or_else(|| normalize_application_period_text(&texts.application_period, now))
        .unwrap_or_else(|| ALWAYS_OPEN.to_string());
    let synced_dday = compute_dday_from_period(&final_period, now);

    let stored_dday = record
        .d_day
        .filter(|d| (STORED_DDAY_MIN..=STORED_DDAY_MAX).contains(d));
    let d_day = synced_dday
        .or(computed_dday)
        .or(stored_dday)
        .and_then(|d| i32::try_from(d).ok())
        .unwrap_or(UNKNOWN_DDAY);

    let roadmap = {
        let normalized = normalize_roadmap(&StructuredField::parse(record.roadmap.as_ref()));
        let fallback = if normalized.is_empty() {
            steps_from_titles(extract_section_items(
                record.raw_content.as_deref().unwrap_or(""),
                &ROADMAP_SECTIONS,
            ))
        } else {
            normalized
        };
        let mut expanded = expand_single_step(fallback);
        expanded.truncate(MAX_SECTION_ITEMS);
        expanded
    };

    let documents = {
        let normalized = normalize_documents(&StructuredField::parse(record.documents.as_ref()));
        let fallback = if normalized.is_empty() {
            documents_from_names(extract_section_items(
                record.raw_content.as_deref().unwrap_or(""),
                &DOCUMENT_SECTIONS,
            ))
        } else {
            normalized
        };
        refine_documents(fallback)
    };

    let agency = non_empty(record.agency.as_deref())
        .or_else(|| extract_agency_fallback(&cleaned_title, &cleaned_summary))
        .or_else(|| source_platform.clone())
        .unwrap_or_else(|| "정부기관".to_string());

    let url = source_url.and_then(|u| canonicalize_url(u, raw_title, record.source_site.as_deref()));

    NormalizedPolicy {
        id: record.id.to_string(),
        title: if cleaned_title.is_empty() {
            "제목 없음".to_string()
        } else {
            cleaned_title
        },
        summary,
        support_amount: non_empty(record.amount.as_deref()).unwrap_or_else(|| "미정".to_string()),
        d_day,
        application_period: Some(final_period),
        agency,
        source_platform,
        url,
        mobile_url: non_empty(record.mobile_url.as_deref()),
        detail_content: non_empty(record.raw_content.as_deref()),
        inquiry: non_empty(record.inquiry.as_deref()),
        application_method: non_empty(record.application_method.as_deref()),
        criteria: criteria_from_record(record),
        roadmap,
        documents,
    }
}
