//! HTTP API Module
//!
//! Serves `GET /api/policies`: the full normalized listing in a
//! `{success, data, count, error}` envelope. A fresh response-cache hit
//! returns the stored body byte for byte, skipping the store and every
//! enrichment fetch. Cache headers ride on success and error responses
//! alike so edge caches absorb repeat traffic either way.

use crate::cache::CacheService;
use crate::dedup::dedupe_kstartup;
use crate::fetch::Fetcher;
use crate::mapper::map_record;
use crate::orchestrator::enrich_policies;
use crate::store::PolicyStore;
use crate::types::{PolicyListResponse, RawPolicyRecord};
use anyhow::Result;
use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use std::sync::Arc;

const CACHE_CONTROL_VALUE: &str = "public, s-maxage=7200, stale-while-revalidate=3600";
const CDN_CACHE_CONTROL_VALUE: &str = "public, max-age=7200";

pub struct AppState {
    pub store: Box<dyn PolicyStore>,
    pub cache: CacheService,
    pub fetcher: Fetcher,
}

impl AppState {
    pub fn new(store: Box<dyn PolicyStore>, cache: CacheService, fetcher: Fetcher) -> Self {
        AppState { store, cache, fetcher }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/policies", get(get_policies))
        .with_state(state)
}

fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, CACHE_CONTROL_VALUE),
            (HeaderName::from_static("cdn-cache-control"), CDN_CACHE_CONTROL_VALUE),
        ],
        body,
    )
        .into_response()
}

fn error_body(message: &str) -> String {
    serde_json::to_string(&PolicyListResponse {
        success: false,
        data: vec![],
        count: 0,
        error: Some(message.to_string()),
    })
    .unwrap_or_else(|_| format!("{{\"success\":false,\"error\":\"{message}\"}}"))
}

/// Rows planted by integration tests of the scraping side.
fn is_test_record(record: &RawPolicyRecord) -> bool {
    let source = record.source_site.as_deref().unwrap_or("").to_uppercase();
    let title = record.title.as_deref().unwrap_or("").to_lowercase();
    let link = record.source_url().unwrap_or("").to_lowercase();
    source == "TEST" || title.contains("rls 테스트") || link.contains("test.com")
}

/// K-Startup rows scraped off an empty search-result page.
fn is_invalid_kstartup(record: &RawPolicyRecord) -> bool {
    let url = record.source_url().unwrap_or("").to_lowercase();
    let source = record.source_site.as_deref().unwrap_or("").to_uppercase();
    if !url.contains("k-startup.go.kr") && !source.contains("K-STARTUP") {
        return false;
    }
    let hay = format!(
        "{} {} {}",
        record.title.as_deref().unwrap_or(""),
        record.content_summary.as_deref().unwrap_or(""),
        record.raw_content.as_deref().unwrap_or("")
    );
    ["해당자료 없음", "해당 자료 없음", "검색결과가 없습니다", "검색 결과가 없습니다"]
        .iter()
        .any(|marker| hay.contains(marker))
}

/// Build the full listing body: load, filter, map, enrich, dedupe,
/// serialize.
pub async fn build_listing_body(state: &AppState) -> Result<String> {
    let records = state.store.load_records()?;
    let filtered: Vec<RawPolicyRecord> = records
        .into_iter()
        .filter(|record| !is_test_record(record) && !is_invalid_kstartup(record))
        .collect();

    let now = Utc::now();
    let policies = filtered.iter().map(|record| map_record(record, now)).collect();
    let enriched = enrich_policies(policies, &state.cache, &state.fetcher, now).await;
    let deduped = dedupe_kstartup(enriched);

    let body = serde_json::to_string(&PolicyListResponse {
        count: deduped.len(),
        success: true,
        data: deduped,
        error: None,
    })?;
    Ok(body)
}

async fn get_policies(State(state): State<Arc<AppState>>) -> Response {
    if let Some(body) = state.cache.cached_response() {
        tracing::debug!("serving cached listing response");
        return json_response(StatusCode::OK, body);
    }

    match build_listing_body(&state).await {
        Ok(body) => {
            state.cache.store_response(body.clone());
            json_response(StatusCode::OK, body)
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to build policy listing");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Failed to fetch policies from store"),
            )
        }
    }
}
