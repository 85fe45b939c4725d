//! Integration tests for the policy pipeline
//!
//! Drives raw records through mapping, enrichment selection, dedup, and
//! the listing endpoint body without touching the network.

use chrono::{DateTime, TimeZone, Utc};
use policy_pipeline::api::{build_listing_body, AppState};
use policy_pipeline::cache::{CacheService, Clock};
use policy_pipeline::dedup::dedupe_kstartup;
use policy_pipeline::fetch::{build_client, Fetcher};
use policy_pipeline::mapper::map_record;
use policy_pipeline::orchestrator::{enrich_policies, needs_enrichment};
use policy_pipeline::resolver::{build_view_url, canonicalize_url};
use policy_pipeline::store::{JsonFileStore, PolicyStore};
use policy_pipeline::types::{FetchMetaResult, PolicyListResponse, RawPolicyRecord, UNKNOWN_DDAY};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 2026-03-01 00:00 KST
fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 28, 15, 0, 0).unwrap()
}

fn record(id: i64, title: &str) -> RawPolicyRecord {
    RawPolicyRecord {
        id,
        title: Some(title.to_string()),
        ..Default::default()
    }
}

#[test]
fn doubled_title_collapses_through_mapping() {
    let base = "중장년 기술창업 아이디어 경진대회";
    let policy = map_record(&record(1, &format!("{base}{base}")), fixed_now());
    assert_eq!(policy.title, base);
}

#[test]
fn period_and_dday_stay_in_sync() {
    let policy = map_record(
        &RawPolicyRecord {
            application_period: Some("신청기간: 2026.03.01(일) ~ 2026.03.31(화)".to_string()),
            d_day: Some(3),
            ..record(2, "2026년 창업도약패키지 모집 공고")
        },
        fixed_now(),
    );
    assert_eq!(policy.application_period.as_deref(), Some("2026.03.01 ~ 2026.03.31"));
    // Recomputed from the final formatted string, not the stored column
    assert_eq!(policy.d_day, 31);
}

#[test]
fn always_open_records_carry_no_dday() {
    let policy = map_record(
        &RawPolicyRecord {
            application_period: Some("상시 모집".to_string()),
            ..record(3, "소상공인 스마트상점 지원사업 안내")
        },
        fixed_now(),
    );
    assert_eq!(policy.application_period.as_deref(), Some("상시"));
    assert_eq!(policy.d_day, UNKNOWN_DDAY);
}

#[test]
fn single_step_roadmap_explodes_to_ordered_steps() {
    let policy = map_record(
        &RawPolicyRecord {
            roadmap: Some(json!([{"step": 1, "title": "서류 접수, 현장 실사 그리고 최종 선정"}])),
            ..record(4, "2026년 재도전성공패키지 모집 공고")
        },
        fixed_now(),
    );
    let titles: Vec<&str> = policy.roadmap.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["서류 접수", "현장 실사", "최종 선정"]);
    let steps: Vec<u32> = policy.roadmap.iter().map(|s| s.step).collect();
    assert_eq!(steps, vec![1, 2, 3]);
}

#[test]
fn document_filter_drops_junk_and_keeps_real_names() {
    let policy = map_record(
        &RawPolicyRecord {
            documents: Some(json!(["123", "http://x.go.kr", "ab", "사업계획서"])),
            ..record(5, "청년창업사관학교 입교생 모집 공고")
        },
        fixed_now(),
    );
    let names: Vec<&str> = policy.documents.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["사업계획서"]);
}

#[test]
fn resolver_canonicalization_is_idempotent() {
    let title = "2026년 창업도약패키지 모집 공고";
    let first = canonicalize_url(
        "http://www.k-startup.go.kr/web/contents/bizpbanc-detail.do?pbancSn=174201",
        title,
        Some("K-STARTUP"),
    )
    .unwrap();
    let second = canonicalize_url(&first, title, Some("K-STARTUP")).unwrap();
    assert_eq!(first, build_view_url("174201"));
    assert_eq!(first, second);
}

#[test]
fn kstartup_duplicates_collapse_onto_view_url() {
    let title = "2026년 창업도약패키지 모집 공고";
    let search_row = map_record(
        &RawPolicyRecord {
            link: Some("https://www.k-startup.go.kr/web/contents/bizpbanc-ongoing.do".to_string()),
            source_site: Some("K-STARTUP".to_string()),
            d_day: Some(10),
            ..record(10, title)
        },
        fixed_now(),
    );
    let view_row = map_record(
        &RawPolicyRecord {
            link: Some(build_view_url("174201")),
            source_site: Some("K-STARTUP".to_string()),
            d_day: Some(10),
            ..record(11, title)
        },
        fixed_now(),
    );

    let deduped = dedupe_kstartup(vec![search_row, view_row]);
    assert_eq!(deduped.len(), 1);
    assert_eq!(deduped[0].url.as_deref(), Some(build_view_url("174201").as_str()));
}

#[tokio::test]
async fn enrichment_skips_records_that_already_have_data() {
    let policy = map_record(
        &RawPolicyRecord {
            link: Some(build_view_url("174201")),
            source_site: Some("K-STARTUP".to_string()),
            application_period: Some("2026.03.01 ~ 2026.03.31".to_string()),
            roadmap: Some(json!(["접수", "평가"])),
            documents: Some(json!(["사업계획서"])),
            ..record(20, "2026년 창업도약패키지 모집 공고")
        },
        fixed_now(),
    );
    assert!(!needs_enrichment(&policy));

    let cache = CacheService::new();
    let fetcher = Fetcher::new(build_client().unwrap());
    let enriched = enrich_policies(vec![policy.clone()], &cache, &fetcher, fixed_now()).await;
    assert_eq!(enriched[0].d_day, policy.d_day);
    assert_eq!(enriched[0].roadmap, policy.roadmap);
    assert_eq!(enriched[0].documents, policy.documents);
}

struct FrozenClock {
    now: Mutex<DateTime<Utc>>,
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[tokio::test]
async fn meta_cache_fetches_each_url_at_most_once() {
    let cache = CacheService::with_clock(Box::new(FrozenClock {
        now: Mutex::new(fixed_now()),
    }));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let calls = calls.clone();
        let result = cache
            .meta_for_url(&build_view_url("174201"), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(FetchMetaResult {
                    d_day: Some(31),
                    ..Default::default()
                })
            })
            .await;
        assert_eq!(result.unwrap().d_day, Some(31));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn listing_body_filters_test_rows_and_builds_envelope() {
    let path = std::env::temp_dir().join(format!("policy-listing-{}.json", std::process::id()));
    let rows = json!([
        {
            "id": 1,
            "title": "2026년 창업도약패키지 모집 공고",
            "application_period": "2026.03.01 ~ 2026.03.31",
            "roadmap": ["접수", "평가", "선정"],
            "documents": ["사업계획서"],
            "created_at": "2026-02-01T00:00:00Z"
        },
        {
            "id": 2,
            "title": "RLS 테스트 행",
            "source_site": "TEST",
            "created_at": "2026-02-02T00:00:00Z"
        }
    ]);
    std::fs::write(&path, serde_json::to_string(&rows).unwrap()).unwrap();

    let state = AppState::new(
        Box::new(JsonFileStore::new(&path)),
        CacheService::new(),
        Fetcher::new(build_client().unwrap()),
    );
    let body = build_listing_body(&state).await.unwrap();
    let parsed: PolicyListResponse = serde_json::from_str(&body).unwrap();

    assert!(parsed.success);
    assert_eq!(parsed.count, 1);
    assert_eq!(parsed.data.len(), 1);
    assert_eq!(parsed.data[0].title, "2026년 창업도약패키지 모집");
    assert!(parsed.error.is_none());

    std::fs::remove_file(&path).ok();
}

#[test]
fn store_returns_rows_most_recent_first() {
    let path = std::env::temp_dir().join(format!("policy-order-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"[
            {"id": 1, "created_at": "2026-01-01T00:00:00Z"},
            {"id": 2, "created_at": "2026-02-15T00:00:00Z"},
            {"id": 3, "created_at": "2026-02-01T00:00:00Z"}
        ]"#,
    )
    .unwrap();
    let records = JsonFileStore::new(&path).load_records().unwrap();
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
    std::fs::remove_file(&path).ok();
}
