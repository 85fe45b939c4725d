//! Enrichment Orchestration Module
//!
//! Runs the per-record enrichment pass over the mapped policies:
//! - `map_with_limit` is a fixed-size worker pool over an index queue;
//!   results come back in input order
//! - A policy is enriched only when it is missing everything (no roadmap,
//!   no documents, unknown d-day) or its URL is still an unresolved
//!   search URL - and only for known government hosts
//! - Fetch results flow through the per-URL cache; a fetched period
//!   always triggers a d-day recompute from the final string

use crate::cache::CacheService;
use crate::fetch::{should_fetch, Fetcher};
use crate::period::compute_dday_from_period;
use crate::roadmap::expand_single_step;
use crate::sections::MAX_SECTION_ITEMS;
use crate::types::{FetchMetaResult, NormalizedPolicy, UNKNOWN_DDAY};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

/// Worker-pool size for per-record enrichment.
pub const ENRICH_CONCURRENCY: usize = 5;

/// Map `items` through an async `mapper` with at most `limit` in flight.
/// Output order matches input order regardless of completion order.
pub async fn map_with_limit<T, R, F, Fut>(items: Vec<T>, limit: usize, mapper: F) -> Vec<R>
where
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = R>,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let queue: Mutex<VecDeque<(usize, T)>> = Mutex::new(items.into_iter().enumerate().collect());
    let queue = &queue;
    let mapper = &mapper;

    let workers = (0..limit.max(1).min(total)).map(|_| async move {
        let mut finished = Vec::new();
        loop {
            let next = queue.lock().expect("work queue lock").pop_front();
            let (index, item) = match next {
                Some(pair) => pair,
                None => break,
            };
            finished.push((index, mapper(item, index).await));
        }
        finished
    });

    let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
    for chunk in futures::future::join_all(workers).await {
        for (index, value) in chunk {
            results[index] = Some(value);
        }
    }
    results.into_iter().flatten().collect()
}

/// Whether a mapped policy still needs an upstream fetch.
pub fn needs_enrichment(policy: &NormalizedPolicy) -> bool {
    let missing_everything =
        policy.roadmap.is_empty() && policy.documents.is_empty() && policy.d_day == UNKNOWN_DDAY;
    let unresolved_search = policy
        .url
        .as_deref()
        .map(|url| url.contains("schM=list&schStr="))
        .unwrap_or(false);
    missing_everything || unresolved_search
}

/// Merge a fetch result into a policy. Known values are kept when the
/// fetch produced nothing for a field; the final period string always
/// wins the d-day computation.
pub fn apply_fetched(policy: &mut NormalizedPolicy, fetched: &FetchMetaResult, now: DateTime<Utc>) {
    if let Some(resolved) = &fetched.resolved_url {
        policy.url = Some(resolved.clone());
    }
    if let Some(d_day) = fetched.d_day {
        policy.d_day = i32::try_from(d_day).unwrap_or(UNKNOWN_DDAY);
    }
    if let Some(period) = &fetched.application_period {
        policy.application_period = Some(period.clone());
    }
    if let Some(period) = &policy.application_period {
        if let Some(synced) = compute_dday_from_period(period, now) {
            policy.d_day = i32::try_from(synced).unwrap_or(UNKNOWN_DDAY);
        }
    }
    if !fetched.roadmap.is_empty() {
        let mut roadmap = expand_single_step(fetched.roadmap.clone());
        roadmap.truncate(MAX_SECTION_ITEMS);
        policy.roadmap = roadmap;
    }
    if !fetched.documents.is_empty() {
        let mut documents = fetched.documents.clone();
        documents.truncate(MAX_SECTION_ITEMS);
        policy.documents = documents;
    }
}

/// The enrichment pass: cache-or-fetch metadata for every policy that
/// still needs it, with bounded concurrency.
pub async fn enrich_policies(
    policies: Vec<NormalizedPolicy>,
    cache: &CacheService,
    fetcher: &Fetcher,
    now: DateTime<Utc>,
) -> Vec<NormalizedPolicy> {
    map_with_limit(policies, ENRICH_CONCURRENCY, |mut policy, _| async move {
        let url = match policy.url.clone() {
            Some(url) => url,
            None => return policy,
        };
        if !needs_enrichment(&policy) || !should_fetch(&url) {
            return policy;
        }
        tracing::debug!(id = %policy.id, url = %url, "enriching policy");
        let fetched = cache
            .meta_for_url(&url, || fetcher.fetch_meta(&url, &policy.title, now))
            .await;
        if let Some(fetched) = fetched {
            apply_fetched(&mut policy, &fetched, now);
        }
        policy
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentCategory, DocumentItem, PolicyCriteria, RoadmapStep};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 28, 15, 0, 0).unwrap()
    }

    fn bare_policy(id: &str) -> NormalizedPolicy {
        NormalizedPolicy {
            id: id.to_string(),
            title: "공고".to_string(),
            summary: String::new(),
            support_amount: "미정".to_string(),
            d_day: UNKNOWN_DDAY,
            application_period: Some("상시".to_string()),
            agency: "정부기관".to_string(),
            source_platform: None,
            url: None,
            mobile_url: None,
            detail_content: None,
            inquiry: None,
            application_method: None,
            criteria: PolicyCriteria::default(),
            roadmap: vec![],
            documents: vec![],
        }
    }

    #[tokio::test]
    async fn test_map_with_limit_preserves_order() {
        let items: Vec<usize> = (0..20).collect();
        let results = map_with_limit(items, 5, |item, index| async move {
            assert_eq!(item, index);
            item * 2
        })
        .await;
        assert_eq!(results, (0..20).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_map_with_limit_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..20).collect();
        let results = map_with_limit(items, 3, |item, _| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                item
            }
        })
        .await;
        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_map_with_limit_empty_input() {
        let results: Vec<usize> = map_with_limit(Vec::<usize>::new(), 5, |item, _| async move { item }).await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_needs_enrichment_when_everything_missing() {
        let policy = bare_policy("1");
        assert!(needs_enrichment(&policy));

        let mut with_dday = bare_policy("2");
        with_dday.d_day = 14;
        assert!(!needs_enrichment(&with_dday));

        let mut with_roadmap = bare_policy("3");
        with_roadmap.roadmap = vec![RoadmapStep::titled(1, "접수")];
        assert!(!needs_enrichment(&with_roadmap));
    }

    #[test]
    fn test_needs_enrichment_for_unresolved_search_url() {
        let mut policy = bare_policy("4");
        policy.d_day = 10;
        policy.roadmap = vec![RoadmapStep::titled(1, "접수")];
        policy.url = Some(
            "https://www.k-startup.go.kr/web/contents/bizpbanc-ongoing.do?schM=list&schStr=%EC%B0%BD%EC%97%85"
                .to_string(),
        );
        assert!(needs_enrichment(&policy));
    }

    #[test]
    fn test_apply_fetched_syncs_dday_with_period() {
        let mut policy = bare_policy("5");
        let fetched = FetchMetaResult {
            d_day: Some(3),
            application_period: Some("2026.03.01 ~ 2026.03.31".to_string()),
            roadmap: vec![RoadmapStep::titled(1, "서류 접수, 현장 실사 그리고 최종 선정")],
            documents: vec![DocumentItem::named("사업계획서", DocumentCategory::Required)],
            resolved_url: Some("https://www.k-startup.go.kr/web/contents/bizpbanc-ongoing.do?schM=view&pbancSn=1".to_string()),
        };
        apply_fetched(&mut policy, &fetched, fixed_now());
        // Period string wins over the directly fetched d-day
        assert_eq!(policy.d_day, 31);
        assert_eq!(policy.roadmap.len(), 3);
        assert_eq!(policy.documents.len(), 1);
        assert!(policy.url.as_deref().unwrap().contains("schM=view"));
    }

    #[test]
    fn test_apply_fetched_keeps_known_values_on_empty_result() {
        let mut policy = bare_policy("6");
        policy.d_day = 7;
        policy.roadmap = vec![RoadmapStep::titled(1, "접수")];
        let before = policy.roadmap.clone();
        apply_fetched(&mut policy, &FetchMetaResult::default(), fixed_now());
        assert_eq!(policy.d_day, 7);
        assert_eq!(policy.roadmap, before);
    }
}
