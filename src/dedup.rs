//! Deduplication Module
//!
//! K-Startup announcements arrive several times: one row scraped from the
//! listing, another from the detail page, sometimes under slightly
//! different titles. Records are grouped by announcement id (`pbancSn`)
//! when available, else by normalized title key; within a group the
//! canonical view URL is preferred and propagated, and only one record
//! survives. Non-K-Startup policies pass through untouched.

use crate::resolver::{extract_pbanc_from_url, is_kstartup_view_url};
use crate::title::normalize_title_key;
use crate::types::NormalizedPolicy;
use std::collections::{HashMap, HashSet};

pub fn is_kstartup_policy(policy: &NormalizedPolicy) -> bool {
    let url_match = policy
        .url
        .as_deref()
        .map(|url| url.to_lowercase().contains("k-startup.go.kr"))
        .unwrap_or(false);
    let source_match = policy
        .source_platform
        .as_deref()
        .map(|source| source.to_lowercase().contains("k-startup"))
        .unwrap_or(false);
    url_match || source_match
}

#[derive(Clone)]
struct BestUrl {
    url: Option<String>,
    is_view: bool,
}

fn consider(best: &mut HashMap<String, BestUrl>, key: String, policy: &NormalizedPolicy) {
    let is_view = policy.url.as_deref().map(is_kstartup_view_url).unwrap_or(false);
    match best.get(&key) {
        Some(current) if current.is_view || !is_view => {}
        _ => {
            best.insert(
                key,
                BestUrl {
                    url: policy.url.clone(),
                    is_view,
                },
            );
        }
    }
}

/// Collapse duplicate K-Startup records. The surviving record of each
/// group carries the group's best (view) URL.
pub fn dedupe_kstartup(policies: Vec<NormalizedPolicy>) -> Vec<NormalizedPolicy> {
    let mut best_by_pbanc: HashMap<String, BestUrl> = HashMap::new();
    let mut best_by_title: HashMap<String, BestUrl> = HashMap::new();

    for policy in &policies {
        if !is_kstartup_policy(policy) {
            continue;
        }
        if let Some(pbanc) = policy.url.as_deref().and_then(extract_pbanc_from_url) {
            consider(&mut best_by_pbanc, pbanc, policy);
        }
        let key = normalize_title_key(&policy.title);
        if !key.is_empty() {
            consider(&mut best_by_title, key, policy);
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    policies
        .into_iter()
        .map(|mut policy| {
            if !is_kstartup_policy(&policy) {
                return policy;
            }
            let key = normalize_title_key(&policy.title);
            let pbanc = policy.url.as_deref().and_then(extract_pbanc_from_url);
            let best = pbanc
                .as_deref()
                .and_then(|p| best_by_pbanc.get(p))
                .or_else(|| best_by_title.get(&key));
            if let Some(best_url) = best.and_then(|b| b.url.clone()) {
                if policy.url.as_deref() != Some(best_url.as_str()) {
                    policy.url = Some(best_url);
                }
            }
            policy
        })
        .collect::<Vec<_>>()
        .into_iter()
        .filter(|policy| {
            if !is_kstartup_policy(policy) {
                return true;
            }
            let key = normalize_title_key(&policy.title);
            let dedupe_key = match policy.url.as_deref().and_then(extract_pbanc_from_url) {
                Some(pbanc) => format!("pbanc:{pbanc}"),
                None if !key.is_empty() => format!("title:{key}"),
                None => format!("id:{}", policy.id),
            };
            seen.insert(dedupe_key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{build_search_url, build_view_url};
    use crate::types::{PolicyCriteria, UNKNOWN_DDAY};

    fn kstartup_policy(id: &str, title: &str, url: &str) -> NormalizedPolicy {
        NormalizedPolicy {
            id: id.to_string(),
            title: title.to_string(),
            summary: String::new(),
            support_amount: "미정".to_string(),
            d_day: UNKNOWN_DDAY,
            application_period: Some("상시".to_string()),
            agency: "정부기관".to_string(),
            source_platform: Some("K-Startup".to_string()),
            url: Some(url.to_string()),
            mobile_url: None,
            detail_content: None,
            inquiry: None,
            application_method: None,
            criteria: PolicyCriteria::default(),
            roadmap: vec![],
            documents: vec![],
        }
    }

    #[test]
    fn test_same_title_collapses_to_view_url() {
        let title = "2026년 창업도약패키지 모집 공고";
        let policies = vec![
            kstartup_policy("1", title, &build_search_url("창업도약패키지")),
            kstartup_policy("2", title, &build_view_url("174201")),
        ];
        let deduped = dedupe_kstartup(policies);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].url.as_deref(), Some(build_view_url("174201").as_str()));
    }

    #[test]
    fn test_same_pbanc_different_titles_collapses() {
        let policies = vec![
            kstartup_policy("1", "창업도약패키지 모집", &build_view_url("555")),
            kstartup_policy("2", "창업도약패키지 참여기업 모집", &build_view_url("555")),
        ];
        let deduped = dedupe_kstartup(policies);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn test_distinct_announcements_survive() {
        let policies = vec![
            kstartup_policy("1", "창업도약패키지 모집", &build_view_url("100")),
            kstartup_policy("2", "예비창업패키지 모집", &build_view_url("200")),
        ];
        assert_eq!(dedupe_kstartup(policies).len(), 2);
    }

    #[test]
    fn test_other_platforms_untouched() {
        let mut bizinfo = kstartup_policy("1", "같은 제목", "https://www.bizinfo.go.kr/view.do?id=1");
        bizinfo.source_platform = Some("기업마당".to_string());
        let mut bizinfo2 = kstartup_policy("2", "같은 제목", "https://www.bizinfo.go.kr/view.do?id=2");
        bizinfo2.source_platform = Some("기업마당".to_string());
        assert_eq!(dedupe_kstartup(vec![bizinfo, bizinfo2]).len(), 2);
    }
}
