//! Caching Module
//!
//! Two-tier TTL cache in front of upstream enrichment:
//! - Per-URL metadata cache: one `FetchMetaResult` snapshot per source URL
//! - Whole-response cache: a single slot holding the serialized listing
//!   body, so a hit skips the store and every per-record fetch
//!
//! Both tiers expire after two hours. The fetch runs outside the lock, so
//! two concurrent misses may both fetch; the second write wins, which is
//! harmless since both computed equivalent values. Time is injected
//! through the `Clock` trait so expiry is testable.

use crate::types::FetchMetaResult;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

/// Cache lifetime for both tiers, in seconds.
pub const CACHE_TTL_SECS: i64 = 2 * 60 * 60;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct MetaEntry {
    result: FetchMetaResult,
    fetched_at: DateTime<Utc>,
}

struct ResponseEntry {
    body: String,
    fetched_at: DateTime<Utc>,
}

pub struct CacheService {
    clock: Box<dyn Clock>,
    meta: Mutex<HashMap<String, MetaEntry>>,
    response: Mutex<Option<ResponseEntry>>,
}

impl CacheService {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        CacheService {
            clock,
            meta: Mutex::new(HashMap::new()),
            response: Mutex::new(None),
        }
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>) -> bool {
        self.clock.now() - fetched_at < Duration::seconds(CACHE_TTL_SECS)
    }

    /// Cache-or-fetch for one source URL. A fresh entry is returned
    /// unconditionally; otherwise `fetch` runs (outside the lock) and a
    /// successful result is stored. Failed fetches are not cached, so the
    /// next request tries again.
    pub async fn meta_for_url<F, Fut>(&self, url: &str, fetch: F) -> Option<FetchMetaResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<FetchMetaResult>>,
    {
        {
            let meta = self.meta.lock().expect("meta cache lock");
            if let Some(entry) = meta.get(url) {
                if self.is_fresh(entry.fetched_at) {
                    tracing::debug!(url = %url, "meta cache hit");
                    return Some(entry.result.clone());
                }
            }
        }

        let result = fetch().await;
        if let Some(result) = &result {
            let mut meta = self.meta.lock().expect("meta cache lock");
            meta.insert(
                url.to_string(),
                MetaEntry {
                    result: result.clone(),
                    fetched_at: self.clock.now(),
                },
            );
        }
        result
    }

    /// Serialized listing body, when still fresh. Bytes come back exactly
    /// as stored.
    pub fn cached_response(&self) -> Option<String> {
        let response = self.response.lock().expect("response cache lock");
        response
            .as_ref()
            .filter(|entry| self.is_fresh(entry.fetched_at))
            .map(|entry| entry.body.clone())
    }

    pub fn store_response(&self, body: String) {
        let mut response = self.response.lock().expect("response cache lock");
        *response = Some(ResponseEntry {
            body,
            fetched_at: self.clock.now(),
        });
    }
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new()
    }
}
