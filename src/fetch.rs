//! Upstream Fetch Module
//!
//! Fetches a source announcement page and extracts whatever metadata it
//! yields: application period, d-day, roadmap, document checklist, and a
//! resolved canonical URL. Site-specific handling:
//! - K-Startup pages that are JS listing stubs trigger a second fetch of
//!   the real detail page
//! - K-Startup `<p class="title">` marker sections back up the generic
//!   heading mining
//! - A crawl-by-title fallback locates the detail page when the URL alone
//!   is a dead end
//! - Bizinfo/K-Startup attachment links feed the pluggable attachment
//!   extractor when HTML mining comes up empty
//!
//! Network failures never propagate; they collapse to `None` and the
//! caller keeps whatever it already knew.

use crate::documents::{documents_from_names, refine_documents};
use crate::period::{compute_application_period, compute_dday, PeriodTexts};
use crate::resolver::{
    build_search_candidates, build_search_url, build_view_url, extract_search_term,
    find_pbanc_in_listing, has_js_view_stub, MatchConfig,
};
use crate::roadmap::steps_from_titles;
use crate::sections::{
    extract_marker_section_items, extract_section_items, DOCUMENT_SECTIONS, ROADMAP_SECTIONS,
};
use crate::text::{decode_entities, strip_html};
use crate::types::{DocumentItem, FetchMetaResult, RoadmapStep};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Url};
use std::time::Duration;

const DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36";
const FETCH_TIMEOUT_SECS: u64 = 5;
/// At most this many attachments are handed to the extractor per page.
const MAX_ATTACHMENTS: usize = 2;

static BIZINFO_ATTACHMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"fileDown\.do\?atchFileId=([^&"']+)&fileSn=(\d+)"#).expect("bizinfo attachment regex")
});
static KSTARTUP_ATTACHMENT_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href=["'](/afile/fileDownload/[^"']+)["']"#).expect("kstartup href regex")
});
static KSTARTUP_PDF_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)fnPdfView\(['"]([^'"]+)['"]\)"#).expect("pdf token regex"));

/// Hosts enrichment fetches are allowed to hit.
pub fn should_fetch(url: &str) -> bool {
    let url = url.to_lowercase();
    [
        "k-startup.go.kr",
        "bizinfo.go.kr",
        "smtech.go.kr",
        "semas.or.kr",
        "sbiz.or.kr",
        "gov24.go.kr",
        "gov.kr",
    ]
    .iter()
    .any(|host| url.contains(host))
}

/// Shared HTTP client: desktop browser UA, short timeout, no intermediary
/// caching of upstream pages.
pub fn build_client() -> Result<reqwest::Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
    reqwest::Client::builder()
        .user_agent(DESKTOP_UA)
        .default_headers(headers)
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .context("failed to build HTTP client")
}

/// Pluggable PDF/HWPX attachment text extraction.
pub trait AttachmentExtractor: Send + Sync {
    fn extract<'a>(&'a self, url: &'a str) -> BoxFuture<'a, (Vec<RoadmapStep>, Vec<DocumentItem>)>;
}

/// Deployment profile without attachment parsing; always empty.
pub struct NoopAttachmentExtractor;

impl AttachmentExtractor for NoopAttachmentExtractor {
    fn extract<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, (Vec<RoadmapStep>, Vec<DocumentItem>)> {
        Box::pin(async { (Vec::new(), Vec::new()) })
    }
}

/// Bizinfo attachment-download URLs found in a detail page.
pub fn extract_bizinfo_attachment_urls(html: &str) -> Vec<String> {
    let decoded = decode_entities(html);
    let base = match Url::parse("https://www.bizinfo.go.kr/") {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };
    let mut urls = Vec::new();
    for caps in BIZINFO_ATTACHMENT.captures_iter(&decoded) {
        if let Ok(url) = base.join(&format!("cmm/fms/{}", &caps[0])) {
            let url = url.to_string();
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

/// K-Startup attachment URLs: direct `/afile/fileDownload/` hrefs plus
/// `fnPdfView('token')` viewer calls.
pub fn extract_kstartup_attachment_urls(html: &str) -> Vec<String> {
    let decoded = decode_entities(html);
    let base = match Url::parse("https://www.k-startup.go.kr") {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };
    let mut urls = Vec::new();
    let mut push = |path: &str| {
        if let Ok(url) = base.join(path) {
            let url = url.to_string();
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    };
    for caps in KSTARTUP_ATTACHMENT_HREF.captures_iter(&decoded) {
        push(&caps[1]);
    }
    for caps in KSTARTUP_PDF_TOKEN.captures_iter(&decoded) {
        push(&format!("/afile/fileDownload/{}", &caps[1]));
    }
    urls
}

struct TitleCrawlResult {
    roadmap: Vec<RoadmapStep>,
    documents: Vec<DocumentItem>,
    resolved_url: String,
}

/// Fetches announcement pages and mines them for metadata.
pub struct Fetcher {
    client: reqwest::Client,
    config: MatchConfig,
    attachments: Box<dyn AttachmentExtractor>,
}

impl Fetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Fetcher {
            client,
            config: MatchConfig::default(),
            attachments: Box::new(NoopAttachmentExtractor),
        }
    }

    pub fn with_attachments(mut self, attachments: Box<dyn AttachmentExtractor>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn get_html(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(url = %url, status = %response.status(), "non-success response");
            return None;
        }
        response.text().await.ok()
    }

    /// Fetch one source URL and extract everything it yields. `None` on
    /// any network failure.
    pub async fn fetch_meta(&self, url: &str, title: &str, now: DateTime<Utc>) -> Option<FetchMetaResult> {
        let html = self.get_html(url).await?;
        let mut effective_html = html;
        let mut effective_url = url.to_string();

        let is_kstartup_source = url.to_lowercase().contains("k-startup.go.kr");
        if is_kstartup_source && has_js_view_stub(&effective_html) {
            // Listing stub: resolve the announcement id against the page
            // itself and fetch the real detail page
            let existing = extract_search_term(url);
            let candidates = build_search_candidates(title, existing.as_deref());
            let match_title = candidates.first().map(String::as_str).unwrap_or(title);
            if let Some(id) = find_pbanc_in_listing(&effective_html, match_title, self.config) {
                let detail_url = build_view_url(&id);
                if let Some(detail_html) = self.get_html(&detail_url).await {
                    effective_html = detail_html;
                    effective_url = detail_url;
                }
            }
        }

        let text = strip_html(&effective_html);
        let texts = PeriodTexts::from_fetched_text(text);
        let application_period = compute_application_period(&texts, now);
        let d_day = compute_dday(&texts, now);

        let mut roadmap = steps_from_titles(extract_section_items(&effective_html, &ROADMAP_SECTIONS));
        let mut documents = refine_documents(documents_from_names(extract_section_items(
            &effective_html,
            &DOCUMENT_SECTIONS,
        )));

        let is_kstartup = effective_url.to_lowercase().contains("k-startup.go.kr");
        let is_bizinfo = effective_url.to_lowercase().contains("bizinfo.go.kr");

        if is_kstartup && documents.is_empty() {
            documents = refine_documents(documents_from_names(extract_marker_section_items(
                &effective_html,
                "제출서류",
            )));
        }
        if is_kstartup && roadmap.is_empty() {
            roadmap = steps_from_titles(extract_marker_section_items(&effective_html, "선정절차"));
        }

        if is_kstartup && (documents.is_empty() || roadmap.is_empty() || effective_url == url) && !title.is_empty() {
            if let Some(resolved) = self.fetch_kstartup_meta_by_title(title).await {
                if documents.is_empty() && !resolved.documents.is_empty() {
                    documents = resolved.documents;
                }
                if roadmap.is_empty() && !resolved.roadmap.is_empty() {
                    roadmap = resolved.roadmap;
                }
                if effective_url == url {
                    effective_url = resolved.resolved_url;
                }
            }
        }

        if (roadmap.is_empty() || documents.is_empty()) && is_bizinfo {
            let urls = extract_bizinfo_attachment_urls(&effective_html);
            self.fill_from_attachments(&urls, &mut roadmap, &mut documents).await;
        }
        if (roadmap.is_empty() || documents.is_empty()) && is_kstartup {
            let urls = extract_kstartup_attachment_urls(&effective_html);
            self.fill_from_attachments(&urls, &mut roadmap, &mut documents).await;
        }

        let resolved_url = (effective_url != url).then_some(effective_url);
        Some(FetchMetaResult {
            d_day,
            application_period,
            roadmap,
            documents,
            resolved_url,
        })
    }

    async fn fill_from_attachments(
        &self,
        urls: &[String],
        roadmap: &mut Vec<RoadmapStep>,
        documents: &mut Vec<DocumentItem>,
    ) {
        for url in urls.iter().take(MAX_ATTACHMENTS) {
            let (extracted_roadmap, extracted_documents) = self.attachments.extract(url).await;
            if roadmap.is_empty() && !extracted_roadmap.is_empty() {
                *roadmap = extracted_roadmap;
            }
            if documents.is_empty() && !extracted_documents.is_empty() {
                *documents = extracted_documents;
            }
            if !roadmap.is_empty() && !documents.is_empty() {
                break;
            }
        }
    }

    /// Last-resort K-Startup path: search the listing by title, pick the
    /// matching announcement, and mine its detail page.
    async fn fetch_kstartup_meta_by_title(&self, title: &str) -> Option<TitleCrawlResult> {
        let candidates = build_search_candidates(title, None);
        let mut detail_url = None;
        for term in candidates.iter().take(4) {
            let listing_html = match self.get_html(&build_search_url(term)).await {
                Some(html) => html,
                None => continue,
            };
            if let Some(id) = find_pbanc_in_listing(&listing_html, title, self.config) {
                detail_url = Some(build_view_url(&id));
                break;
            }
        }
        let detail_url = detail_url?;
        let detail_html = self.get_html(&detail_url).await?;

        let mut roadmap = steps_from_titles(extract_section_items(&detail_html, &ROADMAP_SECTIONS));
        let mut documents = refine_documents(documents_from_names(extract_section_items(
            &detail_html,
            &DOCUMENT_SECTIONS,
        )));
        if documents.is_empty() {
            documents = refine_documents(documents_from_names(extract_marker_section_items(
                &detail_html,
                "제출서류",
            )));
        }
        if roadmap.is_empty() {
            roadmap = steps_from_titles(extract_marker_section_items(&detail_html, "선정절차"));
        }
        Some(TitleCrawlResult {
            roadmap,
            documents,
            resolved_url: detail_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_fetch_known_hosts_only() {
        assert!(should_fetch("https://www.k-startup.go.kr/web/contents/bizpbanc-ongoing.do"));
        assert!(should_fetch("https://www.bizinfo.go.kr/view.do"));
        assert!(should_fetch("https://www.gov.kr/portal"));
        assert!(!should_fetch("https://example.com/announcement"));
        assert!(!should_fetch(""));
    }

    #[test]
    fn test_bizinfo_attachment_urls() {
        let html = r#"<a href="/cmm/fms/fileDown.do?atchFileId=FILE_1&fileSn=0">공고문.hwp</a>
                      <a href="fileDown.do?atchFileId=FILE_1&fileSn=0">중복</a>"#;
        let urls = extract_bizinfo_attachment_urls(html);
        assert_eq!(urls.len(), 1);
        assert_eq!(
            urls[0],
            "https://www.bizinfo.go.kr/cmm/fms/fileDown.do?atchFileId=FILE_1&fileSn=0"
        );
    }

    #[test]
    fn test_kstartup_attachment_urls() {
        let html = r#"<a href="/afile/fileDownload/abc123">첨부</a>
                      <button onclick="fnPdfView('tok9')">보기</button>"#;
        let urls = extract_kstartup_attachment_urls(html);
        assert_eq!(
            urls,
            vec![
                "https://www.k-startup.go.kr/afile/fileDownload/abc123",
                "https://www.k-startup.go.kr/afile/fileDownload/tok9",
            ]
        );
    }

    #[tokio::test]
    async fn test_noop_attachment_extractor_is_empty() {
        let extractor = NoopAttachmentExtractor;
        let (roadmap, documents) = extractor.extract("https://www.bizinfo.go.kr/x.pdf").await;
        assert!(roadmap.is_empty());
        assert!(documents.is_empty());
    }
}
