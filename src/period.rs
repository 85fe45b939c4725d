//! Period/Deadline Extraction Module
//!
//! Parses Korean application-period text into a canonical window:
//! - Full dates (YYYY.M.D / YYYY년 M월 D일, optional H시 M분) and short
//!   dates (M.D) inheriting a base year from context
//! - Date ranges joined by ~ / 〜 / ∼ / - / – / 부터, accepted only when
//!   the span is plausible (0..=370 days)
//! - Deadline-only phrases ("마감", "...까지") and the always-open marker
//!
//! All times are Korea local; instants are built by subtracting the fixed
//! 9-hour offset before UTC arithmetic. Every function is total: parse
//! failures fall through, they never error.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::text::strip_html;

/// Literal used for announcements with no fixed deadline.
pub const ALWAYS_OPEN: &str = "상시";

const KST_OFFSET_HOURS: i64 = 9;
/// Longest believable application window, in days.
const MAX_RANGE_SPAN_DAYS: i64 = 370;

static FULL_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{4})\s*[.\-/년]\s*(\d{1,2})\s*[.\-/월]\s*(\d{1,2})\s*(?:일)?(?:\s*\([^)]+\))?(?:\s*(\d{1,2})\s*[:시]\s*(\d{2})\s*분?)?",
    )
    .expect("full date regex")
});
static SHORT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{1,2})\s*[./월]\s*(\d{1,2})\s*(?:일)?(?:\s*\([^)]+\))?(?:\s*(\d{1,2})\s*[:시]\s*(\d{2})\s*분?)?",
    )
    .expect("short date regex")
});
static BASE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(20\d{2})\s*[.\-/년]").expect("base year regex"));
static RANGE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    let sep = r"(?:~|～|〜|∼|−|-|–|—|부터)";
    let seg = r"[^~～〜∼]";
    vec![
        Regex::new(&format!(
            r"(\d{{4}}{seg}{{0,40}}\d{{1,2}}{seg}{{0,40}}\d{{1,2}}{seg}{{0,20}})\s*{sep}\s*(\d{{4}}{seg}{{0,40}}\d{{1,2}}{seg}{{0,40}}\d{{1,2}}{seg}{{0,20}})"
        ))
        .expect("full range regex"),
        Regex::new(&format!(
            r"(\d{{4}}{seg}{{0,40}}\d{{1,2}}{seg}{{0,40}}\d{{1,2}}{seg}{{0,20}})\s*{sep}\s*(\d{{1,2}}{seg}{{0,10}}\d{{1,2}}{seg}{{0,10}})"
        ))
        .expect("short range regex"),
    ]
});
static DEADLINE_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:마감일?|접수\s*마감|신청\s*마감)\s*[:：]?\s*(\d{4}\s*[.\-/년]\s*\d{1,2}\s*[.\-/월]\s*\d{1,2}\s*일?)")
        .expect("labeled deadline regex")
});
static DEADLINE_TRAILING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}\s*[.\-/년]\s*\d{1,2}\s*[.\-/월]\s*\d{1,2}\s*일?)\s*(?:까지|마감)")
        .expect("trailing deadline regex")
});
static APPLICATION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:신청|접수|모집|공고|공모|지원|사업\s*공고)\s*(?:기간|일정|마감)[^0-9]{0,20}.{0,200}")
        .expect("application label regex")
});
static ALWAYS_OPEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(상시|수시|예산\s*소진)").expect("always open regex"));
static CANONICAL_DEADLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~\s*(\d{4}\.\d{2}\.\d{2})").expect("canonical deadline regex"));
static YEAR_PROBE: Lazy<Regex> = Lazy::new(|| Regex::new(r"20\d{2}").expect("year probe regex"));

/// Inclusive application window as absolute instants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The three record fields the period extractor searches, pre-stripped.
#[derive(Debug, Clone, Default)]
pub struct PeriodTexts {
    pub application_period: String,
    pub content_summary: String,
    pub raw_content: String,
}

impl PeriodTexts {
    pub fn from_record_fields(
        application_period: Option<&str>,
        content_summary: Option<&str>,
        raw_content: Option<&str>,
    ) -> Self {
        PeriodTexts {
            application_period: application_period.map(strip_html).unwrap_or_default(),
            content_summary: content_summary.map(strip_html).unwrap_or_default(),
            raw_content: raw_content.map(strip_html).unwrap_or_default(),
        }
    }

    /// Page text fetched from the source site: searched both as a labeled
    /// field and as full content.
    pub fn from_fetched_text(text: String) -> Self {
        PeriodTexts {
            application_period: text.clone(),
            content_summary: String::new(),
            raw_content: text,
        }
    }
}

/// Build the KST instant for a calendar date and wall-clock time,
/// defaulting to 23:59 when no time is given.
fn kst_instant(year: i32, month: u32, day: u32, hour: Option<i64>, minute: Option<i64>) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    let naive = midnight
        + Duration::hours(hour.unwrap_or(23) - KST_OFFSET_HOURS)
        + Duration::minutes(minute.unwrap_or(59))
        + Duration::seconds(59);
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Extract every date mentioned in the text, full dates first, then
/// short month/day dates interpreted against a base year found in the
/// text (or the current KST year).
pub fn extract_dates_from_text(text: &str, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut dates = Vec::new();

    for caps in FULL_DATE.captures_iter(text) {
        let year: i32 = match caps[1].parse() {
            Ok(y) => y,
            Err(_) => continue,
        };
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);
        let hour = caps.get(4).and_then(|m| m.as_str().parse::<i64>().ok());
        let minute = caps.get(5).and_then(|m| m.as_str().parse::<i64>().ok());
        if let Some(instant) = kst_instant(year, month, day, hour, minute) {
            dates.push(instant);
        }
    }

    let base_year = BASE_YEAR
        .captures(text)
        .and_then(|caps| caps[1].parse::<i32>().ok())
        .unwrap_or_else(|| kst_date(now).0);

    for caps in SHORT_DATE.captures_iter(text) {
        let month: u32 = caps[1].parse().unwrap_or(0);
        let day: u32 = caps[2].parse().unwrap_or(0);
        let hour = caps.get(3).and_then(|m| m.as_str().parse::<i64>().ok());
        let minute = caps.get(4).and_then(|m| m.as_str().parse::<i64>().ok());
        if let Some(instant) = kst_instant(base_year, month, day, hour, minute) {
            dates.push(instant);
        }
    }

    dates
}

fn kst_date(instant: DateTime<Utc>) -> (i32, u32, u32) {
    use chrono::Datelike;
    let kst = instant + Duration::hours(KST_OFFSET_HOURS);
    (kst.year(), kst.month(), kst.day())
}

/// Format an instant as a KST calendar date, "YYYY.MM.DD".
pub fn format_date_kst(instant: DateTime<Utc>) -> String {
    let (year, month, day) = kst_date(instant);
    format!("{year}.{month:02}.{day:02}")
}

pub fn format_date_range(range: &DateRange) -> String {
    format!("{} ~ {}", format_date_kst(range.start), format_date_kst(range.end))
}

/// Find a date pair joined by a range separator. A pair is accepted only
/// when the span is 0..=370 days, which guards against pairing unrelated
/// numbers. A year-less second date inherits the first date's year.
pub fn find_date_range_in_text(source: &str, now: DateTime<Utc>) -> Option<DateRange> {
    for regex in RANGE_REGEXES.iter() {
        for caps in regex.captures_iter(source) {
            let start_text = &caps[1];
            let end_text = caps[2].to_string();
            let start = match extract_dates_from_text(start_text, now).first() {
                Some(start) => *start,
                None => continue,
            };
            let end_text = if YEAR_PROBE.is_match(&end_text) {
                end_text
            } else {
                let start_year = &format_date_kst(start)[..4];
                format!("{start_year} {end_text}")
            };
            let end = match extract_dates_from_text(&end_text, now).first() {
                Some(end) => *end,
                None => continue,
            };
            let span_days = ceil_days(end - start);
            if !(0..=MAX_RANGE_SPAN_DAYS).contains(&span_days) {
                continue;
            }
            return Some(DateRange { start, end });
        }
    }
    None
}

/// Find a deadline-only date: "마감(일) <date>" or "<date> 까지/마감".
pub fn find_deadline_date_in_text(source: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for pattern in [&*DEADLINE_LABELED, &*DEADLINE_TRAILING] {
        if let Some(caps) = pattern.captures(source) {
            if let Some(date) = extract_dates_from_text(&caps[1], now).first() {
                return Some(*date);
            }
        }
    }
    None
}

/// Range search that prefers labeled sections ("신청기간 ...") before
/// scanning the whole text.
pub fn extract_date_range_from_text(text: &str, now: DateTime<Utc>) -> Option<DateRange> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(range) = extract_date_range_from_labeled_section(&normalized, now) {
        return Some(range);
    }
    find_date_range_in_text(&normalized, now)
}

/// Range search restricted to labeled sections; used for raw page content
/// where unlabeled number pairs are too noisy to trust.
pub fn extract_date_range_from_labeled_section(text: &str, now: DateTime<Utc>) -> Option<DateRange> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    for label in APPLICATION_LABEL.find_iter(&normalized) {
        if let Some(range) = find_date_range_in_text(label.as_str(), now) {
            return Some(range);
        }
    }
    None
}

pub fn is_always_open(text: &str) -> bool {
    ALWAYS_OPEN_PATTERN.is_match(text)
}

/// Derive the application period across the record's fields, in priority
/// order: explicit application-period field, content summary, raw content
/// (labeled sections, then deadline phrases, then the always-open marker).
pub fn compute_application_period(texts: &PeriodTexts, now: DateTime<Utc>) -> Option<String> {
    if !texts.application_period.is_empty() {
        if is_always_open(&texts.application_period) {
            return Some(ALWAYS_OPEN.to_string());
        }
        if let Some(range) = extract_date_range_from_text(&texts.application_period, now) {
            return Some(format_date_range(&range));
        }
    }
    if !texts.content_summary.is_empty() {
        if is_always_open(&texts.content_summary) {
            return Some(ALWAYS_OPEN.to_string());
        }
        if let Some(range) = extract_date_range_from_text(&texts.content_summary, now) {
            return Some(format_date_range(&range));
        }
    }
    if !texts.raw_content.is_empty() {
        if let Some(range) = extract_date_range_from_labeled_section(&texts.raw_content, now) {
            return Some(format_date_range(&range));
        }
        if let Some(deadline) = find_deadline_date_in_text(&texts.raw_content, now) {
            return Some(format!("~ {}", format_date_kst(deadline)));
        }
        if is_always_open(&texts.raw_content) {
            return Some(ALWAYS_OPEN.to_string());
        }
    }
    None
}

/// Normalize a single period string to the canonical form, or None when
/// it encodes no recognizable window.
pub fn normalize_application_period_text(value: &str, now: DateTime<Utc>) -> Option<String> {
    let text = strip_html(value);
    if text.is_empty() {
        return None;
    }
    if is_always_open(&text) {
        return Some(ALWAYS_OPEN.to_string());
    }
    if let Some(range) = extract_date_range_from_text(&text, now) {
        return Some(format_date_range(&range));
    }
    if let Some(deadline) = find_deadline_date_in_text(&text, now) {
        return Some(format!("~ {}", format_date_kst(deadline)));
    }
    None
}

/// Days until the deadline found across the record's fields, same field
/// priority as `compute_application_period`. Always-open periods carry no
/// d-day at all.
pub fn compute_dday(texts: &PeriodTexts, now: DateTime<Utc>) -> Option<i64> {
    if !texts.application_period.is_empty() {
        if let Some(range) = extract_date_range_from_text(&texts.application_period, now) {
            return Some(ceil_days(range.end - now));
        }
    }
    if !texts.content_summary.is_empty() {
        if let Some(range) = extract_date_range_from_text(&texts.content_summary, now) {
            return Some(ceil_days(range.end - now));
        }
    }
    if !texts.raw_content.is_empty() {
        if let Some(range) = extract_date_range_from_labeled_section(&texts.raw_content, now) {
            return Some(ceil_days(range.end - now));
        }
        if let Some(deadline) = find_deadline_date_in_text(&texts.raw_content, now) {
            return Some(ceil_days(deadline - now));
        }
    }
    None
}

/// Recompute d-day from a final formatted period string. This is the
/// single source of truth: after formatting, d-day is re-derived from the
/// exact string that will be displayed, so the two can never disagree.
pub fn compute_dday_from_period(period: &str, now: DateTime<Utc>) -> Option<i64> {
    let text = strip_html(period);
    if text.is_empty() || is_always_open(&text) {
        return None;
    }
    if let Some(range) = extract_date_range_from_text(&text, now) {
        return Some(ceil_days(range.end - now));
    }
    if let Some(caps) = CANONICAL_DEADLINE.captures(&text) {
        if let Some(deadline) = extract_dates_from_text(&caps[1], now).first() {
            return Some(ceil_days(*deadline - now));
        }
    }
    None
}

fn ceil_days(duration: Duration) -> i64 {
    let seconds = duration.num_seconds();
    seconds.div_euclid(86_400) + if seconds.rem_euclid(86_400) > 0 { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        // 2026-03-01 00:00 KST
        Utc.with_ymd_and_hms(2026, 2, 28, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_full_date_defaults_to_end_of_day_kst() {
        let dates = extract_dates_from_text("2026.03.31", fixed_now());
        assert_eq!(format_date_kst(dates[0]), "2026.03.31");
        // 23:59:59 KST == 14:59:59 UTC
        assert_eq!(dates[0], Utc.with_ymd_and_hms(2026, 3, 31, 14, 59, 59).unwrap());
    }

    #[test]
    fn test_full_date_with_explicit_time() {
        let dates = extract_dates_from_text("2026년 3월 31일 18시00분", fixed_now());
        assert_eq!(dates[0], Utc.with_ymd_and_hms(2026, 3, 31, 9, 0, 59).unwrap());
    }

    #[test]
    fn test_short_date_inherits_base_year() {
        let dates = extract_dates_from_text("2026년 접수: 4월 15일까지", fixed_now());
        assert!(dates.iter().any(|d| format_date_kst(*d) == "2026.04.15"));
    }

    #[test]
    fn test_range_detection() {
        let range = find_date_range_in_text("2026.03.01 ~ 2026.03.31", fixed_now()).unwrap();
        assert_eq!(format_date_kst(range.start), "2026.03.01");
        assert_eq!(format_date_kst(range.end), "2026.03.31");
    }

    #[test]
    fn test_range_second_date_inherits_year() {
        let range = find_date_range_in_text("2026.03.01 ~ 3.31", fixed_now()).unwrap();
        assert_eq!(format_date_kst(range.end), "2026.03.31");
    }

    #[test]
    fn test_range_rejects_implausible_span() {
        assert!(find_date_range_in_text("2020.01.01 ~ 2026.03.31", fixed_now()).is_none());
        assert!(find_date_range_in_text("2026.03.31 ~ 2026.03.01", fixed_now()).is_none());
    }

    #[test]
    fn test_deadline_phrases() {
        let deadline = find_deadline_date_in_text("접수 마감: 2026.04.30", fixed_now()).unwrap();
        assert_eq!(format_date_kst(deadline), "2026.04.30");
        let deadline = find_deadline_date_in_text("2026년 4월 30일까지 신청", fixed_now()).unwrap();
        assert_eq!(format_date_kst(deadline), "2026.04.30");
    }

    #[test]
    fn test_always_open_short_circuits() {
        let texts = PeriodTexts::from_record_fields(Some("상시 모집"), None, None);
        assert_eq!(compute_application_period(&texts, fixed_now()).as_deref(), Some("상시"));
        assert_eq!(compute_dday(&texts, fixed_now()), None);
    }

    #[test]
    fn test_always_open_in_raw_content_only() {
        let texts = PeriodTexts::from_record_fields(None, None, Some("예산 소진 시까지 수시 접수"));
        assert_eq!(compute_application_period(&texts, fixed_now()).as_deref(), Some("상시"));
    }

    #[test]
    fn test_explicit_period_field_wins() {
        let texts = PeriodTexts::from_record_fields(
            Some("2026.03.01 ~ 2026.03.31"),
            Some("2026.05.01 ~ 2026.05.31"),
            None,
        );
        assert_eq!(
            compute_application_period(&texts, fixed_now()).as_deref(),
            Some("2026.03.01 ~ 2026.03.31")
        );
    }

    #[test]
    fn test_labeled_section_in_raw_content() {
        let texts = PeriodTexts::from_record_fields(
            None,
            None,
            Some("사업 개요 ... 신청기간: 2026.03.01(화) ~ 2026.03.31(목) 18:00 ..."),
        );
        let period = compute_application_period(&texts, fixed_now()).unwrap();
        assert_eq!(period, "2026.03.01 ~ 2026.03.31");
    }

    #[test]
    fn test_dday_recomputed_from_canonical_period() {
        // now = 2026-03-01 00:00 KST, deadline = 2026-03-31 23:59 KST
        assert_eq!(compute_dday_from_period("2026.03.01 ~ 2026.03.31", fixed_now()), Some(31));
        assert_eq!(compute_dday_from_period("~ 2026.03.02", fixed_now()), Some(2));
        assert_eq!(compute_dday_from_period("상시", fixed_now()), None);
    }

    #[test]
    fn test_dday_negative_when_past() {
        let dday = compute_dday_from_period("~ 2026.02.20", fixed_now()).unwrap();
        assert!(dday < 0, "expected negative d-day, got {dday}");
    }

    #[test]
    fn test_ceil_days_rounding() {
        assert_eq!(ceil_days(Duration::hours(1)), 1);
        assert_eq!(ceil_days(Duration::hours(25)), 2);
        assert_eq!(ceil_days(Duration::seconds(0)), 0);
        assert_eq!(ceil_days(Duration::hours(-1)), 0);
        assert_eq!(ceil_days(Duration::hours(-25)), -1);
    }
}
