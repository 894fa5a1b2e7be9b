//! Publication-date heuristics

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Estimates when a document was published
///
/// Implementations receive the page's meta tags (keys lower-cased) and its
/// plain text, and return the first date they trust.
pub trait DateHeuristic: Send + Sync {
    fn published_at(&self, meta: &BTreeMap<String, String>, text: &str) -> Option<NaiveDate>;
}

/// Meta keys consulted in priority order
const META_KEYS: &[&str] = &[
    "article:published_time",
    "og:published_time",
    "datepublished",
    "publication_date",
    "publish-date",
    "pubdate",
    "dc.date.issued",
    "dc.date",
    "date",
    "time:datetime",
    "article:modified_time",
];

/// How far into the text date patterns are searched
const TEXT_SCAN_LIMIT: usize = 4000;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\.?\s+([a-zåäö]{3,9})\.?,?\s+(\d{4})\b").unwrap()
});

static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-zåäö]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b").unwrap()
});

/// Meta tags first, then the earliest date-like text pattern
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaThenText;

impl DateHeuristic for MetaThenText {
    fn published_at(&self, meta: &BTreeMap<String, String>, text: &str) -> Option<NaiveDate> {
        META_KEYS
            .iter()
            .filter_map(|key| meta.get(*key))
            .find_map(|value| parse_meta_date(value))
            .or_else(|| date_in_text(text))
    }
}

/// Parses the date portion of a meta tag value
pub fn parse_meta_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.date_naive());
    }
    let head = value.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Finds the earliest plausible date written in the text
pub fn date_in_text(text: &str) -> Option<NaiveDate> {
    let mut end = text.len().min(TEXT_SCAN_LIMIT);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let window = &text[..end];

    let mut found: Vec<(usize, NaiveDate)> = Vec::new();

    for caps in ISO_DATE.captures_iter(window) {
        if let Some(date) = ymd(&caps[1], &caps[2], &caps[3]) {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
        }
    }
    for caps in DAY_MONTH_YEAR.captures_iter(window) {
        if let Some(month) = month_number(&caps[2]) {
            if let Some(date) = ymd(&caps[3], &month.to_string(), &caps[1]) {
                found.push((caps.get(0).map_or(0, |m| m.start()), date));
            }
        }
    }
    for caps in MONTH_DAY_YEAR.captures_iter(window) {
        if let Some(month) = month_number(&caps[1]) {
            if let Some(date) = ymd(&caps[3], &month.to_string(), &caps[2]) {
                found.push((caps.get(0).map_or(0, |m| m.start()), date));
            }
        }
    }

    found.into_iter().min_by_key(|(pos, _)| *pos).map(|(_, d)| d)
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    if !(1990..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// English and Swedish month names and abbreviations
fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "january" | "januari" | "jan" => 1,
        "february" | "februari" | "feb" => 2,
        "march" | "mars" | "mar" => 3,
        "april" | "apr" => 4,
        "may" | "maj" => 5,
        "june" | "juni" | "jun" => 6,
        "july" | "juli" | "jul" => 7,
        "august" | "augusti" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oktober" | "oct" | "okt" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_meta_wins_over_text() {
        let m = meta(&[("article:published_time", "2024-02-15T07:30:00+01:00")]);
        let date = MetaThenText.published_at(&m, "Stockholm, 1 March 2023");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 15));
    }

    #[test]
    fn test_meta_priority_order() {
        let m = meta(&[("date", "2020-01-01"), ("og:published_time", "2021-06-30")]);
        assert_eq!(
            MetaThenText.published_at(&m, ""),
            NaiveDate::from_ymd_opt(2021, 6, 30)
        );
    }

    #[test]
    fn test_unparsable_meta_falls_through_to_text() {
        let m = meta(&[("date", "yesterday")]);
        assert_eq!(
            MetaThenText.published_at(&m, "Published 2023-11-08 by Acme"),
            NaiveDate::from_ymd_opt(2023, 11, 8)
        );
    }

    #[test]
    fn test_swedish_text_date() {
        assert_eq!(
            date_in_text("Pressmeddelande Stockholm den 12 mars 2024 kl 08.00"),
            NaiveDate::from_ymd_opt(2024, 3, 12)
        );
    }

    #[test]
    fn test_english_text_dates() {
        assert_eq!(
            date_in_text("Acme AB, April 3rd, 2024. Interim report"),
            NaiveDate::from_ymd_opt(2024, 4, 3)
        );
        assert_eq!(
            date_in_text("Released 7 May 2022"),
            NaiveDate::from_ymd_opt(2022, 5, 7)
        );
    }

    #[test]
    fn test_earliest_match_wins() {
        assert_eq!(
            date_in_text("On 1 June 2021 we said; later 2022-01-01"),
            NaiveDate::from_ymd_opt(2021, 6, 1)
        );
    }

    #[test]
    fn test_no_date() {
        assert_eq!(date_in_text("No dates here, only 42 apples"), None);
        assert_eq!(date_in_text("Invalid 2024-13-45"), None);
    }
}
