use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;

use crate::dates;
use crate::record::Record;

static TITLE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.+?)\s*@\s*(Last\s+[A-Za-z]+|[A-Za-z]+\s+\d{1,2},?\s*\d{4})").unwrap()
});
static SHARE_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)share summary").unwrap());
static SHARE_SUMMARY_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\n\n|summary\s|notes\s|citations\s*\d").unwrap());
static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)summary").unwrap());
static SUMMARY_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)notes|transcript|was this").unwrap());
static LISTED_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]+ \d+,? \d{4}").unwrap());
static LISTING_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*@\s*(.+)$").unwrap());

/// Summary blocks shorter than this (in chars, after trimming) are noise.
const MIN_SUMMARY_CHARS: usize = 10;

/// A `title @ date` hit in page text. `end` is the byte offset just past the
/// date phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleMatch {
    pub title: String,
    pub date_text: String,
    pub end: usize,
}

/// A captured summary block and the byte offset where its text starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryBlock {
    pub text: String,
    pub start: usize,
}

/// How summary blocks are attached to title matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    /// i-th title gets the i-th summary.
    #[default]
    ByIndex,
    /// Each summary goes to the nearest title that ends before it starts.
    ByOffset,
}

/// Every `title @ date` occurrence, in document order, no dedup.
pub fn find_title_dates(text: &str) -> Vec<TitleMatch> {
    TITLE_DATE_RE
        .captures_iter(text)
        .map(|caps| TitleMatch {
            title: caps[1].trim().to_string(),
            date_text: caps[2].trim().to_string(),
            end: caps.get(0).map_or(0, |m| m.end()),
        })
        .collect()
}

/// Text following each "Share summary" marker up to a blank line, the next
/// Summary/Notes heading, a citations footer, or end of text.
pub fn find_summaries(text: &str) -> Vec<SummaryBlock> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(marker) = SHARE_SUMMARY_RE.find_at(text, pos) {
        let body_start = skip_whitespace(text, marker.end());
        let body_end = SHARE_SUMMARY_END_RE
            .find_at(text, body_start)
            .map(|m| m.start())
            .unwrap_or(text.len());

        let body = text[body_start..body_end].trim();
        if body.chars().count() >= MIN_SUMMARY_CHARS {
            blocks.push(SummaryBlock {
                text: body.to_string(),
                start: body_start,
            });
        }
        pos = body_end.max(marker.end());
    }

    blocks
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// One summary (possibly empty) per title, according to `pairing`.
pub fn pair_summaries(
    titles: &[TitleMatch],
    summaries: &[SummaryBlock],
    pairing: Pairing,
) -> Vec<String> {
    match pairing {
        Pairing::ByIndex => (0..titles.len())
            .map(|i| summaries.get(i).map(|s| s.text.clone()).unwrap_or_default())
            .collect(),
        Pairing::ByOffset => {
            let mut paired = vec![String::new(); titles.len()];
            for summary in summaries {
                let owner = titles.iter().rposition(|t| t.end <= summary.start);
                if let Some(i) = owner {
                    if paired[i].is_empty() {
                        paired[i] = summary.text.clone();
                    }
                }
            }
            paired
        }
    }
}

/// Records for every title/date match on the page, dates resolved against
/// `today`. Notes are never extracted from live pages.
pub fn extract_records(
    text: &str,
    category: &str,
    subcategory: &str,
    today: NaiveDate,
    pairing: Pairing,
) -> Vec<Record> {
    let titles = find_title_dates(text);
    let summaries = find_summaries(text);
    let paired = pair_summaries(&titles, &summaries, pairing);

    titles
        .into_iter()
        .zip(paired)
        .map(|(m, summary)| Record {
            title: m.title,
            date: dates::resolve(&m.date_text, today),
            summary,
            ..Record::new(category, subcategory)
        })
        .collect()
}

/// Line-anchored meeting listing: lines holding `@` and either "Last" or a
/// `Month d, yyyy` date, split at the first `@`. Every line counts, so a
/// title repeated for different meetings is listed once per meeting.
pub fn list_meetings(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter(|line| line.contains('@'))
        .filter(|line| line.contains("Last") || LISTED_DATE_RE.is_match(line))
        .filter_map(|line| LISTING_SPLIT_RE.captures(line))
        .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
        .collect()
}

/// Replace record dates with the listing's. Matching is by occurrence: the
/// k-th record titled T takes the k-th listing entry titled T, so meetings
/// sharing a title keep their own dates.
pub fn override_dates(records: &mut [Record], listing: &[(String, String)], today: NaiveDate) {
    let mut used: HashMap<String, usize> = HashMap::new();
    for record in records.iter_mut() {
        let nth = used.entry(record.title.clone()).or_insert(0);
        let listed = listing
            .iter()
            .filter(|(title, _)| *title == record.title)
            .nth(*nth);
        *nth += 1;

        if let Some((_, date_text)) = listed {
            let resolved = dates::resolve(date_text, today);
            if dates::find_cjk_date(&resolved).is_some() {
                record.date = resolved;
            }
        }
    }
}

/// Low-fidelity single record for pages where no `title @ date` matched.
/// Takes the first listed meeting (if any) and the first "Summary" block.
pub fn extract_single(
    text: &str,
    category: &str,
    subcategory: &str,
    today: NaiveDate,
) -> Option<Record> {
    let mut record = Record::new(category, subcategory);

    if let Some((title, date_text)) = list_meetings(text).into_iter().next() {
        record.title = title;
        record.date = dates::resolve(&date_text, today);
    }
    record.summary = first_plain_summary(text).unwrap_or_default();

    if record.title.is_empty() && record.summary.is_empty() {
        None
    } else {
        Some(record)
    }
}

fn first_plain_summary(text: &str) -> Option<String> {
    let mut pos = 0;
    while let Some(marker) = SUMMARY_RE.find_at(text, pos) {
        let body_start = skip_whitespace(text, marker.end());
        let end = SUMMARY_END_RE.find_at(text, body_start)?;
        let body = text[body_start..end.start()].trim();
        if body.chars().count() > MIN_SUMMARY_CHARS {
            return Some(body.to_string());
        }
        pos = end.start().max(marker.end());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thursday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 12).unwrap()
    }

    const PAGE: &str = "\
APP月會
Weekly sync @ Last Tuesday
Summary
Notes
Transcript
Share summary
Release 3.2 slipped by one week; QA owns the regression pass.

Planning review @ February 4, 2026
Share summary
Budget approved for two contractors starting in March.
citations 1
";

    #[test]
    fn finds_titles_and_dates_in_order() {
        let titles = find_title_dates(PAGE);
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].title, "Weekly sync");
        assert_eq!(titles[0].date_text, "Last Tuesday");
        assert_eq!(titles[1].title, "Planning review");
        assert_eq!(titles[1].date_text, "February 4, 2026");
    }

    #[test]
    fn summary_stops_at_blank_line_and_citations() {
        let blocks = find_summaries(PAGE);
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0].text,
            "Release 3.2 slipped by one week; QA owns the regression pass."
        );
        assert_eq!(
            blocks[1].text,
            "Budget approved for two contractors starting in March."
        );
    }

    #[test]
    fn summary_stops_at_next_section_marker() {
        let text = "Share summary\nFirst line of the recap\nNotes\nsomething else";
        let blocks = find_summaries(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "First line of the recap");
    }

    #[test]
    fn short_summary_is_noise() {
        let text = "Share summary\nok\n\nShare summary\nlong enough text here";
        let blocks = find_summaries(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "long enough text here");
    }

    #[test]
    fn extracts_records_with_resolved_dates() {
        let records = extract_records(PAGE, "APP月會", "", thursday(), Pairing::ByIndex);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, "APP月會");
        assert_eq!(records[0].date, "2026年2月10日");
        assert!(records[0].summary.starts_with("Release 3.2"));
        assert_eq!(records[1].date, "2026年2月4日");
        assert!(records.iter().all(|r| r.notes.is_empty()));
    }

    #[test]
    fn trailing_titles_get_empty_summary() {
        let text = "A @ Last Monday\nShare summary\nonly one recap block\n\nB @ Last Friday\n";
        let records = extract_records(text, "c", "s", thursday(), Pairing::ByIndex);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].summary, "only one recap block");
        assert_eq!(records[1].summary, "");
        assert_eq!(records[1].subcategory, "s");
    }

    #[test]
    fn offset_pairing_anchors_to_preceding_title() {
        let text = "A @ Last Monday\nB @ Last Friday\nShare summary\nbelongs to the second title\n";
        let titles = find_title_dates(text);
        let summaries = find_summaries(text);

        let by_index = pair_summaries(&titles, &summaries, Pairing::ByIndex);
        assert_eq!(by_index, vec!["belongs to the second title".to_string(), String::new()]);

        let by_offset = pair_summaries(&titles, &summaries, Pairing::ByOffset);
        assert_eq!(by_offset, vec![String::new(), "belongs to the second title".to_string()]);
    }

    #[test]
    fn listing_keeps_every_occurrence() {
        let text = "Sync @ Last Monday\nSync @ Last Friday\nOther @ March 3, 2026 10:00\nno at sign Last\n";
        let listed = list_meetings(text);
        assert_eq!(
            listed,
            vec![
                ("Sync".to_string(), "Last Monday".to_string()),
                ("Sync".to_string(), "Last Friday".to_string()),
                ("Other".to_string(), "March 3, 2026 10:00".to_string()),
            ]
        );
    }

    #[test]
    fn override_matches_repeated_titles_by_occurrence() {
        let mut records = vec![
            Record {
                title: "Sync".into(),
                date: "Last Monday".into(),
                ..Record::new("c", "")
            },
            Record {
                title: "Sync".into(),
                date: "Last Friday".into(),
                ..Record::new("c", "")
            },
        ];
        let listing = vec![
            ("Sync".to_string(), "Last Monday".to_string()),
            ("Sync".to_string(), "February 2, 2026".to_string()),
        ];
        override_dates(&mut records, &listing, thursday());
        assert_eq!(records[0].date, "2026年2月9日");
        assert_eq!(records[1].date, "2026年2月2日");
    }

    #[test]
    fn override_uses_listing_date() {
        let mut records = vec![Record {
            title: "Sync".into(),
            date: "2026年1月1日".into(),
            ..Record::new("c", "")
        }];
        let listing = vec![("Sync".to_string(), "Last Monday".to_string())];
        override_dates(&mut records, &listing, thursday());
        assert_eq!(records[0].date, "2026年2月9日");
    }

    #[test]
    fn fallback_takes_first_plain_summary() {
        let text = "Project page\nSummary\nThe team agreed to freeze scope.\nTranscript\n";
        assert!(extract_records(text, "c", "", thursday(), Pairing::ByIndex).is_empty());
        let record = extract_single(text, "c", "", thursday()).unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.summary, "The team agreed to freeze scope.");
    }

    #[test]
    fn fallback_on_empty_page_yields_nothing() {
        assert!(extract_single("nothing useful here", "c", "", thursday()).is_none());
    }
}
