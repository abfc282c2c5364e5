use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, Month, NaiveDate, Weekday};
use regex::Regex;

static LAST_WEEKDAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blast\s+([a-z]+)").unwrap());
static MONTH_DAY_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)\s+(\d{1,2}),?\s*(\d{4})").unwrap());
static CJK_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)年(\d+)月(\d+)日").unwrap());

/// Resolve a page date phrase against `today`.
///
/// "Last Tuesday" becomes the most recent Tuesday strictly before `today`;
/// "February 4, 2026" / "Feb 4 2026" resolve directly. Output is always
/// `2026年2月4日`. Anything else comes back unchanged.
pub fn resolve(phrase: &str, today: NaiveDate) -> String {
    if let Some(date) = resolve_last_weekday(phrase, today) {
        return cjk_date(date);
    }
    if let Some(date) = resolve_month_day_year(phrase) {
        return cjk_date(date);
    }
    phrase.to_string()
}

fn resolve_last_weekday(phrase: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = LAST_WEEKDAY_RE.captures(phrase)?;
    let target = Weekday::from_str(&caps[1]).ok()?;

    let today_idx = today.weekday().num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;
    let mut days_ago = (today_idx - target_idx + 7) % 7;
    if days_ago == 0 {
        days_ago = 7;
    }
    today.checked_sub_signed(Duration::days(days_ago))
}

fn resolve_month_day_year(phrase: &str) -> Option<NaiveDate> {
    MONTH_DAY_YEAR_RE.captures_iter(phrase).find_map(|caps| {
        let month = Month::from_str(&caps[1]).ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month.number_from_month(), day)
    })
}

/// `2026年2月4日` form, no zero padding.
pub fn cjk_date(date: NaiveDate) -> String {
    format!("{}年{}月{}日", date.year(), date.month(), date.day())
}

/// First `<year>年<month>月<day>日` substring of `text`, if any.
pub fn find_cjk_date(text: &str) -> Option<&str> {
    CJK_DATE_RE.find(text).map(|m| m.as_str())
}

/// `2025年11月24日` -> `2025-11-24`. Empty string when the input holds no
/// valid calendar date or the year needs other than four digits.
pub fn to_iso(text: &str) -> String {
    let Some(caps) = CJK_DATE_RE.captures(text) else {
        return String::new();
    };
    let parsed = (
        caps[1].parse::<i32>(),
        caps[2].parse::<u32>(),
        caps[3].parse::<u32>(),
    );
    match parsed {
        (Ok(y), Ok(m), Ok(d)) if (1..=9999).contains(&y) => NaiveDate::from_ymd_opt(y, m, d)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn iso_conversion() {
        assert_eq!(to_iso("2025年11月24日"), "2025-11-24");
        assert_eq!(to_iso("2026年2月4日"), "2026-02-04");
        assert_eq!(to_iso(""), "");
        assert_eq!(to_iso("garbage"), "");
        assert_eq!(to_iso("2026年2月30日"), "");
        assert_eq!(to_iso("10000年1月1日"), "");
        assert_eq!(to_iso("0年1月1日"), "");
        assert_eq!(to_iso("9999年12月31日"), "9999-12-31");
    }

    #[test]
    fn last_weekday_from_thursday() {
        // 2026-02-12 is a Thursday
        let today = ymd(2026, 2, 12);
        assert_eq!(today.weekday(), Weekday::Thu);
        assert_eq!(resolve("Last Tuesday", today), "2026年2月10日");
        assert_eq!(resolve("last friday", today), "2026年2月6日");
    }

    #[test]
    fn last_weekday_same_day_goes_back_a_week() {
        let tuesday = ymd(2026, 2, 10);
        assert_eq!(tuesday.weekday(), Weekday::Tue);
        assert_eq!(resolve("Last Tuesday", tuesday), "2026年2月3日");
    }

    #[test]
    fn last_weekday_across_year_boundary() {
        let today = ymd(2026, 1, 1); // Thursday
        assert_eq!(resolve("Last Monday", today), "2025年12月29日");
    }

    #[test]
    fn absolute_dates() {
        let today = ymd(2026, 2, 12);
        assert_eq!(resolve("February 4, 2026", today), "2026年2月4日");
        assert_eq!(resolve("Feb 4 2026", today), "2026年2月4日");
        assert_eq!(resolve("November 24, 2025", today), "2025年11月24日");
    }

    #[test]
    fn unparsed_phrase_passes_through() {
        let today = ymd(2026, 2, 12);
        assert_eq!(resolve("Yesterday", today), "Yesterday");
        assert_eq!(resolve("Last Blursday", today), "Last Blursday");
        assert_eq!(resolve("Smarch 4, 2026", today), "Smarch 4, 2026");
        assert_eq!(resolve("February 30, 2026", today), "February 30, 2026");
        assert_eq!(resolve("", today), "");
    }

    #[test]
    fn absolute_dates_round_trip_to_iso() {
        let today = ymd(2026, 2, 12);
        let months = [
            "January", "February", "March", "April", "May", "June", "July", "August",
            "September", "October", "November", "December",
        ];
        for (i, name) in months.iter().enumerate() {
            for day in [1u32, 9, 10, 28] {
                let phrase = format!("{} {}, 2025", name, day);
                let iso = to_iso(&resolve(&phrase, today));
                assert_eq!(iso, format!("2025-{:02}-{:02}", i + 1, day), "{}", phrase);
            }
        }
    }

    #[test]
    fn finds_embedded_cjk_date() {
        assert_eq!(find_cjk_date("`2025年11月24日 (週一)`"), Some("2025年11月24日"));
        assert_eq!(find_cjk_date("（未知）"), None);
    }
}
