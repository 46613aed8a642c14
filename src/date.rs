//! Pure date helpers: parsing the `DD-MM-YYYY` string formats the config
//! uses, and the weekend/holiday predicates the constraint checker and
//! builder both depend on.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use log::warn;

const DATE_FORMAT: &str = "%d-%m-%Y";

/// Parse a semicolon-separated list of `DD-MM-YYYY` dates. Malformed
/// entries are logged and skipped rather than aborting the whole parse,
/// per the error-handling policy for range/date strings.
pub fn parse_dates(s: &str) -> Vec<NaiveDate> {
    s.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match NaiveDate::parse_from_str(part, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(err) => {
                warn!("skipping malformed date '{part}': {err}");
                None
            }
        })
        .collect()
}

/// Parse a semicolon-separated list of ranges. Each entry is either a
/// single `DD-MM-YYYY` date (a one-day range) or `DD-MM-YYYY - DD-MM-YYYY`
/// (inclusive). Malformed entries are logged and skipped.
pub fn parse_ranges(s: &str) -> Vec<(NaiveDate, NaiveDate)> {
    s.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match parse_one_range(part) {
            Ok(range) => Some(range),
            Err(err) => {
                warn!("skipping malformed range '{part}': {err}");
                None
            }
        })
        .collect()
}

fn parse_one_range(part: &str) -> Result<(NaiveDate, NaiveDate), String> {
    if let Some((start_s, end_s)) = part.split_once(" - ") {
        let start = NaiveDate::parse_from_str(start_s.trim(), DATE_FORMAT)
            .map_err(|e| e.to_string())?;
        let end = NaiveDate::parse_from_str(end_s.trim(), DATE_FORMAT)
            .map_err(|e| e.to_string())?;
        if start > end {
            return Err(format!("range start {start} is after end {end}"));
        }
        Ok((start, end))
    } else {
        let date = NaiveDate::parse_from_str(part.trim(), DATE_FORMAT).map_err(|e| e.to_string())?;
        Ok((date, date))
    }
}

/// A date is a holiday if it's in the configured holiday set.
pub fn is_holiday(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    holidays.contains(&date)
}

/// A date is a pre-holiday if the following day is a holiday.
pub fn is_pre_holiday(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    holidays.contains(&(date + Duration::days(1)))
}

/// Weekend-like: Fri/Sat/Sun, a holiday, or the day before a holiday.
pub fn is_weekend_like(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    matches!(date.weekday(), Weekday::Fri | Weekday::Sat | Weekday::Sun)
        || is_holiday(date, holidays)
        || is_pre_holiday(date, holidays)
}

/// Effective weekday: a holiday is treated as Sunday, a pre-holiday as
/// Friday, otherwise the calendar weekday. Returned as `num_days_from_monday`
/// (Mon=0 .. Sun=6), matching the spec's 0..6 indexing.
pub fn effective_weekday(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> u32 {
    if is_holiday(date, holidays) {
        6
    } else if is_pre_holiday(date, holidays) {
        4
    } else {
        date.weekday().num_days_from_monday()
    }
}

/// Map a weekend-like date to the Friday that starts its cluster (or the
/// pre-holiday/holiday date itself if it starts one).
pub fn weekend_start(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> NaiveDate {
    debug_assert!(is_weekend_like(date, holidays));
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}

/// Inclusive day iterator over `[start, end]`.
pub fn iter_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let mut current = start;
    std::iter::from_fn(move || {
        if current > end {
            None
        } else {
            let d = current;
            current += Duration::days(1);
            Some(d)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_date_list() {
        let dates = parse_dates("01-01-2024;15-03-2024");
        assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 3, 15)]);
    }

    #[test]
    fn skips_malformed_date_entries() {
        let dates = parse_dates("01-01-2024;not-a-date;15-03-2024");
        assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 3, 15)]);
    }

    #[test]
    fn parses_mixed_ranges_and_singles() {
        let ranges = parse_ranges("01-01-2024 - 05-01-2024;10-01-2024");
        assert_eq!(ranges, vec![(d(2024, 1, 1), d(2024, 1, 5)), (d(2024, 1, 10), d(2024, 1, 10))]);
    }

    #[test]
    fn weekend_like_covers_fri_sat_sun_and_holiday_adjacency() {
        let mut holidays = HashSet::new();
        holidays.insert(d(2024, 1, 10)); // Wednesday holiday
        assert!(is_weekend_like(d(2024, 1, 5), &holidays)); // Friday
        assert!(is_weekend_like(d(2024, 1, 6), &holidays)); // Saturday
        assert!(is_weekend_like(d(2024, 1, 7), &holidays)); // Sunday
        assert!(is_weekend_like(d(2024, 1, 9), &holidays)); // pre-holiday
        assert!(is_weekend_like(d(2024, 1, 10), &holidays)); // holiday
        assert!(!is_weekend_like(d(2024, 1, 8), &holidays)); // plain Monday
    }

    #[test]
    fn effective_weekday_maps_holiday_and_pre_holiday() {
        let mut holidays = HashSet::new();
        holidays.insert(d(2024, 1, 10)); // Wednesday
        assert_eq!(effective_weekday(d(2024, 1, 10), &holidays), 6);
        assert_eq!(effective_weekday(d(2024, 1, 9), &holidays), 4);
        assert_eq!(effective_weekday(d(2024, 1, 8), &holidays), 0);
    }

    #[test]
    fn weekend_start_maps_cluster_to_friday() {
        let holidays = HashSet::new();
        assert_eq!(weekend_start(d(2024, 1, 6), &holidays), d(2024, 1, 5));
        assert_eq!(weekend_start(d(2024, 1, 7), &holidays), d(2024, 1, 5));
        assert_eq!(weekend_start(d(2024, 1, 5), &holidays), d(2024, 1, 5));
    }
}
