//! Month-end and business-day (Mon–Fri) calendar helpers.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

/// Whether `date` falls on Monday to Friday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Business days from `start` to `end` inclusive.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .collect()
}

/// The `count` business days strictly after `after`.
pub fn next_business_days(after: NaiveDate, count: usize) -> Vec<NaiveDate> {
    after
        .checked_add_days(Days::new(1))
        .map(|start| {
            start
                .iter_days()
                .filter(|d| is_business_day(*d))
                .take(count)
                .collect()
        })
        .unwrap_or_default()
}
