//! Calendar math for walk-forward windows.

use chrono::{Datelike, NaiveDate};

/// Shifts a date by whole years, clamping Feb 29 to Feb 28 in non-leap
/// target years.
pub fn shift_years(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
        .unwrap_or(date)
}

/// In-sample optimization window ending the day before the cycle starts.
pub fn optimization_window(cycle_start: NaiveDate, window_years: u32) -> (NaiveDate, NaiveDate) {
    let start = shift_years(cycle_start, -(window_years as i32));
    let end = cycle_start.pred_opt().unwrap_or(cycle_start);
    (start, end)
}

/// Out-of-sample trading window starting at the cycle start, truncated at
/// the session end.
pub fn trading_window(
    cycle_start: NaiveDate,
    window_years: u32,
    session_end: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let end = shift_years(cycle_start, window_years as i32).min(session_end);
    (cycle_start, end)
}
