//! Exchange-local calendar helpers. Session boundaries follow the local
//! calendar day, not UTC midnight.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Local date-time of an epoch-second timestamp.
pub fn local_datetime(time: i64, tz: Tz) -> Option<DateTime<Tz>> {
    Utc.timestamp_opt(time, 0)
        .single()
        .map(|dt| dt.with_timezone(&tz))
}

/// Session (local calendar) date of an epoch-second timestamp.
pub fn session_date(time: i64, tz: Tz) -> Option<NaiveDate> {
    local_datetime(time, tz).map(|dt| dt.date_naive())
}

/// Local wall-clock time of an epoch-second timestamp.
pub fn local_time(time: i64, tz: Tz) -> Option<NaiveTime> {
    local_datetime(time, tz).map(|dt| dt.time())
}

/// Date a daily/weekly bar is labelled with. Bars are stamped at UTC midnight
/// (or the exchange open), so the UTC date is the bar's trading date.
pub fn bar_date(time: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(time, 0).map(|dt| dt.date_naive())
}

/// `(iso year, iso week)` key for weekly grouping.
pub fn week_key(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// `(year, month)` key for monthly grouping.
pub fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_date_is_local() {
        // 2024-06-04 02:00 UTC is still June 3rd in New York.
        let time = 1_717_466_400;
        let date = session_date(time, chrono_tz::America::New_York).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(bar_date(time), NaiveDate::from_ymd_opt(2024, 6, 4));
    }
}
