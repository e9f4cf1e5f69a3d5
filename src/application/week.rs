use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

/// Half-open range `[start, end)` covering one calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

pub fn today_in<Z: TimeZone>(now: DateTime<Utc>, zone: &Z) -> NaiveDate {
    now.with_timezone(zone).date_naive()
}

/// The week containing `day`, running from local midnight on `week_start` to local midnight seven days later.
/// Fails when that week reaches past the range of representable dates.
pub fn week_window<Z: TimeZone>(
    day: NaiveDate,
    week_start: Weekday,
    zone: &Z,
) -> Result<ReportWindow, String> {
    let out_of_range = || format!("the week of {day} is outside the supported date range");
    let offset = (day.weekday().num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7;
    let first_day = day
        .checked_sub_signed(Duration::days(i64::from(offset)))
        .ok_or_else(out_of_range)?;
    let next_first_day = first_day
        .checked_add_signed(Duration::days(7))
        .ok_or_else(out_of_range)?;
    let last_day = next_first_day.pred_opt().ok_or_else(out_of_range)?;

    Ok(ReportWindow {
        start: local_midnight(zone, first_day),
        end: local_midnight(zone, next_first_day),
        first_day,
        last_day,
    })
}

// Some zones skip midnight on DST changes; the first valid instant after it starts the day.
fn local_midnight<Z: TimeZone>(zone: &Z, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    zone.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            midnight
                .checked_add_signed(Duration::hours(1))
                .and_then(|later| zone.from_local_datetime(&later).earliest())
        })
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
