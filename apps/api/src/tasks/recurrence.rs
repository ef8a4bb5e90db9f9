use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

use crate::models::task::Recurrence;

/// Due time of the next occurrence after `from`. Time of day is kept.
///
/// MONTHLY lands on `anchor_day`, clamped to the length of the target month,
/// so a series started on the 31st returns to the 31st after February.
pub fn next_due(recurrence: Recurrence, from: DateTime<Utc>, anchor_day: u32) -> DateTime<Utc> {
    match recurrence {
        Recurrence::Daily => from + Duration::days(1),
        Recurrence::Weekly => from + Duration::days(7),
        Recurrence::Weekdays => {
            let mut next = from + Duration::days(1);
            while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
                next += Duration::days(1);
            }
            next
        }
        Recurrence::Monthly => {
            let date = from.date_naive();
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            let day = anchor_day.clamp(1, 31).min(days_in_month(year, month));
            NaiveDate::from_ymd_opt(year, month, day)
                .map(|d| Utc.from_utc_datetime(&d.and_time(from.time())))
                .unwrap_or(from + Duration::days(30))
        }
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn test_daily_and_weekly() {
        assert_eq!(next_due(Recurrence::Daily, at(2026, 3, 10, 9), 10), at(2026, 3, 11, 9));
        assert_eq!(next_due(Recurrence::Weekly, at(2026, 3, 10, 9), 10), at(2026, 3, 17, 9));
    }

    #[test]
    fn test_weekdays_skip_weekend() {
        // 2026-03-13 is a Friday
        assert_eq!(
            next_due(Recurrence::Weekdays, at(2026, 3, 13, 8), 13),
            at(2026, 3, 16, 8)
        );
        // Saturday rolls to Monday too
        assert_eq!(
            next_due(Recurrence::Weekdays, at(2026, 3, 14, 8), 14),
            at(2026, 3, 16, 8)
        );
        // Tuesday -> Wednesday
        assert_eq!(
            next_due(Recurrence::Weekdays, at(2026, 3, 10, 8), 10),
            at(2026, 3, 11, 8)
        );
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        assert_eq!(next_due(Recurrence::Monthly, at(2026, 1, 31, 9), 31), at(2026, 2, 28, 9));
        assert_eq!(next_due(Recurrence::Monthly, at(2028, 1, 31, 9), 31), at(2028, 2, 29, 9));
        assert_eq!(next_due(Recurrence::Monthly, at(2026, 12, 15, 9), 15), at(2027, 1, 15, 9));
    }

    #[test]
    fn test_monthly_returns_to_anchor_after_short_month() {
        let feb = next_due(Recurrence::Monthly, at(2026, 1, 31, 9), 31);
        let mar = next_due(Recurrence::Monthly, feb, 31);
        let apr = next_due(Recurrence::Monthly, mar, 31);
        assert_eq!(feb, at(2026, 2, 28, 9));
        assert_eq!(mar, at(2026, 3, 31, 9));
        assert_eq!(apr, at(2026, 4, 30, 9));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2026, 12), 31);
        assert_eq!(days_in_month(2026, 4), 30);
    }
}
