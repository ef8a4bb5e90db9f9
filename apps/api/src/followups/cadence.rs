//! Follow-up cadence: a nudge every 3 days, at most 3 attempts per outreach.

use chrono::{DateTime, Duration, Utc};

pub const FOLLOW_UP_INTERVAL_DAYS: i64 = 3;
pub const MAX_ATTEMPTS: i32 = 3;

/// Due date of a follow-up scheduled from `from`.
pub fn due_after(from: DateTime<Utc>) -> DateTime<Utc> {
    from + Duration::days(FOLLOW_UP_INTERVAL_DAYS)
}

/// What happens after follow-up `attempt` is sent at `sent_at` while the
/// outreach is still unanswered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CadenceStep {
    Schedule { attempt: i32, due_at: DateTime<Utc> },
    GiveUp,
}

pub fn after_sent(attempt: i32, sent_at: DateTime<Utc>) -> CadenceStep {
    if attempt >= MAX_ATTEMPTS {
        CadenceStep::GiveUp
    } else {
        CadenceStep::Schedule {
            attempt: attempt + 1,
            due_at: due_after(sent_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_first_follow_up_is_three_days_out() {
        let sent = Utc.with_ymd_and_hms(2026, 10, 1, 15, 30, 0).unwrap();
        assert_eq!(
            due_after(sent),
            Utc.with_ymd_and_hms(2026, 10, 4, 15, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_next_attempt_counts_from_send_time() {
        let sent = Utc.with_ymd_and_hms(2026, 10, 9, 8, 0, 0).unwrap();
        assert_eq!(
            after_sent(1, sent),
            CadenceStep::Schedule {
                attempt: 2,
                due_at: Utc.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap(),
            }
        );
        assert!(matches!(
            after_sent(2, sent),
            CadenceStep::Schedule { attempt: 3, .. }
        ));
    }

    #[test]
    fn test_no_fourth_attempt() {
        let sent = Utc::now();
        assert_eq!(after_sent(MAX_ATTEMPTS, sent), CadenceStep::GiveUp);
        assert_eq!(after_sent(MAX_ATTEMPTS + 1, sent), CadenceStep::GiveUp);
    }
}
