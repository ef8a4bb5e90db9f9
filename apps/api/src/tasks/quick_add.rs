//! Quick-add parser: turns one line of free text into a task draft.
//!
//! Recognised tokens (anywhere in the line, case-insensitive):
//! `#tag`, `!high` / `!p1`, `@contact` / `@"Full Name"`, `+company`,
//! date phrases (`today`, `tomorrow`, `friday`, `next week`, `in 3 days`,
//! `2026-11-02`, `11/02`), times (`at 14:30`, `3pm`) and recurrences
//! (`daily`, `every weekday`, `every monday`, `monthly`).
//! Whatever is left over becomes the title.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use regex::{Captures, Regex};
use serde::Serialize;
use uuid::Uuid;

use crate::models::task::{Recurrence, TaskPriority};

const DEFAULT_HOUR: u32 = 9;
const TONIGHT_HOUR: u32 = 20;

static CONTACT_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(^|\s)@"([^"]+)""#).expect("valid regex"));
static CONTACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)@(\w[\w.\-']*)").expect("valid regex"));
static JOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)\+(\w[\w.\-&]*)").expect("valid regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)#(\w[\w\-]*)").expect("valid regex"));
static PRIORITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|\s)!(urgent|high|medium|med|low|p[0-3])\b").expect("valid regex")
});
static RECURRENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:every\s+(day|weekday|week|month|monday|mon|tuesday|tues|tue|wednesday|wed|thursday|thurs|thur|thu|friday|fri|saturday|sat|sunday|sun)|(daily|weekdays|weekly|monthly))\b",
    )
    .expect("valid regex")
});
static TIME_MERIDIEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").expect("valid regex")
});
static TIME_AT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\b").expect("valid regex"));
static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:due|by|on)\s+)?(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex")
});
static IN_DAYS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:due|by)\s+)?in\s+(\d{1,3})\s+(days?|weeks?)\b").expect("valid regex")
});
static NEXT_WEEK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:due|by)\s+)?next\s+week\b").expect("valid regex")
});
static RELATIVE_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:due|by)\s+)?(today|tonight|tomorrow|tmr)\b").expect("valid regex")
});
static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:due|by|on|next)\s+)?(monday|mon|tuesday|tues|tue|wednesday|wed|thursday|thurs|thur|thu|friday|fri|saturday|sat|sunday|sun)\b",
    )
    .expect("valid regex")
});
static SLASH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:due|by|on)\s+)?(\d{1,2})/(\d{1,2})\b").expect("valid regex")
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedQuickAdd {
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub priority: Option<TaskPriority>,
    pub recurrence: Option<Recurrence>,
    pub contact_refs: Vec<String>,
    pub job_refs: Vec<String>,
}

pub fn parse_quick_add(text: &str, now: DateTime<Utc>) -> ParsedQuickAdd {
    let today = now.date_naive();
    let mut rest = text.to_string();

    let mut contact_refs = Vec::new();
    rest = strip_all(&CONTACT_QUOTED_RE, &rest, |caps| {
        contact_refs.push(caps[2].trim().to_string());
    });
    rest = strip_all(&CONTACT_RE, &rest, |caps| {
        contact_refs.push(trim_ref(&caps[2]));
    });

    let mut job_refs = Vec::new();
    rest = strip_all(&JOB_RE, &rest, |caps| {
        job_refs.push(trim_ref(&caps[2]));
    });

    let mut tags: Vec<String> = Vec::new();
    rest = strip_all(&TAG_RE, &rest, |caps| {
        let tag = caps[2].to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    });

    let mut priority = None;
    rest = strip_all(&PRIORITY_RE, &rest, |caps| {
        // Last one wins, matching how people correct themselves mid-line.
        priority = parse_priority(&caps[2]);
    });

    let mut recurrence = None;
    let mut recurrence_anchor = None;
    let found = RECURRENCE_RE.captures(&rest).map(|caps| {
        let word = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();
        let range = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        (word, range)
    });
    if let Some((word, range)) = found {
        let (rec, anchor) = match word.as_str() {
            "day" | "daily" => (Recurrence::Daily, None),
            "weekday" | "weekdays" => (Recurrence::Weekdays, None),
            "week" | "weekly" => (Recurrence::Weekly, None),
            "month" | "monthly" => (Recurrence::Monthly, None),
            other => (
                Recurrence::Weekly,
                parse_weekday(other).map(|wd| next_weekday(today, wd)),
            ),
        };
        recurrence = Some(rec);
        recurrence_anchor = anchor;
        rest.replace_range(range, " ");
    }

    let mut time = None;
    for re in [&*TIME_MERIDIEM_RE, &*TIME_AT_RE] {
        let hit = re
            .captures(&rest)
            .and_then(|caps| Some((parse_time(&caps)?, caps.get(0)?.range())));
        if let Some((t, range)) = hit {
            time = Some(t);
            rest.replace_range(range, " ");
            break;
        }
    }

    let mut date = None;
    let mut tonight = false;
    if let Some((d, range, is_tonight)) = find_date(&rest, today) {
        date = Some(d);
        tonight = is_tonight;
        rest.replace_range(range, " ");
    }
    let date = date.or(recurrence_anchor);

    let due_at = match (date, time) {
        (Some(d), Some(t)) => Some(at_utc(d, t)),
        (Some(d), None) => {
            let hour = if tonight { TONIGHT_HOUR } else { DEFAULT_HOUR };
            NaiveTime::from_hms_opt(hour, 0, 0).map(|t| at_utc(d, t))
        }
        (None, Some(t)) => {
            let candidate = at_utc(today, t);
            Some(if candidate > now {
                candidate
            } else {
                candidate + Duration::days(1)
            })
        }
        (None, None) => None,
    };

    let title = WHITESPACE_RE
        .replace_all(&rest, " ")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
        .to_string();

    ParsedQuickAdd {
        title,
        due_at,
        tags,
        priority,
        recurrence,
        contact_refs,
        job_refs,
    }
}

/// Removes every match of `re` (keeping the leading whitespace group),
/// handing each capture to `on_match`.
fn strip_all(re: &Regex, text: &str, mut on_match: impl FnMut(&Captures<'_>)) -> String {
    re.replace_all(text, |caps: &Captures<'_>| {
        on_match(caps);
        caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string()
    })
    .into_owned()
}

fn trim_ref(raw: &str) -> String {
    raw.trim_end_matches(|c: char| matches!(c, '.' | ',' | '\'' | '-'))
        .to_string()
}

fn parse_priority(word: &str) -> Option<TaskPriority> {
    match word.to_lowercase().as_str() {
        "urgent" | "p0" => Some(TaskPriority::Urgent),
        "high" | "p1" => Some(TaskPriority::High),
        "medium" | "med" | "p2" => Some(TaskPriority::Medium),
        "low" | "p3" => Some(TaskPriority::Low),
        _ => None,
    }
}

fn parse_weekday(word: &str) -> Option<Weekday> {
    match word.to_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tues" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thurs" | "thur" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Next date falling on `target`, strictly after `today`.
pub fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let mut ahead = (wanted - current).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

fn parse_time(caps: &Captures<'_>) -> Option<NaiveTime> {
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if let Some(meridiem) = caps.get(3) {
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

type DateMatch = (NaiveDate, std::ops::Range<usize>, bool);

/// First date phrase in `text`, in pattern priority order.
fn find_date(text: &str, today: NaiveDate) -> Option<DateMatch> {
    if let Some(caps) = ISO_DATE_RE.captures(text) {
        let parsed = (|| {
            NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            )
        })();
        if let Some(d) = parsed {
            return Some((d, caps.get(0)?.range(), false));
        }
    }

    if let Some(caps) = IN_DAYS_RE.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        let days = if caps[2].to_lowercase().starts_with("week") {
            n * 7
        } else {
            n
        };
        return Some((today + Duration::days(days), caps.get(0)?.range(), false));
    }

    if let Some(m) = NEXT_WEEK_RE.find(text) {
        return Some((next_weekday(today, Weekday::Mon), m.range(), false));
    }

    if let Some(caps) = RELATIVE_DAY_RE.captures(text) {
        let word = caps[1].to_lowercase();
        let (d, tonight) = match word.as_str() {
            "today" => (today, false),
            "tonight" => (today, true),
            _ => (today + Duration::days(1), false),
        };
        return Some((d, caps.get(0)?.range(), tonight));
    }

    if let Some(caps) = WEEKDAY_RE.captures(text) {
        if let Some(wd) = parse_weekday(&caps[1]) {
            return Some((next_weekday(today, wd), caps.get(0)?.range(), false));
        }
    }

    if let Some(caps) = SLASH_DATE_RE.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        if let Some(this_year) = NaiveDate::from_ymd_opt(today.year(), month, day) {
            let d = if this_year < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day).unwrap_or(this_year)
            } else {
                this_year
            };
            return Some((d, caps.get(0)?.range(), false));
        }
    }

    None
}

fn at_utc(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Outcome of resolving an `@name` / `+company` reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefMatch {
    Matched { id: Uuid, name: String },
    Ambiguous { candidates: Vec<Uuid> },
    NotFound,
}

impl RefMatch {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            RefMatch::Matched { id, .. } => Some(*id),
            _ => None,
        }
    }
}

fn normalize_name(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '.' | '_' | '-') { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolves `query` against `(id, name)` candidates: exact name first,
/// then first word, then substring. The first tier with hits decides.
pub fn resolve_ref(query: &str, candidates: &[(Uuid, String)]) -> RefMatch {
    let q = normalize_name(query);
    if q.is_empty() {
        return RefMatch::NotFound;
    }
    let normalized: Vec<(Uuid, &str, String)> = candidates
        .iter()
        .map(|(id, name)| (*id, name.as_str(), normalize_name(name)))
        .collect();

    let tiers: [&dyn Fn(&str) -> bool; 3] = [
        &|n: &str| n == q,
        &|n: &str| n.split(' ').next() == Some(q.as_str()),
        &|n: &str| n.contains(q.as_str()),
    ];

    for tier in tiers {
        let hits: Vec<&(Uuid, &str, String)> =
            normalized.iter().filter(|(_, _, n)| tier(n)).collect();
        match hits.as_slice() {
            [] => continue,
            [(id, name, _)] => {
                return RefMatch::Matched {
                    id: *id,
                    name: name.to_string(),
                }
            }
            many => {
                return RefMatch::Ambiguous {
                    candidates: many.iter().map(|(id, _, _)| *id).collect(),
                }
            }
        }
    }
    RefMatch::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wednesday 2026-10-14, 10:00 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 10, 0, 0).unwrap()
    }

    fn ymd_h(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_plain_text_is_title() {
        let p = parse_quick_add("Update resume summary", now());
        assert_eq!(p.title, "Update resume summary");
        assert_eq!(p.due_at, None);
        assert!(p.tags.is_empty());
        assert_eq!(p.priority, None);
    }

    #[test]
    fn test_tags_priority_and_refs() {
        let p = parse_quick_add("Ping @dana about +Acme intro #networking #Referral !high", now());
        assert_eq!(p.title, "Ping about intro");
        assert_eq!(p.tags, vec!["networking", "referral"]);
        assert_eq!(p.priority, Some(TaskPriority::High));
        assert_eq!(p.contact_refs, vec!["dana"]);
        assert_eq!(p.job_refs, vec!["Acme"]);
    }

    #[test]
    fn test_quoted_contact() {
        let p = parse_quick_add(r#"Coffee with @"Dana Smith" tomorrow"#, now());
        assert_eq!(p.contact_refs, vec!["Dana Smith"]);
        assert_eq!(p.title, "Coffee with");
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 15, 9, 0)));
    }

    #[test]
    fn test_numeric_priority() {
        assert_eq!(
            parse_quick_add("x !p0", now()).priority,
            Some(TaskPriority::Urgent)
        );
        assert_eq!(
            parse_quick_add("x !P3", now()).priority,
            Some(TaskPriority::Low)
        );
    }

    #[test]
    fn test_tomorrow_with_meridiem_time() {
        let p = parse_quick_add("Call recruiter tomorrow at 3pm", now());
        assert_eq!(p.title, "Call recruiter");
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 15, 15, 0)));
    }

    #[test]
    fn test_tonight_defaults_to_evening() {
        let p = parse_quick_add("Prep questions tonight", now());
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 14, 20, 0)));
    }

    #[test]
    fn test_weekday_is_strictly_after_today() {
        // today is Wednesday: "wednesday" means next week's
        let p = parse_quick_add("Send thank-you note by wednesday", now());
        assert_eq!(p.title, "Send thank-you note");
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 21, 9, 0)));

        let p = parse_quick_add("Submit take-home fri", now());
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 16, 9, 0)));
    }

    #[test]
    fn test_next_week_is_next_monday() {
        let p = parse_quick_add("Plan outreach next week", now());
        assert_eq!(p.title, "Plan outreach");
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 19, 9, 0)));
    }

    #[test]
    fn test_in_n_days_and_weeks() {
        let p = parse_quick_add("Check in in 3 days", now());
        assert_eq!(p.title, "Check in");
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 17, 9, 0)));

        let p = parse_quick_add("Revisit offer in 2 weeks", now());
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 28, 9, 0)));
    }

    #[test]
    fn test_iso_date_with_24h_time() {
        let p = parse_quick_add("Onsite 2026-11-02 at 13:45", now());
        assert_eq!(p.title, "Onsite");
        assert_eq!(p.due_at, Some(ymd_h(2026, 11, 2, 13, 45)));
    }

    #[test]
    fn test_invalid_iso_date_stays_in_title() {
        let p = parse_quick_add("Ticket 2026-13-40", now());
        assert_eq!(p.due_at, None);
        assert_eq!(p.title, "Ticket 2026-13-40");
    }

    #[test]
    fn test_slash_date_rolls_to_next_year_when_past() {
        let p = parse_quick_add("Renew cert 3/15", now());
        assert_eq!(p.due_at, Some(ymd_h(2027, 3, 15, 9, 0)));

        let p = parse_quick_add("Career fair 11/05", now());
        assert_eq!(p.due_at, Some(ymd_h(2026, 11, 5, 9, 0)));
    }

    #[test]
    fn test_time_only_picks_next_occurrence() {
        // 10:00 now: 9am already passed, 4pm has not
        let p = parse_quick_add("Standup 9am", now());
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 15, 9, 0)));
        let p = parse_quick_add("Standup 4pm", now());
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 14, 16, 0)));
    }

    #[test]
    fn test_twelve_am_and_pm() {
        let p = parse_quick_add("Deadline tomorrow 12am", now());
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 15, 0, 0)));
        let p = parse_quick_add("Lunch tomorrow 12pm", now());
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 15, 12, 0)));
    }

    #[test]
    fn test_recurrence_words() {
        assert_eq!(
            parse_quick_add("Apply to 3 roles daily", now()).recurrence,
            Some(Recurrence::Daily)
        );
        assert_eq!(
            parse_quick_add("Check inbox every weekday", now()).recurrence,
            Some(Recurrence::Weekdays)
        );
        assert_eq!(
            parse_quick_add("Review pipeline every month", now()).recurrence,
            Some(Recurrence::Monthly)
        );
        let p = parse_quick_add("Write weekly update weekly", now());
        assert_eq!(p.recurrence, Some(Recurrence::Weekly));
    }

    #[test]
    fn test_every_weekday_name_anchors_due_date() {
        let p = parse_quick_add("LeetCode session every monday", now());
        assert_eq!(p.recurrence, Some(Recurrence::Weekly));
        assert_eq!(p.title, "LeetCode session");
        assert_eq!(p.due_at, Some(ymd_h(2026, 10, 19, 9, 0)));
    }

    #[test]
    fn test_title_strips_dangling_punctuation() {
        let p = parse_quick_add("Follow up - @sam,", now());
        assert_eq!(p.title, "Follow up");
        assert_eq!(p.contact_refs, vec!["sam"]);
    }

    #[test]
    fn test_empty_input() {
        let p = parse_quick_add("   ", now());
        assert_eq!(p.title, "");
        assert_eq!(p.due_at, None);
    }

    #[test]
    fn test_next_weekday_wraps() {
        let wed = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        assert_eq!(
            next_weekday(wed, Weekday::Tue),
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
        );
        assert_eq!(
            next_weekday(wed, Weekday::Thu),
            NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
        );
    }

    fn people() -> Vec<(Uuid, String)> {
        vec![
            (Uuid::from_u128(1), "Dana Smith".to_string()),
            (Uuid::from_u128(2), "Dan Brown".to_string()),
            (Uuid::from_u128(3), "Alex Kim".to_string()),
            (Uuid::from_u128(4), "Alex Rivera".to_string()),
        ]
    }

    #[test]
    fn test_resolve_exact_name() {
        assert_eq!(
            resolve_ref("dana.smith", &people()),
            RefMatch::Matched {
                id: Uuid::from_u128(1),
                name: "Dana Smith".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_first_name_beats_substring() {
        // "dan" is a substring of "dana smith" but the first name of Dan Brown
        assert_eq!(resolve_ref("dan", &people()).id(), Some(Uuid::from_u128(2)));
    }

    #[test]
    fn test_resolve_ambiguous_first_name() {
        assert_eq!(
            resolve_ref("alex", &people()),
            RefMatch::Ambiguous {
                candidates: vec![Uuid::from_u128(3), Uuid::from_u128(4)]
            }
        );
    }

    #[test]
    fn test_resolve_substring_and_missing() {
        assert_eq!(resolve_ref("rivera", &people()).id(), Some(Uuid::from_u128(4)));
        assert_eq!(resolve_ref("zed", &people()), RefMatch::NotFound);
        assert_eq!(resolve_ref("", &people()), RefMatch::NotFound);
    }
}
