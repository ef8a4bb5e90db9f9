//! Next-best-action ranking.
//!
//! Every candidate gets a fixed score by kind (plus a small bonus for some
//! kinds), then the list is sorted by score descending, due date ascending
//! and title.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::grow::store::EventFollowUpRow;
use crate::jobs::heat::JobHeat;
use crate::models::grow::{BoostTaskRow, EventRow};
use crate::models::job::{JobRow, JobStage};
use crate::models::outreach::FollowUpRow;
use crate::models::task::{TaskPriority, TaskRow};
use crate::tasks::store::day_bounds;

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 20;

pub const HOT_JOB_IDLE_DAYS: i64 = 5;
pub const STALE_APPLICATION_DAYS: i64 = 7;
pub const EVENT_LOOKAHEAD_DAYS: i64 = 2;
pub const THIN_PIPELINE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FollowUpOverdue,
    FollowUpDue,
    TaskOverdue,
    ReviveHotJob,
    NudgeApplication,
    EventFollowUp,
    PrepareEvent,
    GrowPipeline,
    Boost,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextAction {
    pub kind: ActionKind,
    pub title: String,
    pub reason: String,
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
}

/// A snapshot of the user's open work.
#[derive(Debug, Default)]
pub struct ActionInputs<'a> {
    pub pending_followups: &'a [FollowUpRow],
    /// `(id, name)` of the user's contacts.
    pub contact_names: &'a [(Uuid, String)],
    pub open_tasks: &'a [TaskRow],
    /// Non-archived, non-terminal jobs with their current heat.
    pub active_jobs: &'a [(JobRow, JobHeat)],
    pub event_follow_ups: &'a [EventFollowUpRow],
    pub upcoming_events: &'a [EventRow],
    pub open_boosts: &'a [BoostTaskRow],
}

pub fn overdue_task_score(priority: TaskPriority) -> i32 {
    match priority {
        TaskPriority::Urgent => 85,
        TaskPriority::High => 80,
        TaskPriority::Medium => 70,
        TaskPriority::Low => 60,
    }
}

pub fn next_actions(inputs: &ActionInputs<'_>, now: DateTime<Utc>, limit: usize) -> Vec<NextAction> {
    let (today, tomorrow) = day_bounds(now);
    let mut actions = Vec::new();

    for f in inputs.pending_followups.iter().filter(|f| f.is_open()) {
        let name = inputs
            .contact_names
            .iter()
            .find(|(id, _)| *id == f.contact_id)
            .map(|(_, name)| name.as_str())
            .unwrap_or("your contact");
        let title = format!("Follow up with {name}");
        if f.due_at < today {
            let days = (today - f.due_at).num_days() + 1;
            actions.push(NextAction {
                kind: ActionKind::FollowUpOverdue,
                title,
                reason: format!("Follow-up #{} is {} overdue", f.attempt, plural_days(days)),
                score: 100 + days.min(10) as i32,
                entity_type: Some("followup"),
                entity_id: Some(f.id),
                due_at: Some(f.due_at),
            });
        } else if f.due_at < tomorrow {
            actions.push(NextAction {
                kind: ActionKind::FollowUpDue,
                title,
                reason: format!("Follow-up #{} is due today", f.attempt),
                score: 90,
                entity_type: Some("followup"),
                entity_id: Some(f.id),
                due_at: Some(f.due_at),
            });
        }
    }

    for t in inputs.open_tasks.iter().filter(|t| t.is_open()) {
        let Some(due_at) = t.due_at.filter(|d| *d < today) else {
            continue;
        };
        let priority = t.priority();
        actions.push(NextAction {
            kind: ActionKind::TaskOverdue,
            title: t.title.clone(),
            reason: format!("{priority} priority task overdue since {}", due_at.format("%b %-d")),
            score: overdue_task_score(priority),
            entity_type: Some("task"),
            entity_id: Some(t.id),
            due_at: Some(due_at),
        });
    }

    let jobs_with_followup: HashSet<Uuid> = inputs
        .pending_followups
        .iter()
        .filter(|f| f.is_open())
        .filter_map(|f| f.job_id)
        .collect();

    for (job, heat) in inputs.active_jobs {
        let idle = now - job.last_touch_at;
        if heat.level >= 2 && idle >= Duration::days(HOT_JOB_IDLE_DAYS) {
            actions.push(NextAction {
                kind: ActionKind::ReviveHotJob,
                title: format!("Check in on {} at {}", job.role, job.company),
                reason: format!(
                    "{} job untouched for {}",
                    heat.label,
                    plural_days(idle.num_days())
                ),
                score: 65 + heat.level as i32,
                entity_type: Some("job"),
                entity_id: Some(job.id),
                due_at: None,
            });
        } else if job.stage() == JobStage::Applied
            && idle >= Duration::days(STALE_APPLICATION_DAYS)
            && !jobs_with_followup.contains(&job.id)
        {
            actions.push(NextAction {
                kind: ActionKind::NudgeApplication,
                title: format!("Nudge your application to {}", job.company),
                reason: format!(
                    "No movement on {} for {}",
                    job.role,
                    plural_days(idle.num_days())
                ),
                score: 55,
                entity_type: Some("job"),
                entity_id: Some(job.id),
                due_at: None,
            });
        }
    }

    for ef in inputs
        .event_follow_ups
        .iter()
        .filter(|ef| ef.follow_up_due_at <= now)
    {
        actions.push(NextAction {
            kind: ActionKind::EventFollowUp,
            title: format!("Follow up with {}", ef.contact_name),
            reason: format!("You met at {}", ef.event_name),
            score: 50,
            entity_type: Some("contact"),
            entity_id: Some(ef.contact_id),
            due_at: Some(ef.follow_up_due_at),
        });
    }

    let horizon = now + Duration::days(EVENT_LOOKAHEAD_DAYS);
    for e in inputs
        .upcoming_events
        .iter()
        .filter(|e| e.starts_at >= now && e.starts_at <= horizon)
    {
        actions.push(NextAction {
            kind: ActionKind::PrepareEvent,
            title: format!("Prepare for {}", e.name),
            reason: format!("Starts {}", e.starts_at.format("%a %b %-d %H:%M UTC")),
            score: 45,
            entity_type: Some("event"),
            entity_id: Some(e.id),
            due_at: Some(e.starts_at),
        });
    }

    if inputs.active_jobs.len() < THIN_PIPELINE {
        actions.push(NextAction {
            kind: ActionKind::GrowPipeline,
            title: "Apply to more roles".to_string(),
            reason: format!(
                "Only {} active application{} in the pipeline",
                inputs.active_jobs.len(),
                if inputs.active_jobs.len() == 1 { "" } else { "s" }
            ),
            score: 40,
            entity_type: None,
            entity_id: None,
            due_at: None,
        });
    }

    if let Some(boost) = inputs
        .open_boosts
        .iter()
        .filter(|b| b.completed_at.is_none())
        .max_by(|a, b| a.impact.cmp(&b.impact).then(b.created_at.cmp(&a.created_at)))
    {
        actions.push(NextAction {
            kind: ActionKind::Boost,
            title: boost.title.clone(),
            reason: format!("Highest-impact boost ({}/5)", boost.impact),
            score: 20 + boost.impact,
            entity_type: Some("boost"),
            entity_id: Some(boost.id),
            due_at: None,
        });
    }

    actions.sort_by(compare_actions);
    actions.truncate(limit);
    actions
}

fn compare_actions(a: &NextAction, b: &NextAction) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| match (a.due_at, b.due_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.title.cmp(&b.title))
}

fn plural_days(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::types::Json;

    use crate::jobs::heat::HeatLabel;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 10, 0, 0).unwrap()
    }

    fn followup(due_at: DateTime<Utc>, job_id: Option<Uuid>) -> FollowUpRow {
        FollowUpRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            outreach_id: Uuid::new_v4(),
            contact_id: Uuid::new_v4(),
            job_id,
            attempt: 1,
            due_at,
            sent_at: None,
            cancelled_at: None,
            note: None,
            created_at: due_at - Duration::days(3),
        }
    }

    fn task(title: &str, priority: &str, due_at: Option<DateTime<Utc>>) -> TaskRow {
        TaskRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            title: title.to_string(),
            description: None,
            status: "TODO".to_string(),
            priority: priority.to_string(),
            due_at,
            tags: vec![],
            checklist: Json(vec![]),
            recurrence: None,
            recurrence_day: None,
            job_id: None,
            contact_id: None,
            grow_type: None,
            grow_id: None,
            completed_at: None,
            created_at: now() - Duration::days(10),
            updated_at: now() - Duration::days(10),
        }
    }

    fn job(company: &str, stage: &str, idle_days: i64) -> JobRow {
        let touched = now() - Duration::days(idle_days);
        JobRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            company: company.to_string(),
            role: "Engineer".to_string(),
            url: None,
            source: None,
            location: None,
            salary: None,
            notes: None,
            stage: stage.to_string(),
            last_touch_at: touched,
            archived_at: None,
            created_at: touched,
            updated_at: touched,
        }
    }

    fn heat(level: u8) -> JobHeat {
        let label = match level {
            0 => HeatLabel::Cold,
            1 => HeatLabel::Warm,
            2 => HeatLabel::Hot,
            _ => HeatLabel::OnFire,
        };
        JobHeat {
            score: level as u32 * 25,
            level,
            label,
        }
    }

    fn pipeline(n: usize) -> Vec<(JobRow, JobHeat)> {
        (0..n).map(|i| (job(&format!("Co{i}"), "HR", 0), heat(1))).collect()
    }

    #[test]
    fn test_overdue_follow_up_outranks_everything() {
        let followups = vec![
            followup(now() - Duration::days(4), None),
            followup(now() + Duration::hours(2), None),
        ];
        let tasks = vec![task("Send thank-you", "URGENT", Some(now() - Duration::days(2)))];
        let jobs = pipeline(5);
        let inputs = ActionInputs {
            pending_followups: &followups,
            open_tasks: &tasks,
            active_jobs: &jobs,
            ..Default::default()
        };

        let actions = next_actions(&inputs, now(), 10);
        let kinds: Vec<_> = actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::FollowUpOverdue,
                ActionKind::FollowUpDue,
                ActionKind::TaskOverdue
            ]
        );
        assert_eq!(actions[0].score, 104);
        assert_eq!(actions[1].score, 90);
        assert_eq!(actions[2].score, 85);
    }

    #[test]
    fn test_overdue_bonus_caps_at_ten_days() {
        let followups = vec![followup(now() - Duration::days(40), None)];
        let jobs = pipeline(5);
        let inputs = ActionInputs {
            pending_followups: &followups,
            active_jobs: &jobs,
            ..Default::default()
        };
        assert_eq!(next_actions(&inputs, now(), 5)[0].score, 110);
    }

    #[test]
    fn test_follow_up_title_uses_contact_name() {
        let f = followup(now(), None);
        let names = vec![(f.contact_id, "Priya Raman".to_string())];
        let followups = vec![f];
        let jobs = pipeline(5);
        let inputs = ActionInputs {
            pending_followups: &followups,
            contact_names: &names,
            active_jobs: &jobs,
            ..Default::default()
        };
        assert_eq!(next_actions(&inputs, now(), 5)[0].title, "Follow up with Priya Raman");
    }

    #[test]
    fn test_tasks_due_today_or_later_are_not_overdue() {
        let tasks = vec![
            task("Later", "URGENT", Some(now() + Duration::days(1))),
            task("This morning", "HIGH", Some(now() - Duration::hours(2))),
            task("Undated", "HIGH", None),
        ];
        let jobs = pipeline(5);
        let inputs = ActionInputs {
            open_tasks: &tasks,
            active_jobs: &jobs,
            ..Default::default()
        };
        assert!(next_actions(&inputs, now(), 10).is_empty());
    }

    #[test]
    fn test_hot_idle_job_and_stale_application() {
        let mut jobs = pipeline(4);
        jobs.push((job("Hotco", "TECH", 6), heat(3)));
        jobs.push((job("Staleco", "APPLIED", 9), heat(0)));
        let inputs = ActionInputs {
            active_jobs: &jobs,
            ..Default::default()
        };

        let actions = next_actions(&inputs, now(), 10);
        assert_eq!(actions[0].kind, ActionKind::ReviveHotJob);
        assert_eq!(actions[0].score, 68);
        assert_eq!(actions[1].kind, ActionKind::NudgeApplication);
        assert_eq!(actions[1].score, 55);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_stale_application_with_pending_follow_up_is_skipped() {
        let mut jobs = pipeline(5);
        let stale = job("Staleco", "APPLIED", 9);
        let followups = vec![followup(now() + Duration::days(2), Some(stale.id))];
        jobs.push((stale, heat(0)));
        let inputs = ActionInputs {
            pending_followups: &followups,
            active_jobs: &jobs,
            ..Default::default()
        };
        assert!(next_actions(&inputs, now(), 10).is_empty());
    }

    #[test]
    fn test_thin_pipeline_and_boost() {
        let boosts = vec![
            BoostTaskRow {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                title: "Write a blog post".to_string(),
                category: "CONTENT".to_string(),
                impact: 2,
                completed_at: None,
                created_at: now(),
            },
            BoostTaskRow {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                title: "Polish portfolio".to_string(),
                category: "PORTFOLIO".to_string(),
                impact: 5,
                completed_at: None,
                created_at: now(),
            },
        ];
        let inputs = ActionInputs {
            open_boosts: &boosts,
            ..Default::default()
        };

        let actions = next_actions(&inputs, now(), 5);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind, ActionKind::GrowPipeline);
        assert_eq!(actions[0].reason, "Only 0 active applications in the pipeline");
        assert_eq!(actions[1].kind, ActionKind::Boost);
        assert_eq!(actions[1].title, "Polish portfolio");
        assert_eq!(actions[1].score, 25);
    }

    #[test]
    fn test_events() {
        let soon = EventRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: "RustConf meetup".to_string(),
            location: None,
            url: None,
            starts_at: now() + Duration::days(1),
            status: "PLANNED".to_string(),
            notes: None,
            created_at: now(),
            updated_at: now(),
        };
        let mut far = soon.clone();
        far.starts_at = now() + Duration::days(5);
        let events = vec![soon, far];
        let owed = vec![EventFollowUpRow {
            event_id: Uuid::new_v4(),
            event_name: "Career fair".to_string(),
            contact_id: Uuid::new_v4(),
            contact_name: "Sam Lee".to_string(),
            follow_up_due_at: now() - Duration::days(1),
        }];
        let jobs = pipeline(5);
        let inputs = ActionInputs {
            active_jobs: &jobs,
            upcoming_events: &events,
            event_follow_ups: &owed,
            ..Default::default()
        };

        let actions = next_actions(&inputs, now(), 5);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind, ActionKind::EventFollowUp);
        assert_eq!(actions[0].reason, "You met at Career fair");
        assert_eq!(actions[1].kind, ActionKind::PrepareEvent);
    }

    #[test]
    fn test_limit_and_tie_break() {
        let tasks = vec![
            task("B task", "HIGH", Some(now() - Duration::days(2))),
            task("A task", "HIGH", Some(now() - Duration::days(2))),
            task("Older", "HIGH", Some(now() - Duration::days(5))),
        ];
        let jobs = pipeline(5);
        let inputs = ActionInputs {
            open_tasks: &tasks,
            active_jobs: &jobs,
            ..Default::default()
        };

        let actions = next_actions(&inputs, now(), 2);
        let titles: Vec<_> = actions.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Older", "A task"]);
    }
}
