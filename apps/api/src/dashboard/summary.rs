//! KPI summary over a trailing window of days.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::dashboard::next_action::NextAction;
use crate::jobs::heat::JobHeat;
use crate::models::contact::ContactStrength;
use crate::models::job::{JobRow, JobStage};
use crate::models::outreach::{FollowUpRow, OutreachOutcome, OutreachRow};
use crate::models::task::TaskRow;
use crate::tasks::store::day_bounds;

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const MAX_WINDOW_DAYS: i64 = 90;
pub const HOTTEST_JOBS: usize = 5;
/// Unanswered outreach younger than this is not yet counted against the
/// response rate.
pub const RESPONSE_GRACE_DAYS: i64 = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageCount {
    pub stage: JobStage,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StrengthCount {
    pub strength: ContactStrength,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HotJob {
    pub id: Uuid,
    pub company: String,
    pub role: String,
    pub stage: JobStage,
    pub heat: JobHeat,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub window_days: i64,
    pub pipeline: Vec<StageCount>,
    pub active_jobs: usize,
    pub applications: i64,
    pub outreach_sent: usize,
    pub responses: usize,
    pub response_rate: f64,
    pub tasks_completed: i64,
    pub followups_due_today: usize,
    pub followups_overdue: usize,
    pub tasks_due_today: usize,
    pub tasks_overdue: usize,
    pub hottest_jobs: Vec<HotJob>,
    pub contact_strength: Vec<StrengthCount>,
    pub next_actions: Vec<NextAction>,
}

pub struct SummaryInputs<'a> {
    pub window_days: i64,
    pub stage_counts: &'a [(String, i64)],
    pub active_jobs: &'a [(JobRow, JobHeat)],
    pub applications: i64,
    pub outreach_in_window: &'a [OutreachRow],
    pub tasks_completed: i64,
    pub pending_followups: &'a [FollowUpRow],
    pub open_tasks: &'a [TaskRow],
    pub strength_counts: &'a [(String, i64)],
    pub next_actions: Vec<NextAction>,
}

/// Responded ÷ settled, rounded to 2 decimals. Outreach counts as settled
/// once its outcome left PENDING or it has waited out the grace period.
pub fn response_rate(outreach: &[OutreachRow], now: DateTime<Utc>) -> (usize, f64) {
    let cutoff = now - Duration::days(RESPONSE_GRACE_DAYS);
    let responded = outreach.iter().filter(|o| o.outcome().is_response()).count();
    let settled = outreach
        .iter()
        .filter(|o| o.outcome() != OutreachOutcome::Pending || o.sent_at <= cutoff)
        .count();
    if settled == 0 {
        return (responded, 0.0);
    }
    let rate = responded as f64 / settled as f64;
    (responded, (rate * 100.0).round() / 100.0)
}

pub fn compute_summary(inputs: SummaryInputs<'_>, now: DateTime<Utc>) -> DashboardSummary {
    let (today, tomorrow) = day_bounds(now);

    let pipeline = JobStage::ALL
        .iter()
        .map(|stage| StageCount {
            stage: *stage,
            count: count_for(inputs.stage_counts, stage.as_str()),
        })
        .collect();

    let contact_strength = ContactStrength::ALL
        .iter()
        .map(|strength| StrengthCount {
            strength: *strength,
            count: count_for(inputs.strength_counts, strength.as_str()),
        })
        .collect();

    let (responses, response_rate) = response_rate(inputs.outreach_in_window, now);

    let open_followups = inputs.pending_followups.iter().filter(|f| f.is_open());
    let followups_overdue = open_followups.clone().filter(|f| f.due_at < today).count();
    let followups_due_today = open_followups
        .filter(|f| f.due_at >= today && f.due_at < tomorrow)
        .count();

    let task_dues: Vec<DateTime<Utc>> = inputs
        .open_tasks
        .iter()
        .filter(|t| t.is_open())
        .filter_map(|t| t.due_at)
        .collect();
    let tasks_overdue = task_dues.iter().filter(|d| **d < today).count();
    let tasks_due_today = task_dues
        .iter()
        .filter(|d| **d >= today && **d < tomorrow)
        .count();

    let mut ranked: Vec<&(JobRow, JobHeat)> = inputs.active_jobs.iter().collect();
    ranked.sort_by(|(ja, ha), (jb, hb)| {
        hb.score
            .cmp(&ha.score)
            .then(jb.last_touch_at.cmp(&ja.last_touch_at))
    });
    let hottest_jobs = ranked
        .into_iter()
        .take(HOTTEST_JOBS)
        .map(|(job, heat)| HotJob {
            id: job.id,
            company: job.company.clone(),
            role: job.role.clone(),
            stage: job.stage(),
            heat: *heat,
        })
        .collect();

    DashboardSummary {
        window_days: inputs.window_days,
        pipeline,
        active_jobs: inputs.active_jobs.len(),
        applications: inputs.applications,
        outreach_sent: inputs.outreach_in_window.len(),
        responses,
        response_rate,
        tasks_completed: inputs.tasks_completed,
        followups_due_today,
        followups_overdue,
        tasks_due_today,
        tasks_overdue,
        hottest_jobs,
        contact_strength,
        next_actions: inputs.next_actions,
    }
}

fn count_for(counts: &[(String, i64)], key: &str) -> i64 {
    counts
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, n)| *n)
        .sum()
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

    fn outreach(outcome: &str, age_days: i64) -> OutreachRow {
        let sent_at = now() - Duration::days(age_days);
        OutreachRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            contact_id: Uuid::new_v4(),
            job_id: None,
            channel: "EMAIL".to_string(),
            message: None,
            personalization_score: 0,
            outcome: outcome.to_string(),
            sent_at,
            created_at: sent_at,
            updated_at: sent_at,
        }
    }

    fn job(company: &str, score: u32) -> (JobRow, JobHeat) {
        (
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
                stage: "TECH".to_string(),
                last_touch_at: now(),
                archived_at: None,
                created_at: now(),
                updated_at: now(),
            },
            JobHeat {
                score,
                level: 1,
                label: HeatLabel::Warm,
            },
        )
    }

    fn inputs<'a>(
        jobs: &'a [(JobRow, JobHeat)],
        outreach: &'a [OutreachRow],
        followups: &'a [FollowUpRow],
        tasks: &'a [TaskRow],
    ) -> SummaryInputs<'a> {
        SummaryInputs {
            window_days: 7,
            stage_counts: &[],
            active_jobs: jobs,
            applications: 0,
            outreach_in_window: outreach,
            tasks_completed: 0,
            pending_followups: followups,
            open_tasks: tasks,
            strength_counts: &[],
            next_actions: vec![],
        }
    }

    #[test]
    fn test_response_rate_ignores_fresh_pending_outreach() {
        let rows = vec![
            outreach("REPLIED", 5),
            outreach("NEGATIVE", 1),
            outreach("NO_RESPONSE", 6),
            outreach("PENDING", 4),
            outreach("PENDING", 1),
        ];
        // 2 responses over 4 settled
        assert_eq!(response_rate(&rows, now()), (2, 0.5));
    }

    #[test]
    fn test_response_rate_rounds_and_handles_empty() {
        assert_eq!(response_rate(&[], now()), (0, 0.0));
        let rows = vec![
            outreach("POSITIVE", 5),
            outreach("NO_RESPONSE", 5),
            outreach("NO_RESPONSE", 5),
        ];
        assert_eq!(response_rate(&rows, now()), (1, 0.33));
    }

    #[test]
    fn test_pipeline_lists_every_stage() {
        let counts = vec![("TECH".to_string(), 2), ("APPLIED".to_string(), 5)];
        let mut i = inputs(&[], &[], &[], &[]);
        i.stage_counts = &counts[..];
        let summary = compute_summary(i, now());
        assert_eq!(summary.pipeline.len(), JobStage::ALL.len());
        assert_eq!(summary.pipeline[0].stage, JobStage::Applied);
        assert_eq!(summary.pipeline[0].count, 5);
        assert_eq!(summary.pipeline[1].count, 0);
        assert_eq!(summary.pipeline[2].count, 2);
        assert_eq!(summary.contact_strength.len(), 3);
    }

    #[test]
    fn test_hottest_jobs_sorted_and_capped() {
        let jobs: Vec<_> = [10, 80, 45, 60, 5, 99]
            .iter()
            .enumerate()
            .map(|(i, s)| job(&format!("Co{i}"), *s))
            .collect();
        let summary = compute_summary(inputs(&jobs, &[], &[], &[]), now());
        let scores: Vec<u32> = summary.hottest_jobs.iter().map(|j| j.heat.score).collect();
        assert_eq!(scores, vec![99, 80, 60, 45, 10]);
        assert_eq!(summary.active_jobs, 6);
    }

    #[test]
    fn test_due_today_and_overdue_counts() {
        let followup = |due_at: DateTime<Utc>| FollowUpRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            outreach_id: Uuid::new_v4(),
            contact_id: Uuid::new_v4(),
            job_id: None,
            attempt: 1,
            due_at,
            sent_at: None,
            cancelled_at: None,
            note: None,
            created_at: due_at,
        };
        let followups = vec![
            followup(now() - Duration::days(2)),
            followup(now() + Duration::hours(5)),
            followup(now() + Duration::days(3)),
        ];
        let task = |due_at: Option<DateTime<Utc>>, status: &str| TaskRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            title: "t".to_string(),
            description: None,
            status: status.to_string(),
            priority: "MEDIUM".to_string(),
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
            created_at: now(),
            updated_at: now(),
        };
        let tasks = vec![
            task(Some(now() - Duration::days(1)), "TODO"),
            task(Some(now() - Duration::days(1)), "DONE"),
            task(Some(now() - Duration::hours(1)), "IN_PROGRESS"),
            task(None, "TODO"),
        ];

        let summary = compute_summary(inputs(&[], &[], &followups, &tasks), now());
        assert_eq!(summary.followups_overdue, 1);
        assert_eq!(summary.followups_due_today, 1);
        assert_eq!(summary.tasks_overdue, 1);
        assert_eq!(summary.tasks_due_today, 1);
    }
}
