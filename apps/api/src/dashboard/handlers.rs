use axum::{
    extract::State,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::contacts::store::{contact_candidates, strength_counts};
use crate::dashboard::next_action::{
    next_actions, ActionInputs, NextAction, DEFAULT_LIMIT, EVENT_LOOKAHEAD_DAYS, MAX_LIMIT,
};
use crate::dashboard::summary::{
    compute_summary, DashboardSummary, SummaryInputs, DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS,
};
use crate::errors::AppError;
use crate::followups::store::list_pending;
use crate::grow::store::{due_event_follow_ups, list_boosts, list_events_between, EventFollowUpRow};
use crate::jobs::heat::{compute_heat, JobHeat};
use crate::jobs::store::{
    count_applications_since, list_active_jobs, load_heat_inputs, stage_counts,
};
use crate::models::grow::{BoostTaskRow, EventRow};
use crate::models::job::JobRow;
use crate::models::outreach::FollowUpRow;
use crate::models::task::TaskRow;
use crate::outreach::store::list_sent_since;
use crate::state::AppState;
use crate::tasks::store::{count_completed_since, list_open_tasks};
use crate::validation::ValidatedQuery;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct NextActionsQuery {
    pub limit: Option<usize>,
}

/// The open work next-best-action ranks over.
struct OpenWork {
    pending_followups: Vec<FollowUpRow>,
    contacts: Vec<(Uuid, String)>,
    open_tasks: Vec<TaskRow>,
    active_jobs: Vec<(JobRow, JobHeat)>,
    event_follow_ups: Vec<EventFollowUpRow>,
    upcoming_events: Vec<EventRow>,
    open_boosts: Vec<BoostTaskRow>,
}

impl OpenWork {
    async fn load(state: &AppState, user_id: Uuid, now: DateTime<Utc>) -> Result<Self, AppError> {
        let db = &state.db;
        let (pending_followups, contacts, open_tasks, jobs, event_follow_ups, upcoming_events, open_boosts) =
            tokio::try_join!(
                list_pending(db, user_id),
                contact_candidates(db, user_id),
                list_open_tasks(db, user_id),
                list_active_jobs(db, user_id),
                due_event_follow_ups(db, user_id, now),
                list_events_between(db, user_id, now, now + Duration::days(EVENT_LOOKAHEAD_DAYS)),
                list_boosts(db, user_id, true),
            )?;

        let inputs = load_heat_inputs(db, user_id, &jobs).await?;
        let active_jobs = jobs
            .into_iter()
            .filter_map(|job| {
                let heat = compute_heat(inputs.get(&job.id)?, now);
                Some((job, heat))
            })
            .collect();

        Ok(Self {
            pending_followups,
            contacts,
            open_tasks,
            active_jobs,
            event_follow_ups,
            upcoming_events,
            open_boosts,
        })
    }

    fn next_actions(&self, now: DateTime<Utc>, limit: usize) -> Vec<NextAction> {
        let inputs = ActionInputs {
            pending_followups: &self.pending_followups,
            contact_names: &self.contacts,
            open_tasks: &self.open_tasks,
            active_jobs: &self.active_jobs,
            event_follow_ups: &self.event_follow_ups,
            upcoming_events: &self.upcoming_events,
            open_boosts: &self.open_boosts,
        };
        next_actions(&inputs, now, limit)
    }
}

/// GET /api/v1/dashboard/summary
pub async fn handle_summary(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<SummaryQuery>,
) -> Result<Json<DashboardSummary>, AppError> {
    let days = query.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(AppError::field(
            "days",
            format!("must be between 1 and {MAX_WINDOW_DAYS}"),
        ));
    }
    let now = Utc::now();
    let since = now - Duration::days(days);
    let db = &state.db;

    let work = OpenWork::load(&state, user.user_id, now).await?;
    let (stages, applications, outreach, tasks_completed, strengths) = tokio::try_join!(
        stage_counts(db, user.user_id),
        count_applications_since(db, user.user_id, since),
        list_sent_since(db, user.user_id, since),
        count_completed_since(db, user.user_id, since),
        strength_counts(db, user.user_id),
    )?;

    let summary = compute_summary(
        SummaryInputs {
            window_days: days,
            stage_counts: &stages,
            active_jobs: &work.active_jobs,
            applications,
            outreach_in_window: &outreach,
            tasks_completed,
            pending_followups: &work.pending_followups,
            open_tasks: &work.open_tasks,
            strength_counts: &strengths,
            next_actions: work.next_actions(now, DEFAULT_LIMIT),
        },
        now,
    );
    Ok(Json(summary))
}

/// GET /api/v1/dashboard/next-actions
pub async fn handle_next_actions(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<NextActionsQuery>,
) -> Result<Json<Vec<NextAction>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::field(
            "limit",
            format!("must be between 1 and {MAX_LIMIT}"),
        ));
    }
    let now = Utc::now();
    let work = OpenWork::load(&state, user.user_id, now).await?;
    Ok(Json(work.next_actions(now, limit)))
}
