use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::contacts::store::mark_contacted;
use crate::errors::AppError;
use crate::followups::cadence::{after_sent, CadenceStep};
use crate::followups::store::{
    cancel, count_followups, get_followup_for_update, insert_followup, list_followups,
    mark_sent, reschedule, FollowUpQuery, NewFollowUp,
};
use crate::jobs::store::touch_job;
use crate::models::outreach::{FollowUpRow, OutreachOutcome};
use crate::outreach::store::{get_outreach_for_followup, set_outcome};
use crate::pagination::{PageParams, Paginated};
use crate::state::AppState;
use crate::validation::{
    non_blank, OptionalJson, ValidatedJson, ValidatedPath, ValidatedQuery,
};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CompleteRequest {
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SnoozeRequest {
    #[validate(range(min = 1, max = 30, message = "must be between 1 and 30"))]
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub follow_up: FollowUpRow,
    /// The next attempt, when the cadence continues.
    pub next: Option<FollowUpRow>,
    pub outreach_outcome: OutreachOutcome,
}

fn already_closed() -> AppError {
    AppError::Conflict("Follow-up is already closed".to_string())
}

/// GET /api/v1/followups
pub async fn handle_list_followups(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageParams>,
    ValidatedQuery(query): ValidatedQuery<FollowUpQuery>,
) -> Result<Json<Paginated<FollowUpRow>>, AppError> {
    let now = Utc::now();
    let total = count_followups(&state.db, user.user_id, query.status, now).await?;
    let items = list_followups(&state.db, user.user_id, query.status, &page, now).await?;
    Ok(Json(Paginated::new(items, total, &page)))
}

/// POST /api/v1/followups/:id/complete
///
/// Marks the follow-up sent. While the outreach is unanswered the next
/// attempt is scheduled; after the last one the outreach becomes NO_RESPONSE.
pub async fn handle_complete_followup(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    OptionalJson(body): OptionalJson<CompleteRequest>,
) -> Result<Json<CompleteResponse>, AppError> {
    let note = non_blank(body.unwrap_or_default().note);
    let now = Utc::now();

    let mut tx = state.db.begin().await?;
    // Lock order: outreach, then follow-up.
    let outreach = get_outreach_for_followup(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Follow-up", id))?;
    let followup = get_followup_for_update(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Follow-up", id))?;
    if !followup.is_open() {
        return Err(already_closed());
    }

    let sent = mark_sent(&mut tx, followup.id, now, note.as_deref()).await?;
    mark_contacted(&mut tx, sent.contact_id, now).await?;
    if let Some(job_id) = sent.job_id {
        touch_job(&mut tx, job_id, now).await?;
    }

    let mut next = None;
    let mut outcome = outreach.outcome();
    if outcome == OutreachOutcome::Pending {
        match after_sent(sent.attempt, now) {
            CadenceStep::Schedule { attempt, due_at } => {
                next = Some(
                    insert_followup(
                        &mut tx,
                        NewFollowUp {
                            user_id: user.user_id,
                            outreach_id: outreach.id,
                            contact_id: sent.contact_id,
                            job_id: sent.job_id,
                            attempt,
                            due_at,
                        },
                    )
                    .await?,
                );
            }
            CadenceStep::GiveUp => {
                set_outcome(&mut tx, outreach.id, OutreachOutcome::NoResponse).await?;
                outcome = OutreachOutcome::NoResponse;
            }
        }
    }
    tx.commit().await?;

    info!(
        followup_id = %sent.id,
        attempt = sent.attempt,
        scheduled_next = next.is_some(),
        "Follow-up completed"
    );
    Ok(Json(CompleteResponse {
        follow_up: sent,
        next,
        outreach_outcome: outcome,
    }))
}

/// POST /api/v1/followups/:id/snooze
///
/// Pushes the due date `days` past the later of its current value and now.
pub async fn handle_snooze_followup(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<SnoozeRequest>,
) -> Result<Json<FollowUpRow>, AppError> {
    let mut tx = state.db.begin().await?;
    let followup = get_followup_for_update(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Follow-up", id))?;
    if !followup.is_open() {
        return Err(already_closed());
    }

    let due_at = followup.due_at.max(Utc::now()) + Duration::days(req.days);
    let updated = reschedule(&mut tx, followup.id, due_at).await?;
    tx.commit().await?;

    info!(followup_id = %id, days = req.days, "Follow-up snoozed");
    Ok(Json(updated))
}

/// DELETE /api/v1/followups/:id
pub async fn handle_cancel_followup(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut tx = state.db.begin().await?;
    let followup = get_followup_for_update(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Follow-up", id))?;
    if !followup.is_open() {
        return Err(already_closed());
    }
    cancel(&mut tx, followup.id, Utc::now()).await?;
    tx.commit().await?;

    info!(followup_id = %id, "Follow-up cancelled");
    Ok(StatusCode::NO_CONTENT)
}
