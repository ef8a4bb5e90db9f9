use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::contacts::store::{get_contact, mark_contacted};
use crate::errors::AppError;
use crate::followups::cadence::due_after;
use crate::followups::store::{cancel_pending_for_outreach, insert_followup, NewFollowUp};
use crate::jobs::store::{get_job, touch_job};
use crate::models::contact::ContactRow;
use crate::models::job::JobRow;
use crate::models::outreach::{FollowUpRow, OutreachChannel, OutreachOutcome, OutreachRow};
use crate::outreach::personalization::{personalization_score, ScoreContext};
use crate::outreach::store::{
    count_outreach, delete_outreach, get_outreach_for_update, insert_outreach, list_outreach,
    save_outreach, NewOutreach, OutreachFilter,
};
use crate::pagination::{PageParams, Paginated};
use crate::state::AppState;
use crate::validation::{non_blank, ValidatedJson, ValidatedPath, ValidatedQuery};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOutreachRequest {
    pub contact_id: Uuid,
    pub job_id: Option<Uuid>,
    pub channel: Option<OutreachChannel>,
    #[validate(length(max = 10000))]
    pub message: Option<String>,
    #[validate(range(min = 0, max = 100, message = "must be between 0 and 100"))]
    pub personalization_score: Option<i32>,
    pub outcome: Option<OutreachOutcome>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// An empty `message` clears it.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOutreachRequest {
    pub channel: Option<OutreachChannel>,
    #[validate(length(max = 10000))]
    pub message: Option<String>,
    #[validate(range(min = 0, max = 100, message = "must be between 0 and 100"))]
    pub personalization_score: Option<i32>,
    pub outcome: Option<OutreachOutcome>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct OutreachCreated {
    #[serde(flatten)]
    pub outreach: OutreachRow,
    pub follow_up: Option<FollowUpRow>,
}

fn score_message(message: Option<&str>, contact: &ContactRow, job: Option<&JobRow>) -> i32 {
    let ctx = ScoreContext {
        contact_name: &contact.name,
        company: job
            .map(|j| j.company.as_str())
            .or(contact.company.as_deref()),
        role: job.map(|j| j.role.as_str()),
    };
    personalization_score(message.unwrap_or_default(), &ctx)
}

async fn load_target(
    conn: &mut PgConnection,
    user_id: Uuid,
    contact_id: Uuid,
    job_id: Option<Uuid>,
) -> Result<(ContactRow, Option<JobRow>), AppError> {
    let contact = get_contact(&mut *conn, user_id, contact_id)
        .await?
        .filter(|c| c.archived_at.is_none())
        .ok_or_else(|| AppError::not_found("Contact", contact_id))?;
    let job = match job_id {
        Some(job_id) => Some(
            get_job(&mut *conn, user_id, job_id)
                .await?
                .filter(|j| j.archived_at.is_none())
                .ok_or_else(|| AppError::not_found("Job", job_id))?,
        ),
        None => None,
    };
    Ok((contact, job))
}

/// GET /api/v1/outreach
pub async fn handle_list_outreach(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageParams>,
    ValidatedQuery(filter): ValidatedQuery<OutreachFilter>,
) -> Result<Json<Paginated<OutreachRow>>, AppError> {
    let total = count_outreach(&state.db, user.user_id, &filter).await?;
    let items = list_outreach(&state.db, user.user_id, &filter, &page).await?;
    Ok(Json(Paginated::new(items, total, &page)))
}

/// POST /api/v1/outreach
///
/// Marks the contact as reached, touches the linked job and, while the
/// outcome is PENDING, schedules the first follow-up.
pub async fn handle_create_outreach(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateOutreachRequest>,
) -> Result<(StatusCode, Json<OutreachCreated>), AppError> {
    let mut tx = state.db.begin().await?;
    let (contact, job) = load_target(&mut tx, user.user_id, req.contact_id, req.job_id).await?;
    let message = non_blank(req.message);
    let score = req
        .personalization_score
        .unwrap_or_else(|| score_message(message.as_deref(), &contact, job.as_ref()));
    let outcome = req.outcome.unwrap_or(OutreachOutcome::Pending);
    let sent_at = req.sent_at.unwrap_or_else(Utc::now);

    let outreach = insert_outreach(
        &mut tx,
        NewOutreach {
            user_id: user.user_id,
            contact_id: contact.id,
            job_id: job.as_ref().map(|j| j.id),
            channel: req.channel.unwrap_or(OutreachChannel::Email),
            message: message.as_deref(),
            personalization_score: score,
            outcome,
            sent_at,
        },
    )
    .await?;
    mark_contacted(&mut tx, contact.id, sent_at).await?;
    if let Some(job) = &job {
        touch_job(&mut tx, job.id, sent_at).await?;
    }
    let follow_up = if outcome == OutreachOutcome::Pending {
        Some(
            insert_followup(
                &mut tx,
                NewFollowUp {
                    user_id: user.user_id,
                    outreach_id: outreach.id,
                    contact_id: contact.id,
                    job_id: outreach.job_id,
                    attempt: 1,
                    due_at: due_after(sent_at),
                },
            )
            .await?,
        )
    } else {
        None
    };
    tx.commit().await?;

    info!(
        outreach_id = %outreach.id,
        contact_id = %contact.id,
        score,
        "Outreach logged"
    );
    Ok((
        StatusCode::CREATED,
        Json(OutreachCreated {
            outreach,
            follow_up,
        }),
    ))
}

/// PATCH /api/v1/outreach/:id
///
/// An outcome leaving PENDING closes the open follow-ups.
pub async fn handle_update_outreach(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateOutreachRequest>,
) -> Result<Json<OutreachRow>, AppError> {
    let mut tx = state.db.begin().await?;
    let mut row = get_outreach_for_update(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Outreach", id))?;
    let before = row.outcome();

    if let Some(channel) = req.channel {
        row.channel = channel.as_str().to_string();
    }
    if let Some(sent_at) = req.sent_at {
        row.sent_at = sent_at;
    }
    if let Some(outcome) = req.outcome {
        row.outcome = outcome.as_str().to_string();
    }
    if let Some(message) = req.message {
        row.message = non_blank(Some(message));
        if req.personalization_score.is_none() {
            // An archived contact or job keeps the stored score.
            match load_target(&mut tx, user.user_id, row.contact_id, row.job_id).await {
                Ok((contact, job)) => {
                    row.personalization_score =
                        score_message(row.message.as_deref(), &contact, job.as_ref());
                }
                Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
    }
    if let Some(score) = req.personalization_score {
        row.personalization_score = score;
    }

    let saved = save_outreach(&mut tx, &row).await?;
    let after = saved.outcome();
    if before == OutreachOutcome::Pending && after != OutreachOutcome::Pending {
        let closed = cancel_pending_for_outreach(&mut tx, saved.id, Utc::now()).await?;
        info!(outreach_id = %saved.id, %after, closed, "Outreach settled, follow-ups cancelled");
    }
    tx.commit().await?;

    Ok(Json(saved))
}

/// DELETE /api/v1/outreach/:id
pub async fn handle_delete_outreach(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !delete_outreach(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Outreach", id));
    }
    info!(outreach_id = %id, "Outreach deleted");
    Ok(StatusCode::NO_CONTENT)
}
