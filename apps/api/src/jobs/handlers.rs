use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::jobs::heat::{compute_heat, explain_heat, HeatExplanation, HeatInputs, JobHeat};
use crate::jobs::stage::{next_stages, validate_transition};
use crate::jobs::store::{
    archive_job, count_jobs, create_job, get_job, get_job_for_update, insert_application,
    list_applications, list_history, list_jobs, load_heat_inputs, set_stage, touch_job,
    update_job, JobChanges, JobFilter, JobSort, NewApplication, NewJob,
};
use crate::models::job::{
    ApplicationChannel, JobApplicationRow, JobRow, JobStage, JobStatusHistoryRow,
};
use crate::models::task::TaskRow;
use crate::pagination::{PageParams, Paginated};
use crate::state::AppState;
use crate::tasks::store::{insert_task, NewTask};
use crate::validation::{
    non_blank, validate_not_blank, validate_url_or_empty, ValidatedJson, ValidatedPath,
    ValidatedQuery,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub company: String,
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub role: String,
    #[validate(url(message = "must be a valid URL"))]
    pub url: Option<String>,
    #[validate(length(max = 100))]
    pub source: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 100))]
    pub salary: Option<String>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
    pub stage: Option<JobStage>,
}

/// An empty string clears an optional field.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateJobRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub company: Option<String>,
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub role: Option<String>,
    #[validate(custom(function = "validate_url_or_empty"))]
    pub url: Option<String>,
    #[validate(length(max = 100))]
    pub source: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 100))]
    pub salary: Option<String>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StageRequest {
    pub stage: JobStage,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplicationRequest {
    pub applied_at: Option<DateTime<Utc>>,
    pub channel: Option<ApplicationChannel>,
    #[validate(length(max = 100))]
    pub resume_version: Option<String>,
    #[serde(default)]
    pub cover_letter: bool,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    #[serde(flatten)]
    pub job: JobRow,
    pub heat: JobHeat,
    pub next_stages: Vec<JobStage>,
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: JobRow,
    pub heat: HeatExplanation,
    pub next_stages: Vec<JobStage>,
    pub applications: Vec<JobApplicationRow>,
    pub history: Vec<JobStatusHistoryRow>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub application: JobApplicationRow,
    pub reminder: TaskRow,
}

/// Days after applying when the reminder task falls due.
pub const APPLICATION_REMINDER_DAYS: i64 = 3;

fn inputs_for(job: &JobRow, inputs: &HashMap<Uuid, HeatInputs>) -> HeatInputs {
    inputs.get(&job.id).cloned().unwrap_or(HeatInputs {
        stage: job.stage(),
        last_touch_at: job.last_touch_at,
        best_contact: None,
        referral: Default::default(),
    })
}

fn summarize(
    jobs: Vec<JobRow>,
    inputs: &HashMap<Uuid, HeatInputs>,
    now: DateTime<Utc>,
) -> Vec<JobSummary> {
    jobs.into_iter()
        .map(|job| {
            let heat = compute_heat(&inputs_for(&job, inputs), now);
            JobSummary {
                next_stages: next_stages(job.stage()),
                heat,
                job,
            }
        })
        .collect()
}

async fn summary_of(state: &AppState, user_id: Uuid, job: JobRow) -> Result<JobSummary, AppError> {
    let inputs = load_heat_inputs(&state.db, user_id, std::slice::from_ref(&job)).await?;
    Ok(summarize(vec![job], &inputs, Utc::now())
        .pop()
        .ok_or_else(|| anyhow::anyhow!("job summary missing"))?)
}

/// GET /api/v1/jobs
///
/// Heat depends on the clock, so `sort=heat` and `min_heat` rank the whole
/// filtered set in memory before paging.
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageParams>,
    ValidatedQuery(filter): ValidatedQuery<JobFilter>,
) -> Result<Json<Paginated<JobSummary>>, AppError> {
    if filter.min_heat.is_some_and(|level| level > 3) {
        return Err(AppError::field("min_heat", "must be between 0 and 3"));
    }
    let now = Utc::now();

    if filter.sort == Some(JobSort::Heat) || filter.min_heat.is_some() {
        let jobs = list_jobs(&state.db, user.user_id, &filter, None).await?;
        let inputs = load_heat_inputs(&state.db, user.user_id, &jobs).await?;
        let mut summaries = summarize(jobs, &inputs, now);
        if let Some(min) = filter.min_heat {
            summaries.retain(|s| s.heat.level >= min);
        }
        if filter.sort == Some(JobSort::Heat) {
            summaries.sort_by(|a, b| {
                b.heat
                    .score
                    .cmp(&a.heat.score)
                    .then(b.job.last_touch_at.cmp(&a.job.last_touch_at))
            });
        }
        return Ok(Json(Paginated::from_vec(summaries, &page)));
    }

    let total = count_jobs(&state.db, user.user_id, &filter).await?;
    let jobs = list_jobs(&state.db, user.user_id, &filter, Some(&page)).await?;
    let inputs = load_heat_inputs(&state.db, user.user_id, &jobs).await?;
    Ok(Json(Paginated::new(
        summarize(jobs, &inputs, now),
        total,
        &page,
    )))
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobSummary>), AppError> {
    let url = non_blank(req.url);
    let source = non_blank(req.source);
    let location = non_blank(req.location);
    let salary = non_blank(req.salary);
    let notes = non_blank(req.notes);

    let mut tx = state.db.begin().await?;
    let job = create_job(
        &mut tx,
        NewJob {
            user_id: user.user_id,
            company: req.company.trim(),
            role: req.role.trim(),
            url: url.as_deref(),
            source: source.as_deref(),
            location: location.as_deref(),
            salary: salary.as_deref(),
            notes: notes.as_deref(),
            stage: req.stage.unwrap_or(JobStage::Applied),
        },
    )
    .await?;
    tx.commit().await?;

    info!(job_id = %job.id, user_id = %user.user_id, company = %job.company, "Job created");
    Ok((
        StatusCode::CREATED,
        Json(summary_of(&state, user.user_id, job).await?),
    ))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<Json<JobDetail>, AppError> {
    let job = get_job(&state.db, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Job", id))?;

    let inputs = load_heat_inputs(&state.db, user.user_id, std::slice::from_ref(&job)).await?;
    let heat = explain_heat(&inputs_for(&job, &inputs), Utc::now());
    let applications = list_applications(&state.db, job.id).await?;
    let history = list_history(&state.db, job.id).await?;

    Ok(Json(JobDetail {
        next_stages: next_stages(job.stage()),
        heat,
        applications,
        history,
        job,
    }))
}

/// PATCH /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateJobRequest>,
) -> Result<Json<JobSummary>, AppError> {
    let changes = JobChanges {
        company: req.company.map(|c| c.trim().to_string()),
        role: req.role.map(|r| r.trim().to_string()),
        url: req.url.map(|v| v.trim().to_string()),
        source: req.source.map(|v| v.trim().to_string()),
        location: req.location.map(|v| v.trim().to_string()),
        salary: req.salary.map(|v| v.trim().to_string()),
        notes: req.notes.map(|v| v.trim().to_string()),
    };

    let job = update_job(&state.db, user.user_id, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Job", id))?;
    info!(job_id = %job.id, "Job updated");
    Ok(Json(summary_of(&state, user.user_id, job).await?))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !archive_job(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Job", id));
    }
    info!(job_id = %id, "Job archived");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/jobs/:id/stage
pub async fn handle_change_stage(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<StageRequest>,
) -> Result<Json<JobSummary>, AppError> {
    let mut tx = state.db.begin().await?;
    let job = get_job_for_update(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Job", id))?;

    let from = job.stage();
    validate_transition(from, req.stage)?;

    let note = non_blank(req.note);
    let updated = set_stage(&mut tx, &job, req.stage, note.as_deref(), Utc::now()).await?;
    tx.commit().await?;

    info!(job_id = %id, %from, to = %req.stage, "Job stage changed");
    Ok(Json(summary_of(&state, user.user_id, updated).await?))
}

/// POST /api/v1/jobs/:id/applications
///
/// Records the application, touches the job and schedules a reminder task.
pub async fn handle_add_application(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<ApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationResponse>), AppError> {
    let applied_at = req.applied_at.unwrap_or_else(Utc::now);
    let resume_version = non_blank(req.resume_version);
    let notes = non_blank(req.notes);

    let mut tx = state.db.begin().await?;
    let job = get_job_for_update(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Job", id))?;

    let application = insert_application(
        &mut tx,
        NewApplication {
            job_id: job.id,
            applied_at,
            channel: req.channel.unwrap_or(ApplicationChannel::Portal),
            resume_version: resume_version.as_deref(),
            cover_letter: req.cover_letter,
            notes: notes.as_deref(),
        },
    )
    .await?;
    touch_job(&mut tx, job.id, applied_at).await?;

    let reminder = NewTask {
        due_at: Some(applied_at + Duration::days(APPLICATION_REMINDER_DAYS)),
        job_id: Some(job.id),
        ..NewTask::new(
            user.user_id,
            format!("Follow up on {} at {}", job.role, job.company),
        )
    };
    let reminder = insert_task(&mut tx, &reminder).await?;
    tx.commit().await?;

    info!(job_id = %job.id, application_id = %application.id, "Application recorded");
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse {
            application,
            reminder,
        }),
    ))
}

/// GET /api/v1/jobs/:id/heat
pub async fn handle_job_heat(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<Json<HeatExplanation>, AppError> {
    let job = get_job(&state.db, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Job", id))?;
    let inputs = load_heat_inputs(&state.db, user.user_id, std::slice::from_ref(&job)).await?;
    Ok(Json(explain_heat(&inputs_for(&job, &inputs), Utc::now())))
}
