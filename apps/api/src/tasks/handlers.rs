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
use crate::contacts::store::{contact_candidates, contact_exists};
use crate::errors::AppError;
use crate::grow::store::grow_entity_exists;
use crate::jobs::store::{job_candidates, job_exists};
use crate::models::task::{ChecklistItem, GrowType, Recurrence, TaskPriority, TaskRow, TaskStatus};
use crate::pagination::{PageParams, Paginated};
use crate::state::AppState;
use crate::tasks::quick_add::{parse_quick_add, resolve_ref, ParsedQuickAdd, RefMatch};
use crate::tasks::store::{
    count_tasks, delete_task, get_task, get_task_for_update, insert_task, list_tasks,
    next_occurrence, save_task, NewTask, TaskFilter,
};
use crate::validation::{
    double_option, non_blank, normalize_tags, validate_not_blank, ValidatedJson, ValidatedPath,
    ValidatedQuery,
};

/// Same cap as the `title` rule on create and update.
const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    pub recurrence: Option<Recurrence>,
    pub job_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub grow_type: Option<GrowType>,
    pub grow_id: Option<Uuid>,
}

/// Absent fields are left alone; `null` clears nullable ones.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub checklist: Option<Vec<ChecklistItem>>,
    #[serde(default, deserialize_with = "double_option")]
    pub recurrence: Option<Option<Recurrence>>,
    #[serde(default, deserialize_with = "double_option")]
    pub job_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub grow_type: Option<Option<GrowType>>,
    #[serde(default, deserialize_with = "double_option")]
    pub grow_id: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuickAddRequest {
    #[validate(
        length(min = 1, max = 500, message = "must be 1-500 characters"),
        custom(function = "validate_not_blank")
    )]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct QuickAddPreview {
    #[serde(flatten)]
    pub parsed: ParsedQuickAdd,
    pub contact: Option<RefMatch>,
    pub job: Option<RefMatch>,
}

#[derive(Debug, Serialize)]
pub struct QuickAddResponse {
    pub task: TaskRow,
    pub preview: QuickAddPreview,
}

/// A task, plus the copy spawned when completing a recurring task.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: TaskRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_occurrence: Option<TaskRow>,
}

fn check_checklist(items: &[ChecklistItem]) -> Result<Vec<ChecklistItem>, AppError> {
    items
        .iter()
        .map(|item| {
            let text = item.text.trim();
            if text.is_empty() {
                return Err(AppError::field("checklist", "items need text"));
            }
            Ok(ChecklistItem {
                text: text.to_string(),
                done: item.done,
            })
        })
        .collect()
}

/// Every linked entity must exist and belong to the user.
async fn check_links(
    conn: &mut PgConnection,
    user_id: Uuid,
    job_id: Option<Uuid>,
    contact_id: Option<Uuid>,
    grow: (Option<GrowType>, Option<Uuid>),
) -> Result<(), AppError> {
    if let Some(job_id) = job_id {
        if !job_exists(&mut *conn, user_id, job_id).await? {
            return Err(AppError::not_found("Job", job_id));
        }
    }
    if let Some(contact_id) = contact_id {
        if !contact_exists(&mut *conn, user_id, contact_id).await? {
            return Err(AppError::not_found("Contact", contact_id));
        }
    }
    match grow {
        (Some(grow_type), Some(grow_id)) => {
            if !grow_entity_exists(&mut *conn, user_id, grow_type, grow_id).await? {
                return Err(AppError::not_found(grow_type.as_str(), grow_id));
            }
        }
        (None, None) => {}
        _ => {
            return Err(AppError::field(
                "grow_id",
                "grow_type and grow_id must be given together",
            ))
        }
    }
    Ok(())
}

/// GET /api/v1/tasks
pub async fn handle_list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageParams>,
    ValidatedQuery(filter): ValidatedQuery<TaskFilter>,
) -> Result<Json<Paginated<TaskRow>>, AppError> {
    let now = Utc::now();
    let total = count_tasks(&state.db, user.user_id, &filter, now).await?;
    let items = list_tasks(&state.db, user.user_id, &filter, &page, now).await?;
    Ok(Json(Paginated::new(items, total, &page)))
}

/// POST /api/v1/tasks
pub async fn handle_create_task(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskRow>), AppError> {
    let checklist = check_checklist(&req.checklist)?;
    let mut conn = state.db.acquire().await?;
    check_links(
        &mut conn,
        user.user_id,
        req.job_id,
        req.contact_id,
        (req.grow_type, req.grow_id),
    )
    .await?;

    let new = NewTask {
        description: non_blank(req.description),
        status: req.status.unwrap_or(TaskStatus::Todo),
        priority: req.priority.unwrap_or(TaskPriority::Medium),
        due_at: req.due_at,
        tags: normalize_tags(&req.tags),
        checklist,
        recurrence: req.recurrence,
        job_id: req.job_id,
        contact_id: req.contact_id,
        grow_type: req.grow_type,
        grow_id: req.grow_id,
        ..NewTask::new(user.user_id, req.title.trim())
    };

    let task = insert_task(&mut conn, &new).await?;
    info!(task_id = %task.id, user_id = %user.user_id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/v1/tasks/:id
pub async fn handle_get_task(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<Json<TaskRow>, AppError> {
    get_task(&state.db, user.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Task", id))
}

/// PATCH /api/v1/tasks/:id
///
/// Moving into DONE stamps `completed_at` and, for recurring tasks, creates
/// the next occurrence in the same transaction.
pub async fn handle_update_task(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    let checklist = req.checklist.as_deref().map(check_checklist).transpose()?;

    let mut tx = state.db.begin().await?;
    let mut task = get_task_for_update(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Task", id))?;
    let was_done = task.status() == TaskStatus::Done;

    let grow_type = match req.grow_type {
        Some(g) => g,
        None => task.grow_type.as_deref().and_then(|g| g.parse().ok()),
    };
    let grow_id = req.grow_id.unwrap_or(task.grow_id);
    let grow_changed = req.grow_type.is_some() || req.grow_id.is_some();
    check_links(
        &mut tx,
        user.user_id,
        req.job_id.flatten(),
        req.contact_id.flatten(),
        if grow_changed { (grow_type, grow_id) } else { (None, None) },
    )
    .await?;

    if let Some(title) = req.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        task.description = non_blank(description);
    }
    if let Some(status) = req.status {
        task.status = status.as_str().to_string();
    }
    if let Some(priority) = req.priority {
        task.priority = priority.as_str().to_string();
    }
    if let Some(due_at) = req.due_at {
        task.due_at = due_at;
        task.recurrence_day = None;
    }
    if let Some(tags) = req.tags {
        task.tags = normalize_tags(&tags);
    }
    if let Some(checklist) = checklist {
        task.checklist = sqlx::types::Json(checklist);
    }
    if let Some(recurrence) = req.recurrence {
        task.recurrence = recurrence.map(|r| r.as_str().to_string());
        task.recurrence_day = None;
    }
    if let Some(job_id) = req.job_id {
        task.job_id = job_id;
    }
    if let Some(contact_id) = req.contact_id {
        task.contact_id = contact_id;
    }
    task.grow_type = grow_type.map(|g| g.as_str().to_string());
    task.grow_id = grow_id;

    let now = Utc::now();
    let mut spawn = None;
    match (was_done, task.status() == TaskStatus::Done) {
        (false, true) => {
            task.completed_at = Some(now);
            spawn = next_occurrence(&task, now);
        }
        (_, false) => task.completed_at = None,
        (true, true) => {}
    }

    let task = save_task(&mut tx, &task).await?;
    let next = match spawn {
        Some(new) => Some(insert_task(&mut tx, &new).await?),
        None => None,
    };
    tx.commit().await?;

    if let Some(next) = &next {
        info!(task_id = %task.id, next_id = %next.id, "Recurring task completed, next occurrence created");
    } else {
        info!(task_id = %task.id, "Task updated");
    }
    Ok(Json(TaskResponse {
        task,
        next_occurrence: next,
    }))
}

/// DELETE /api/v1/tasks/:id
pub async fn handle_delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !delete_task(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Task", id));
    }
    info!(task_id = %id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn preview(state: &AppState, user_id: Uuid, text: &str) -> Result<QuickAddPreview, AppError> {
    let parsed = parse_quick_add(text, Utc::now());

    let contact = match parsed.contact_refs.first() {
        Some(name) => {
            let candidates = contact_candidates(&state.db, user_id).await?;
            Some(resolve_ref(name, &candidates))
        }
        None => None,
    };
    let job = match parsed.job_refs.first() {
        Some(company) => {
            let candidates = job_candidates(&state.db, user_id).await?;
            Some(resolve_ref(company, &candidates))
        }
        None => None,
    };

    Ok(QuickAddPreview {
        parsed,
        contact,
        job,
    })
}

/// POST /api/v1/tasks/quick-parse
pub async fn handle_quick_parse(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<QuickAddRequest>,
) -> Result<Json<QuickAddPreview>, AppError> {
    Ok(Json(preview(&state, user.user_id, &req.text).await?))
}

/// POST /api/v1/tasks/quick-add
pub async fn handle_quick_add(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<QuickAddRequest>,
) -> Result<(StatusCode, Json<QuickAddResponse>), AppError> {
    let preview = preview(&state, user.user_id, &req.text).await?;
    if preview.parsed.title.is_empty() {
        return Err(AppError::field(
            "text",
            "needs some words for the title besides dates and tags",
        ));
    }
    if preview.parsed.title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::field(
            "text",
            format!("title must be at most {MAX_TITLE_CHARS} characters once dates and tags are removed"),
        ));
    }

    let parsed = &preview.parsed;
    let new = NewTask {
        priority: parsed.priority.unwrap_or(TaskPriority::Medium),
        due_at: parsed.due_at,
        tags: normalize_tags(&parsed.tags),
        recurrence: parsed.recurrence,
        contact_id: preview.contact.as_ref().and_then(RefMatch::id),
        job_id: preview.job.as_ref().and_then(RefMatch::id),
        ..NewTask::new(user.user_id, parsed.title.clone())
    };

    let mut conn = state.db.acquire().await?;
    let task = insert_task(&mut conn, &new).await?;
    info!(task_id = %task.id, user_id = %user.user_id, "Task quick-added");
    Ok((StatusCode::CREATED, Json(QuickAddResponse { task, preview })))
}
