use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::contacts::store::contact_exists;
use crate::errors::AppError;
use crate::grow::store::{
    add_event_contact, complete_boost, create_boost, create_event, create_project,
    create_review, delete_boost, delete_event, delete_project, delete_review, get_event,
    list_boosts, list_event_contacts, list_events, list_projects, list_reviews,
    project_exists, remove_event_contact, update_event, update_project, EventChanges,
    EventFilter, NewEvent, NewProject, NewReview, ProjectChanges,
};
use crate::models::grow::{
    BoostCategory, BoostTaskRow, CodeReviewRow, EventContactRow, EventRow, EventStatus,
    ProjectRow, ProjectStatus,
};
use crate::state::AppState;
use crate::validation::{
    non_blank, normalize_tags, validate_not_blank, validate_url_or_empty, ValidatedJson,
    ValidatedPath, ValidatedQuery,
};

// ---- events ----

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub url: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub status: Option<EventStatus>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

/// An empty string clears an optional field.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(custom(function = "validate_url_or_empty"))]
    pub url: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EventContactRequest {
    pub contact_id: Uuid,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: EventRow,
    pub contacts: Vec<EventContactRow>,
}

/// GET /api/v1/events
pub async fn handle_list_events(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(filter): ValidatedQuery<EventFilter>,
) -> Result<Json<Vec<EventRow>>, AppError> {
    Ok(Json(
        list_events(&state.db, user.user_id, &filter, Utc::now()).await?,
    ))
}

/// POST /api/v1/events
pub async fn handle_create_event(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventRow>), AppError> {
    let location = non_blank(req.location);
    let url = non_blank(req.url);
    let notes = non_blank(req.notes);
    let event = create_event(
        &state.db,
        NewEvent {
            user_id: user.user_id,
            name: req.name.trim(),
            location: location.as_deref(),
            url: url.as_deref(),
            starts_at: req.starts_at,
            status: req.status.unwrap_or(EventStatus::Planned),
            notes: notes.as_deref(),
        },
    )
    .await?;
    info!(event_id = %event.id, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/v1/events/:id
pub async fn handle_get_event(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<Json<EventDetail>, AppError> {
    let event = get_event(&state.db, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Event", id))?;
    let contacts = list_event_contacts(&state.db, event.id).await?;
    Ok(Json(EventDetail { event, contacts }))
}

/// PATCH /api/v1/events/:id
pub async fn handle_update_event(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateEventRequest>,
) -> Result<Json<EventRow>, AppError> {
    let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string());
    let changes = EventChanges {
        name: trimmed(req.name),
        location: trimmed(req.location),
        url: trimmed(req.url),
        starts_at: req.starts_at,
        status: req.status,
        notes: trimmed(req.notes),
    };

    let mut tx = state.db.begin().await?;
    let event = update_event(&mut tx, user.user_id, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Event", id))?;
    tx.commit().await?;

    info!(event_id = %id, "Event updated");
    Ok(Json(event))
}

/// DELETE /api/v1/events/:id
pub async fn handle_delete_event(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !delete_event(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Event", id));
    }
    info!(event_id = %id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/events/:id/contacts
pub async fn handle_add_event_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<EventContactRequest>,
) -> Result<(StatusCode, Json<EventContactRow>), AppError> {
    let event = get_event(&state.db, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Event", id))?;
    if !contact_exists(&state.db, user.user_id, req.contact_id).await? {
        return Err(AppError::not_found("Contact", req.contact_id));
    }
    let note = non_blank(req.note);

    let link = add_event_contact(&state.db, &event, req.contact_id, note.as_deref()).await?;
    info!(event_id = %id, contact_id = %req.contact_id, "Contact linked to event");
    Ok((StatusCode::CREATED, Json(link)))
}

/// DELETE /api/v1/events/:id/contacts/:contact_id
pub async fn handle_remove_event_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath((id, contact_id)): ValidatedPath<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    if get_event(&state.db, user.user_id, id).await?.is_none() {
        return Err(AppError::not_found("Event", id));
    }
    if !remove_event_contact(&state.db, id, contact_id).await? {
        return Err(AppError::not_found("Event contact", contact_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- projects ----

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    pub status: Option<ProjectStatus>,
}

/// An empty string clears an optional field.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_url_or_empty"))]
    pub repo_url: Option<String>,
    pub tech_stack: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub reviewer_contact_id: Option<Uuid>,
    #[validate(
        length(min = 1, max = 5000, message = "must be 1-5000 characters"),
        custom(function = "validate_not_blank")
    )]
    pub summary: String,
    #[validate(url(message = "must be a valid URL"))]
    pub url: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// GET /api/v1/projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ProjectRow>>, AppError> {
    Ok(Json(list_projects(&state.db, user.user_id).await?))
}

/// POST /api/v1/projects
pub async fn handle_create_project(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectRow>), AppError> {
    let description = non_blank(req.description);
    let repo_url = non_blank(req.repo_url);
    let tech_stack = normalize_tags(&req.tech_stack);
    let project = create_project(
        &state.db,
        NewProject {
            user_id: user.user_id,
            name: req.name.trim(),
            description: description.as_deref(),
            repo_url: repo_url.as_deref(),
            tech_stack: &tech_stack,
            status: req.status.unwrap_or(ProjectStatus::Idea),
        },
    )
    .await?;
    info!(project_id = %project.id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// PATCH /api/v1/projects/:id
pub async fn handle_update_project(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateProjectRequest>,
) -> Result<Json<ProjectRow>, AppError> {
    let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string());
    let changes = ProjectChanges {
        name: trimmed(req.name),
        description: trimmed(req.description),
        repo_url: trimmed(req.repo_url),
        tech_stack: req.tech_stack.as_deref().map(normalize_tags),
        status: req.status,
    };
    let project = update_project(&state.db, user.user_id, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Project", id))?;
    info!(project_id = %id, "Project updated");
    Ok(Json(project))
}

/// DELETE /api/v1/projects/:id
pub async fn handle_delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !delete_project(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Project", id));
    }
    info!(project_id = %id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/projects/:id/reviews
pub async fn handle_list_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<Json<Vec<CodeReviewRow>>, AppError> {
    if !project_exists(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Project", id));
    }
    Ok(Json(list_reviews(&state.db, id).await?))
}

/// POST /api/v1/projects/:id/reviews
pub async fn handle_create_review(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<CodeReviewRow>), AppError> {
    if !project_exists(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Project", id));
    }
    if let Some(contact_id) = req.reviewer_contact_id {
        if !contact_exists(&state.db, user.user_id, contact_id).await? {
            return Err(AppError::not_found("Contact", contact_id));
        }
    }
    let url = non_blank(req.url);
    let review = create_review(
        &state.db,
        NewReview {
            user_id: user.user_id,
            project_id: id,
            reviewer_contact_id: req.reviewer_contact_id,
            summary: req.summary.trim(),
            url: url.as_deref(),
            reviewed_at: req.reviewed_at.unwrap_or_else(Utc::now),
        },
    )
    .await?;
    info!(project_id = %id, review_id = %review.id, "Code review recorded");
    Ok((StatusCode::CREATED, Json(review)))
}

/// DELETE /api/v1/reviews/:id
pub async fn handle_delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !delete_review(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Review", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- boosts ----

#[derive(Debug, Default, Deserialize, Validate)]
pub struct BoostQuery {
    #[serde(default)]
    pub open: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBoostRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    pub category: Option<BoostCategory>,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub impact: Option<i32>,
}

/// GET /api/v1/boosts
pub async fn handle_list_boosts(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<BoostQuery>,
) -> Result<Json<Vec<BoostTaskRow>>, AppError> {
    Ok(Json(list_boosts(&state.db, user.user_id, query.open).await?))
}

/// POST /api/v1/boosts
pub async fn handle_create_boost(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateBoostRequest>,
) -> Result<(StatusCode, Json<BoostTaskRow>), AppError> {
    let boost = create_boost(
        &state.db,
        user.user_id,
        req.title.trim(),
        req.category.unwrap_or(BoostCategory::Other),
        req.impact.unwrap_or(3),
    )
    .await?;
    info!(boost_id = %boost.id, "Boost task created");
    Ok((StatusCode::CREATED, Json(boost)))
}

/// POST /api/v1/boosts/:id/complete
pub async fn handle_complete_boost(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<Json<BoostTaskRow>, AppError> {
    let boost = complete_boost(&state.db, user.user_id, id, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("Boost", id))?;
    info!(boost_id = %id, "Boost task completed");
    Ok(Json(boost))
}

/// DELETE /api/v1/boosts/:id
pub async fn handle_delete_boost(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !delete_boost(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Boost", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
