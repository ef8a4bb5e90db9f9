use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::models::grow::{
    BoostCategory, BoostTaskRow, CodeReviewRow, EventContactRow, EventRow, EventStatus,
    ProjectRow, ProjectStatus,
};
use crate::models::task::GrowType;

/// Days after an event when its contacts are due a follow-up.
pub const EVENT_FOLLOW_UP_DAYS: i64 = 3;

pub async fn grow_entity_exists<'e, E>(
    db: E,
    user_id: Uuid,
    grow_type: GrowType,
    grow_id: Uuid,
) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    let sql = match grow_type {
        GrowType::Event => "SELECT EXISTS(SELECT 1 FROM events WHERE id = $1 AND user_id = $2)",
        GrowType::Project => "SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1 AND user_id = $2)",
        GrowType::Boost => {
            "SELECT EXISTS(SELECT 1 FROM boost_tasks WHERE id = $1 AND user_id = $2)"
        }
    };
    Ok(sqlx::query_scalar::<_, bool>(sql)
        .bind(grow_id)
        .bind(user_id)
        .fetch_one(db)
        .await?)
}

// ---- events ----

#[derive(Debug, Default, Deserialize, Validate)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub upcoming: bool,
}

pub struct NewEvent<'a> {
    pub user_id: Uuid,
    pub name: &'a str,
    pub location: Option<&'a str>,
    pub url: Option<&'a str>,
    pub starts_at: DateTime<Utc>,
    pub status: EventStatus,
    pub notes: Option<&'a str>,
}

/// `None` leaves a column untouched; `Some("")` clears an optional column.
#[derive(Debug, Default)]
pub struct EventChanges {
    pub name: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub notes: Option<String>,
}

pub async fn list_events(
    pool: &PgPool,
    user_id: Uuid,
    filter: &EventFilter,
    now: DateTime<Utc>,
) -> Result<Vec<EventRow>> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT * FROM events WHERE user_id = ");
    qb.push_bind(user_id);
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if filter.upcoming {
        qb.push(" AND starts_at >= ").push_bind(now);
        qb.push(" ORDER BY starts_at ASC, id");
    } else {
        qb.push(" ORDER BY starts_at DESC, id");
    }
    Ok(qb.build_query_as::<EventRow>().fetch_all(pool).await?)
}

/// Planned events starting between `from` and `until`.
pub async fn list_events_between(
    pool: &PgPool,
    user_id: Uuid,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<EventRow>> {
    Ok(sqlx::query_as::<_, EventRow>(
        r#"
        SELECT * FROM events
        WHERE user_id = $1 AND status = 'PLANNED' AND starts_at >= $2 AND starts_at <= $3
        ORDER BY starts_at ASC
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await?)
}

pub async fn get_event(pool: &PgPool, user_id: Uuid, event_id: Uuid) -> Result<Option<EventRow>> {
    Ok(
        sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = $1 AND user_id = $2")
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn create_event(pool: &PgPool, new: NewEvent<'_>) -> Result<EventRow> {
    Ok(sqlx::query_as::<_, EventRow>(
        r#"
        INSERT INTO events (id, user_id, name, location, url, starts_at, status, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.name)
    .bind(new.location)
    .bind(new.url)
    .bind(new.starts_at)
    .bind(new.status.as_str())
    .bind(new.notes)
    .fetch_one(pool)
    .await?)
}

/// Moving `starts_at` also moves the follow-up dates of the event's contacts.
pub async fn update_event(
    conn: &mut PgConnection,
    user_id: Uuid,
    event_id: Uuid,
    changes: &EventChanges,
) -> Result<Option<EventRow>> {
    let event: Option<EventRow> = sqlx::query_as(
        r#"
        UPDATE events SET
            name      = COALESCE($3, name),
            location  = CASE WHEN $4::text IS NULL THEN location ELSE NULLIF($4, '') END,
            url       = CASE WHEN $5::text IS NULL THEN url ELSE NULLIF($5, '') END,
            starts_at = COALESCE($6, starts_at),
            status    = COALESCE($7, status),
            notes     = CASE WHEN $8::text IS NULL THEN notes ELSE NULLIF($8, '') END,
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(event_id)
    .bind(user_id)
    .bind(changes.name.as_deref())
    .bind(changes.location.as_deref())
    .bind(changes.url.as_deref())
    .bind(changes.starts_at)
    .bind(changes.status.map(|s| s.as_str()))
    .bind(changes.notes.as_deref())
    .fetch_optional(&mut *conn)
    .await?;

    if let (Some(event), Some(starts_at)) = (&event, changes.starts_at) {
        sqlx::query("UPDATE event_contacts SET follow_up_due_at = $2 WHERE event_id = $1")
            .bind(event.id)
            .bind(starts_at + Duration::days(EVENT_FOLLOW_UP_DAYS))
            .execute(&mut *conn)
            .await?;
    }
    Ok(event)
}

pub async fn delete_event(pool: &PgPool, user_id: Uuid, event_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1 AND user_id = $2")
        .bind(event_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

const EVENT_CONTACT_SELECT: &str = r#"
    SELECT ec.event_id, ec.contact_id, c.name AS contact_name, ec.note,
           ec.follow_up_due_at, ec.created_at
    FROM event_contacts ec
    JOIN contacts c ON c.id = ec.contact_id
"#;

pub async fn list_event_contacts(pool: &PgPool, event_id: Uuid) -> Result<Vec<EventContactRow>> {
    Ok(sqlx::query_as::<_, EventContactRow>(&format!(
        "{EVENT_CONTACT_SELECT} WHERE ec.event_id = $1 ORDER BY lower(c.name)"
    ))
    .bind(event_id)
    .fetch_all(pool)
    .await?)
}

/// Links a contact to an event. Linking the same pair again keeps the first
/// link and returns it.
pub async fn add_event_contact(
    pool: &PgPool,
    event: &EventRow,
    contact_id: Uuid,
    note: Option<&str>,
) -> Result<EventContactRow> {
    sqlx::query(
        r#"
        INSERT INTO event_contacts (event_id, contact_id, note, follow_up_due_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (event_id, contact_id) DO NOTHING
        "#,
    )
    .bind(event.id)
    .bind(contact_id)
    .bind(note)
    .bind(event.starts_at + Duration::days(EVENT_FOLLOW_UP_DAYS))
    .execute(pool)
    .await?;

    Ok(sqlx::query_as::<_, EventContactRow>(&format!(
        "{EVENT_CONTACT_SELECT} WHERE ec.event_id = $1 AND ec.contact_id = $2"
    ))
    .bind(event.id)
    .bind(contact_id)
    .fetch_one(pool)
    .await?)
}

pub async fn remove_event_contact(pool: &PgPool, event_id: Uuid, contact_id: Uuid) -> Result<bool> {
    let result =
        sqlx::query("DELETE FROM event_contacts WHERE event_id = $1 AND contact_id = $2")
            .bind(event_id)
            .bind(contact_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Contact follow-up owed from an attended event.
#[derive(Debug, Clone, FromRow)]
pub struct EventFollowUpRow {
    pub event_id: Uuid,
    pub event_name: String,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub follow_up_due_at: DateTime<Utc>,
}

pub async fn due_event_follow_ups(
    pool: &PgPool,
    user_id: Uuid,
    until: DateTime<Utc>,
) -> Result<Vec<EventFollowUpRow>> {
    Ok(sqlx::query_as::<_, EventFollowUpRow>(
        r#"
        SELECT e.id AS event_id, e.name AS event_name, c.id AS contact_id,
               c.name AS contact_name, ec.follow_up_due_at
        FROM event_contacts ec
        JOIN events e ON e.id = ec.event_id
        JOIN contacts c ON c.id = ec.contact_id
        WHERE e.user_id = $1 AND e.status = 'ATTENDED' AND ec.follow_up_due_at <= $2
          AND (c.last_contacted_at IS NULL OR c.last_contacted_at < e.starts_at)
        ORDER BY ec.follow_up_due_at ASC
        "#,
    )
    .bind(user_id)
    .bind(until)
    .fetch_all(pool)
    .await?)
}

// ---- projects ----

pub struct NewProject<'a> {
    pub user_id: Uuid,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub repo_url: Option<&'a str>,
    pub tech_stack: &'a [String],
    pub status: ProjectStatus,
}

/// `None` leaves a column untouched; `Some("")` clears an optional column.
#[derive(Debug, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub repo_url: Option<String>,
    pub tech_stack: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
}

pub async fn list_projects(pool: &PgPool, user_id: Uuid) -> Result<Vec<ProjectRow>> {
    Ok(sqlx::query_as::<_, ProjectRow>(
        "SELECT * FROM projects WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn project_exists(pool: &PgPool, user_id: Uuid, project_id: Uuid) -> Result<bool> {
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1 AND user_id = $2)",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?)
}

pub async fn create_project(pool: &PgPool, new: NewProject<'_>) -> Result<ProjectRow> {
    Ok(sqlx::query_as::<_, ProjectRow>(
        r#"
        INSERT INTO projects (id, user_id, name, description, repo_url, tech_stack, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.name)
    .bind(new.description)
    .bind(new.repo_url)
    .bind(new.tech_stack)
    .bind(new.status.as_str())
    .fetch_one(pool)
    .await?)
}

pub async fn update_project(
    pool: &PgPool,
    user_id: Uuid,
    project_id: Uuid,
    changes: &ProjectChanges,
) -> Result<Option<ProjectRow>> {
    Ok(sqlx::query_as::<_, ProjectRow>(
        r#"
        UPDATE projects SET
            name        = COALESCE($3, name),
            description = CASE WHEN $4::text IS NULL THEN description ELSE NULLIF($4, '') END,
            repo_url    = CASE WHEN $5::text IS NULL THEN repo_url ELSE NULLIF($5, '') END,
            tech_stack  = COALESCE($6, tech_stack),
            status      = COALESCE($7, status),
            updated_at  = now()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(changes.name.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.repo_url.as_deref())
    .bind(changes.tech_stack.as_deref())
    .bind(changes.status.map(|s| s.as_str()))
    .fetch_optional(pool)
    .await?)
}

pub async fn delete_project(pool: &PgPool, user_id: Uuid, project_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_reviews(pool: &PgPool, project_id: Uuid) -> Result<Vec<CodeReviewRow>> {
    Ok(sqlx::query_as::<_, CodeReviewRow>(
        "SELECT * FROM code_reviews WHERE project_id = $1 ORDER BY reviewed_at DESC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?)
}

pub struct NewReview<'a> {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub reviewer_contact_id: Option<Uuid>,
    pub summary: &'a str,
    pub url: Option<&'a str>,
    pub reviewed_at: DateTime<Utc>,
}

pub async fn create_review(pool: &PgPool, new: NewReview<'_>) -> Result<CodeReviewRow> {
    Ok(sqlx::query_as::<_, CodeReviewRow>(
        r#"
        INSERT INTO code_reviews (id, user_id, project_id, reviewer_contact_id, summary, url, reviewed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.project_id)
    .bind(new.reviewer_contact_id)
    .bind(new.summary)
    .bind(new.url)
    .bind(new.reviewed_at)
    .fetch_one(pool)
    .await?)
}

pub async fn delete_review(pool: &PgPool, user_id: Uuid, review_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM code_reviews WHERE id = $1 AND user_id = $2")
        .bind(review_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---- boosts ----

pub async fn list_boosts(pool: &PgPool, user_id: Uuid, open_only: bool) -> Result<Vec<BoostTaskRow>> {
    Ok(sqlx::query_as::<_, BoostTaskRow>(
        r#"
        SELECT * FROM boost_tasks
        WHERE user_id = $1 AND ($2 = FALSE OR completed_at IS NULL)
        ORDER BY completed_at IS NOT NULL, impact DESC, created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(open_only)
    .fetch_all(pool)
    .await?)
}

pub async fn create_boost(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
    category: BoostCategory,
    impact: i32,
) -> Result<BoostTaskRow> {
    Ok(sqlx::query_as::<_, BoostTaskRow>(
        r#"
        INSERT INTO boost_tasks (id, user_id, title, category, impact)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(title)
    .bind(category.as_str())
    .bind(impact)
    .fetch_one(pool)
    .await?)
}

/// Stamps `completed_at` once; completing again keeps the first timestamp.
pub async fn complete_boost(
    pool: &PgPool,
    user_id: Uuid,
    boost_id: Uuid,
    at: DateTime<Utc>,
) -> Result<Option<BoostTaskRow>> {
    Ok(sqlx::query_as::<_, BoostTaskRow>(
        r#"
        UPDATE boost_tasks SET completed_at = COALESCE(completed_at, $3)
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(boost_id)
    .bind(user_id)
    .bind(at)
    .fetch_optional(pool)
    .await?)
}

pub async fn delete_boost(pool: &PgPool, user_id: Uuid, boost_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM boost_tasks WHERE id = $1 AND user_id = $2")
        .bind(boost_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
