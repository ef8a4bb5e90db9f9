use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::models::task::{
    ChecklistItem, GrowType, Recurrence, TaskPriority, TaskRow, TaskStatus,
};
use crate::pagination::PageParams;
use crate::tasks::recurrence::next_due;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueFilter {
    Today,
    Overdue,
    Upcoming,
    None,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub tag: Option<String>,
    pub job_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub due: Option<DueFilter>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub checklist: Vec<ChecklistItem>,
    pub recurrence: Option<Recurrence>,
    pub recurrence_day: Option<i16>,
    pub job_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub grow_type: Option<GrowType>,
    pub grow_id: Option<Uuid>,
}

impl NewTask {
    pub fn new(user_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_at: None,
            tags: Vec::new(),
            checklist: Vec::new(),
            recurrence: None,
            recurrence_day: None,
            job_id: None,
            contact_id: None,
            grow_type: None,
            grow_id: None,
        }
    }
}

/// Midnight UTC today and tomorrow.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now);
    (start, start + Duration::days(1))
}

/// The next open copy of a recurring task, due strictly after `now`.
/// `None` when the task does not recur.
pub fn next_occurrence(task: &TaskRow, now: DateTime<Utc>) -> Option<NewTask> {
    let recurrence = task.recurrence()?;
    let base = task.due_at.unwrap_or(now);
    let anchor_day = task
        .recurrence_day
        .and_then(|d| u32::try_from(d).ok())
        .unwrap_or_else(|| base.day());
    let mut due = next_due(recurrence, base, anchor_day);
    // A task finished late skips the occurrences it already missed.
    let mut guard = 0;
    while due <= now && guard < 1000 {
        due = next_due(recurrence, due, anchor_day);
        guard += 1;
    }

    Some(NewTask {
        user_id: task.user_id,
        title: task.title.clone(),
        description: task.description.clone(),
        status: TaskStatus::Todo,
        priority: task.priority(),
        due_at: Some(due),
        tags: task.tags.clone(),
        checklist: task
            .checklist
            .0
            .iter()
            .map(|item| ChecklistItem {
                text: item.text.clone(),
                done: false,
            })
            .collect(),
        recurrence: Some(recurrence),
        recurrence_day: (recurrence == Recurrence::Monthly)
            .then(|| i16::try_from(anchor_day).ok())
            .flatten(),
        job_id: task.job_id,
        contact_id: task.contact_id,
        grow_type: task.grow_type.as_deref().and_then(|g| g.parse().ok()),
        grow_id: task.grow_id,
    })
}

pub async fn insert_task(conn: &mut PgConnection, new: &NewTask) -> Result<TaskRow> {
    let completed_at = (new.status == TaskStatus::Done).then(Utc::now);
    Ok(sqlx::query_as::<_, TaskRow>(
        r#"
        INSERT INTO tasks
            (id, user_id, title, description, status, priority, due_at, tags, checklist,
             recurrence, recurrence_day, job_id, contact_id, grow_type, grow_id, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(&new.title)
    .bind(new.description.as_deref())
    .bind(new.status.as_str())
    .bind(new.priority.as_str())
    .bind(new.due_at)
    .bind(&new.tags)
    .bind(Json(&new.checklist))
    .bind(new.recurrence.map(|r| r.as_str()))
    .bind(new.recurrence_day)
    .bind(new.job_id)
    .bind(new.contact_id)
    .bind(new.grow_type.map(|g| g.as_str()))
    .bind(new.grow_id)
    .bind(completed_at)
    .fetch_one(&mut *conn)
    .await?)
}

/// Writes every mutable column of `task` back.
pub async fn save_task(conn: &mut PgConnection, task: &TaskRow) -> Result<TaskRow> {
    Ok(sqlx::query_as::<_, TaskRow>(
        r#"
        UPDATE tasks SET
            title = $2, description = $3, status = $4, priority = $5, due_at = $6,
            tags = $7, checklist = $8, recurrence = $9, recurrence_day = $10, job_id = $11,
            contact_id = $12, grow_type = $13, grow_id = $14, completed_at = $15,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(task.id)
    .bind(&task.title)
    .bind(task.description.as_deref())
    .bind(&task.status)
    .bind(&task.priority)
    .bind(task.due_at)
    .bind(&task.tags)
    .bind(&task.checklist)
    .bind(task.recurrence.as_deref())
    .bind(task.recurrence_day)
    .bind(task.job_id)
    .bind(task.contact_id)
    .bind(task.grow_type.as_deref())
    .bind(task.grow_id)
    .bind(task.completed_at)
    .fetch_one(&mut *conn)
    .await?)
}

fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Uuid,
    filter: &TaskFilter,
    now: DateTime<Utc>,
) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        qb.push(" AND ")
            .push_bind(tag.trim_start_matches('#').to_lowercase())
            .push(" = ANY(tags)");
    }
    if let Some(job_id) = filter.job_id {
        qb.push(" AND job_id = ").push_bind(job_id);
    }
    if let Some(contact_id) = filter.contact_id {
        qb.push(" AND contact_id = ").push_bind(contact_id);
    }
    let (today, tomorrow) = day_bounds(now);
    match filter.due {
        Some(DueFilter::Today) => {
            qb.push(" AND due_at >= ")
                .push_bind(today)
                .push(" AND due_at < ")
                .push_bind(tomorrow);
        }
        Some(DueFilter::Overdue) => {
            qb.push(" AND status <> 'DONE' AND due_at < ").push_bind(today);
        }
        Some(DueFilter::Upcoming) => {
            qb.push(" AND due_at >= ").push_bind(tomorrow);
        }
        Some(DueFilter::None) => {
            qb.push(" AND due_at IS NULL");
        }
        None => {}
    }
}

const TASK_ORDER: &str = r#"
    ORDER BY CASE priority WHEN 'URGENT' THEN 0 WHEN 'HIGH' THEN 1 WHEN 'MEDIUM' THEN 2 ELSE 3 END,
             due_at ASC NULLS LAST, created_at ASC, id
"#;

pub async fn count_tasks(
    pool: &PgPool,
    user_id: Uuid,
    filter: &TaskFilter,
    now: DateTime<Utc>,
) -> Result<i64> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM tasks");
    push_filters(&mut qb, user_id, filter, now);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

pub async fn list_tasks(
    pool: &PgPool,
    user_id: Uuid,
    filter: &TaskFilter,
    page: &PageParams,
    now: DateTime<Utc>,
) -> Result<Vec<TaskRow>> {
    let mut qb = QueryBuilder::new("SELECT * FROM tasks");
    push_filters(&mut qb, user_id, filter, now);
    qb.push(TASK_ORDER)
        .push(" LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    Ok(qb.build_query_as::<TaskRow>().fetch_all(pool).await?)
}

/// Every task not yet DONE, for the dashboard.
pub async fn list_open_tasks(pool: &PgPool, user_id: Uuid) -> Result<Vec<TaskRow>> {
    Ok(sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT * FROM tasks WHERE user_id = $1 AND status <> 'DONE' {TASK_ORDER}"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn count_completed_since(
    pool: &PgPool,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM tasks WHERE user_id = $1 AND completed_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?)
}

pub async fn get_task(pool: &PgPool, user_id: Uuid, task_id: Uuid) -> Result<Option<TaskRow>> {
    Ok(
        sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn get_task_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
    task_id: Uuid,
) -> Result<Option<TaskRow>> {
    Ok(sqlx::query_as::<_, TaskRow>(
        "SELECT * FROM tasks WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?)
}

pub async fn delete_task(pool: &PgPool, user_id: Uuid, task_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(task_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn recurring_task(recurrence: Option<&str>, due_at: Option<DateTime<Utc>>) -> TaskRow {
        let now = Utc::now();
        TaskRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Apply to 3 roles".to_string(),
            description: None,
            status: "DONE".to_string(),
            priority: "HIGH".to_string(),
            due_at,
            tags: vec!["pipeline".to_string()],
            checklist: Json(vec![
                ChecklistItem {
                    text: "Find roles".to_string(),
                    done: true,
                },
                ChecklistItem {
                    text: "Tailor resume".to_string(),
                    done: true,
                },
            ]),
            recurrence: recurrence.map(str::to_string),
            recurrence_day: None,
            job_id: None,
            contact_id: None,
            grow_type: Some("BOOST".to_string()),
            grow_id: Some(Uuid::new_v4()),
            completed_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_non_recurring_task_has_no_next() {
        let task = recurring_task(None, None);
        assert!(next_occurrence(&task, Utc::now()).is_none());
    }

    #[test]
    fn test_next_occurrence_resets_checklist_and_keeps_links() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2026, 10, 14, 18, 0, 0).unwrap();
        let task = recurring_task(Some("DAILY"), Some(due));

        let next = next_occurrence(&task, now).unwrap();
        assert_eq!(next.status, TaskStatus::Todo);
        assert_eq!(next.priority, TaskPriority::High);
        assert_eq!(
            next.due_at,
            Some(Utc.with_ymd_and_hms(2026, 10, 15, 18, 0, 0).unwrap())
        );
        assert!(next.checklist.iter().all(|i| !i.done));
        assert_eq!(next.checklist.len(), 2);
        assert_eq!(next.grow_type, Some(GrowType::Boost));
        assert_eq!(next.grow_id, task.grow_id);
        assert_eq!(next.tags, task.tags);
    }

    #[test]
    fn test_late_completion_skips_missed_occurrences() {
        let due = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        let task = recurring_task(Some("WEEKLY"), Some(due));

        let next = next_occurrence(&task, now).unwrap();
        // Oct 1 -> 8 -> 15
        assert_eq!(
            next.due_at,
            Some(Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_monthly_series_keeps_its_day_of_month() {
        let jan = Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap();
        let task = recurring_task(Some("MONTHLY"), Some(jan));
        let feb = next_occurrence(&task, jan).unwrap();
        assert_eq!(feb.due_at, Some(Utc.with_ymd_and_hms(2026, 2, 28, 9, 0, 0).unwrap()));
        assert_eq!(feb.recurrence_day, Some(31));

        let mut feb_task = recurring_task(Some("MONTHLY"), feb.due_at);
        feb_task.recurrence_day = feb.recurrence_day;
        let mar = next_occurrence(&feb_task, jan).unwrap();
        assert_eq!(mar.due_at, Some(Utc.with_ymd_and_hms(2026, 3, 31, 9, 0, 0).unwrap()));
    }

    #[test]
    fn test_undated_recurring_task_counts_from_now() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        let task = recurring_task(Some("WEEKLY"), None);
        let next = next_occurrence(&task, now).unwrap();
        assert_eq!(next.due_at, Some(now + Duration::days(7)));
    }

    #[test]
    fn test_day_bounds() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 17, 45, 3).unwrap();
        let (start, end) = day_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap());
    }
}
