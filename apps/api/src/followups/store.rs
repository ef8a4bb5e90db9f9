use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::models::outreach::FollowUpRow;
use crate::pagination::PageParams;
use crate::tasks::store::day_bounds;

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    /// Pending and due by the end of today.
    Due,
    /// Pending and due before today.
    Overdue,
    /// Pending and due after today.
    Upcoming,
    #[default]
    Pending,
    Done,
    All,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct FollowUpQuery {
    #[serde(default)]
    pub status: FollowUpStatus,
}

pub struct NewFollowUp {
    pub user_id: Uuid,
    pub outreach_id: Uuid,
    pub contact_id: Uuid,
    pub job_id: Option<Uuid>,
    pub attempt: i32,
    pub due_at: DateTime<Utc>,
}

fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Uuid,
    status: FollowUpStatus,
    now: DateTime<Utc>,
) {
    const OPEN: &str = " AND sent_at IS NULL AND cancelled_at IS NULL";
    let (today, tomorrow) = day_bounds(now);

    qb.push(" WHERE user_id = ").push_bind(user_id);
    match status {
        FollowUpStatus::Due => {
            qb.push(OPEN).push(" AND due_at < ").push_bind(tomorrow);
        }
        FollowUpStatus::Overdue => {
            qb.push(OPEN).push(" AND due_at < ").push_bind(today);
        }
        FollowUpStatus::Upcoming => {
            qb.push(OPEN).push(" AND due_at >= ").push_bind(tomorrow);
        }
        FollowUpStatus::Pending => {
            qb.push(OPEN);
        }
        FollowUpStatus::Done => {
            qb.push(" AND sent_at IS NOT NULL");
        }
        FollowUpStatus::All => {}
    }
}

pub async fn count_followups(
    pool: &PgPool,
    user_id: Uuid,
    status: FollowUpStatus,
    now: DateTime<Utc>,
) -> Result<i64> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM followups");
    push_filters(&mut qb, user_id, status, now);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

pub async fn list_followups(
    pool: &PgPool,
    user_id: Uuid,
    status: FollowUpStatus,
    page: &PageParams,
    now: DateTime<Utc>,
) -> Result<Vec<FollowUpRow>> {
    let mut qb = QueryBuilder::new("SELECT * FROM followups");
    push_filters(&mut qb, user_id, status, now);
    qb.push(" ORDER BY due_at ASC, attempt ASC, id LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    Ok(qb.build_query_as::<FollowUpRow>().fetch_all(pool).await?)
}

/// Every open follow-up, soonest first.
pub async fn list_pending(pool: &PgPool, user_id: Uuid) -> Result<Vec<FollowUpRow>> {
    Ok(sqlx::query_as::<_, FollowUpRow>(
        r#"
        SELECT * FROM followups
        WHERE user_id = $1 AND sent_at IS NULL AND cancelled_at IS NULL
        ORDER BY due_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn get_followup_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
    followup_id: Uuid,
) -> Result<Option<FollowUpRow>> {
    Ok(sqlx::query_as::<_, FollowUpRow>(
        "SELECT * FROM followups WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(followup_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?)
}

pub async fn insert_followup(conn: &mut PgConnection, new: NewFollowUp) -> Result<FollowUpRow> {
    Ok(sqlx::query_as::<_, FollowUpRow>(
        r#"
        INSERT INTO followups (id, user_id, outreach_id, contact_id, job_id, attempt, due_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.outreach_id)
    .bind(new.contact_id)
    .bind(new.job_id)
    .bind(new.attempt)
    .bind(new.due_at)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn mark_sent(
    conn: &mut PgConnection,
    followup_id: Uuid,
    at: DateTime<Utc>,
    note: Option<&str>,
) -> Result<FollowUpRow> {
    Ok(sqlx::query_as::<_, FollowUpRow>(
        "UPDATE followups SET sent_at = $2, note = COALESCE($3, note) WHERE id = $1 RETURNING *",
    )
    .bind(followup_id)
    .bind(at)
    .bind(note)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn reschedule(
    conn: &mut PgConnection,
    followup_id: Uuid,
    due_at: DateTime<Utc>,
) -> Result<FollowUpRow> {
    Ok(sqlx::query_as::<_, FollowUpRow>(
        "UPDATE followups SET due_at = $2 WHERE id = $1 RETURNING *",
    )
    .bind(followup_id)
    .bind(due_at)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn cancel(conn: &mut PgConnection, followup_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE followups SET cancelled_at = $2 WHERE id = $1")
        .bind(followup_id)
        .bind(at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Cancels every open follow-up of an outreach. Returns how many closed.
pub async fn cancel_pending_for_outreach(
    conn: &mut PgConnection,
    outreach_id: Uuid,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE followups SET cancelled_at = $2
        WHERE outreach_id = $1 AND sent_at IS NULL AND cancelled_at IS NULL
        "#,
    )
    .bind(outreach_id)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
