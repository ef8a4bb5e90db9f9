use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::models::outreach::{OutreachChannel, OutreachOutcome, OutreachRow};
use crate::pagination::PageParams;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct OutreachFilter {
    pub contact_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub outcome: Option<OutreachOutcome>,
    pub channel: Option<OutreachChannel>,
}

pub struct NewOutreach<'a> {
    pub user_id: Uuid,
    pub contact_id: Uuid,
    pub job_id: Option<Uuid>,
    pub channel: OutreachChannel,
    pub message: Option<&'a str>,
    pub personalization_score: i32,
    pub outcome: OutreachOutcome,
    pub sent_at: DateTime<Utc>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filter: &OutreachFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(contact_id) = filter.contact_id {
        qb.push(" AND contact_id = ").push_bind(contact_id);
    }
    if let Some(job_id) = filter.job_id {
        qb.push(" AND job_id = ").push_bind(job_id);
    }
    if let Some(outcome) = filter.outcome {
        qb.push(" AND outcome = ").push_bind(outcome.as_str());
    }
    if let Some(channel) = filter.channel {
        qb.push(" AND channel = ").push_bind(channel.as_str());
    }
}

pub async fn count_outreach(pool: &PgPool, user_id: Uuid, filter: &OutreachFilter) -> Result<i64> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM outreach");
    push_filters(&mut qb, user_id, filter);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

pub async fn list_outreach(
    pool: &PgPool,
    user_id: Uuid,
    filter: &OutreachFilter,
    page: &PageParams,
) -> Result<Vec<OutreachRow>> {
    let mut qb = QueryBuilder::new("SELECT * FROM outreach");
    push_filters(&mut qb, user_id, filter);
    qb.push(" ORDER BY sent_at DESC, id LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    Ok(qb.build_query_as::<OutreachRow>().fetch_all(pool).await?)
}

/// Most recent outreach to one contact.
pub async fn recent_for_contact(
    pool: &PgPool,
    contact_id: Uuid,
    limit: i64,
) -> Result<Vec<OutreachRow>> {
    Ok(sqlx::query_as::<_, OutreachRow>(
        "SELECT * FROM outreach WHERE contact_id = $1 ORDER BY sent_at DESC LIMIT $2",
    )
    .bind(contact_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Outreach sent at or after `since`, for the dashboard window.
pub async fn list_sent_since(
    pool: &PgPool,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<OutreachRow>> {
    Ok(sqlx::query_as::<_, OutreachRow>(
        "SELECT * FROM outreach WHERE user_id = $1 AND sent_at >= $2 ORDER BY sent_at DESC",
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?)
}

pub async fn get_outreach_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
    outreach_id: Uuid,
) -> Result<Option<OutreachRow>> {
    Ok(sqlx::query_as::<_, OutreachRow>(
        "SELECT * FROM outreach WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(outreach_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?)
}

/// Locks the outreach a follow-up belongs to. Callers that go on to lock the
/// follow-up itself take this lock first, matching the outreach update path.
pub async fn get_outreach_for_followup(
    conn: &mut PgConnection,
    user_id: Uuid,
    followup_id: Uuid,
) -> Result<Option<OutreachRow>> {
    Ok(sqlx::query_as::<_, OutreachRow>(
        r#"
        SELECT o.* FROM outreach o
        JOIN followups f ON f.outreach_id = o.id
        WHERE f.id = $1 AND f.user_id = $2
        FOR UPDATE OF o
        "#,
    )
    .bind(followup_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?)
}

pub async fn insert_outreach(conn: &mut PgConnection, new: NewOutreach<'_>) -> Result<OutreachRow> {
    Ok(sqlx::query_as::<_, OutreachRow>(
        r#"
        INSERT INTO outreach
            (id, user_id, contact_id, job_id, channel, message, personalization_score, outcome, sent_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.contact_id)
    .bind(new.job_id)
    .bind(new.channel.as_str())
    .bind(new.message)
    .bind(new.personalization_score)
    .bind(new.outcome.as_str())
    .bind(new.sent_at)
    .fetch_one(&mut *conn)
    .await?)
}

/// Writes the mutable columns of `row` back.
pub async fn save_outreach(conn: &mut PgConnection, row: &OutreachRow) -> Result<OutreachRow> {
    Ok(sqlx::query_as::<_, OutreachRow>(
        r#"
        UPDATE outreach SET
            channel = $2, message = $3, personalization_score = $4, outcome = $5,
            sent_at = $6, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(row.id)
    .bind(&row.channel)
    .bind(row.message.as_deref())
    .bind(row.personalization_score)
    .bind(&row.outcome)
    .bind(row.sent_at)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn set_outcome(
    conn: &mut PgConnection,
    outreach_id: Uuid,
    outcome: OutreachOutcome,
) -> Result<()> {
    sqlx::query("UPDATE outreach SET outcome = $2, updated_at = now() WHERE id = $1")
        .bind(outreach_id)
        .bind(outcome.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_outreach(pool: &PgPool, user_id: Uuid, outreach_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM outreach WHERE id = $1 AND user_id = $2")
        .bind(outreach_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
