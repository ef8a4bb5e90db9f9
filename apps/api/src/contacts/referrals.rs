//! Referral rows linking a contact to a job.

use anyhow::Result;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::models::contact::{ReferralRow, ReferralStatus};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReferralFilter {
    pub job_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
}

pub async fn list_referrals(
    pool: &PgPool,
    user_id: Uuid,
    filter: &ReferralFilter,
) -> Result<Vec<ReferralRow>> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT * FROM referrals WHERE user_id = ");
    qb.push_bind(user_id);
    if let Some(job_id) = filter.job_id {
        qb.push(" AND job_id = ").push_bind(job_id);
    }
    if let Some(contact_id) = filter.contact_id {
        qb.push(" AND contact_id = ").push_bind(contact_id);
    }
    qb.push(" ORDER BY updated_at DESC, id");
    Ok(qb.build_query_as::<ReferralRow>().fetch_all(pool).await?)
}

pub async fn get_referral(
    conn: &mut PgConnection,
    user_id: Uuid,
    referral_id: Uuid,
) -> Result<Option<ReferralRow>> {
    Ok(sqlx::query_as::<_, ReferralRow>(
        "SELECT * FROM referrals WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(referral_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?)
}

pub async fn insert_referral(
    conn: &mut PgConnection,
    user_id: Uuid,
    contact_id: Uuid,
    job_id: Uuid,
    status: ReferralStatus,
    note: Option<&str>,
) -> Result<ReferralRow> {
    Ok(sqlx::query_as::<_, ReferralRow>(
        r#"
        INSERT INTO referrals (id, user_id, contact_id, job_id, status, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(contact_id)
    .bind(job_id)
    .bind(status.as_str())
    .bind(note)
    .fetch_one(&mut *conn)
    .await?)
}

/// `note = Some("")` clears the note.
pub async fn update_referral(
    conn: &mut PgConnection,
    referral_id: Uuid,
    status: Option<ReferralStatus>,
    note: Option<&str>,
) -> Result<ReferralRow> {
    Ok(sqlx::query_as::<_, ReferralRow>(
        r#"
        UPDATE referrals SET
            status = COALESCE($2, status),
            note = CASE WHEN $3::text IS NULL THEN note ELSE NULLIF($3, '') END,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(referral_id)
    .bind(status.map(|s| s.as_str()))
    .bind(note)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn delete_referral(pool: &PgPool, user_id: Uuid, referral_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM referrals WHERE id = $1 AND user_id = $2")
        .bind(referral_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
