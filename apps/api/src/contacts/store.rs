use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::db::contains_pattern;
use crate::models::contact::{ContactRow, ContactStrength};
use crate::pagination::PageParams;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ContactFilter {
    pub strength: Option<ContactStrength>,
    pub tag: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

pub struct NewContact<'a> {
    pub user_id: Uuid,
    pub name: &'a str,
    pub company: Option<&'a str>,
    pub title: Option<&'a str>,
    pub email: Option<&'a str>,
    pub linkedin_url: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub strength: ContactStrength,
    pub tags: &'a [String],
    pub notes: Option<&'a str>,
}

/// `None` leaves a column untouched; `Some("")` clears an optional column.
#[derive(Debug, Default)]
pub struct ContactChanges {
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub strength: Option<ContactStrength>,
    pub tags: Option<Vec<String>>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filter: &ContactFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if !filter.include_archived {
        qb.push(" AND archived_at IS NULL");
    }
    if let Some(strength) = filter.strength {
        qb.push(" AND strength = ").push_bind(strength.as_str());
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        qb.push(" AND ")
            .push_bind(tag.trim_start_matches('#').to_lowercase())
            .push(" = ANY(tags)");
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = contains_pattern(q);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR company ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn count_contacts(pool: &PgPool, user_id: Uuid, filter: &ContactFilter) -> Result<i64> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM contacts");
    push_filters(&mut qb, user_id, filter);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

pub async fn list_contacts(
    pool: &PgPool,
    user_id: Uuid,
    filter: &ContactFilter,
    page: &PageParams,
) -> Result<Vec<ContactRow>> {
    let mut qb = QueryBuilder::new("SELECT * FROM contacts");
    push_filters(&mut qb, user_id, filter);
    qb.push(" ORDER BY lower(name) ASC, id LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    Ok(qb.build_query_as::<ContactRow>().fetch_all(pool).await?)
}

/// Runs on the pool or inside an open transaction.
pub async fn get_contact<'e, E>(db: E, user_id: Uuid, contact_id: Uuid) -> Result<Option<ContactRow>>
where
    E: PgExecutor<'e>,
{
    Ok(
        sqlx::query_as::<_, ContactRow>("SELECT * FROM contacts WHERE id = $1 AND user_id = $2")
            .bind(contact_id)
            .bind(user_id)
            .fetch_optional(db)
            .await?,
    )
}

pub async fn contact_exists<'e, E>(db: E, user_id: Uuid, contact_id: Uuid) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM contacts WHERE id = $1 AND user_id = $2 AND archived_at IS NULL)",
    )
    .bind(contact_id)
    .bind(user_id)
    .fetch_one(db)
    .await?)
}

/// `(id, name)` pairs for resolving `@name` references.
pub async fn contact_candidates(pool: &PgPool, user_id: Uuid) -> Result<Vec<(Uuid, String)>> {
    Ok(sqlx::query_as::<_, (Uuid, String)>(
        "SELECT id, name FROM contacts WHERE user_id = $1 AND archived_at IS NULL ORDER BY name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn strength_counts(pool: &PgPool, user_id: Uuid) -> Result<Vec<(String, i64)>> {
    Ok(sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT strength, COUNT(*) FROM contacts
        WHERE user_id = $1 AND archived_at IS NULL
        GROUP BY strength
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn create_contact(pool: &PgPool, new: NewContact<'_>) -> Result<ContactRow> {
    Ok(sqlx::query_as::<_, ContactRow>(
        r#"
        INSERT INTO contacts
            (id, user_id, name, company, title, email, linkedin_url, phone, strength, tags, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.name)
    .bind(new.company)
    .bind(new.title)
    .bind(new.email)
    .bind(new.linkedin_url)
    .bind(new.phone)
    .bind(new.strength.as_str())
    .bind(new.tags)
    .bind(new.notes)
    .fetch_one(pool)
    .await?)
}

pub async fn update_contact(
    pool: &PgPool,
    user_id: Uuid,
    contact_id: Uuid,
    changes: &ContactChanges,
) -> Result<Option<ContactRow>> {
    Ok(sqlx::query_as::<_, ContactRow>(
        r#"
        UPDATE contacts SET
            name         = COALESCE($3, name),
            company      = CASE WHEN $4::text IS NULL THEN company ELSE NULLIF($4, '') END,
            title        = CASE WHEN $5::text IS NULL THEN title ELSE NULLIF($5, '') END,
            email        = CASE WHEN $6::text IS NULL THEN email ELSE NULLIF($6, '') END,
            linkedin_url = CASE WHEN $7::text IS NULL THEN linkedin_url ELSE NULLIF($7, '') END,
            phone        = CASE WHEN $8::text IS NULL THEN phone ELSE NULLIF($8, '') END,
            notes        = CASE WHEN $9::text IS NULL THEN notes ELSE NULLIF($9, '') END,
            strength     = COALESCE($10, strength),
            tags         = COALESCE($11, tags),
            updated_at   = now()
        WHERE id = $1 AND user_id = $2 AND archived_at IS NULL
        RETURNING *
        "#,
    )
    .bind(contact_id)
    .bind(user_id)
    .bind(changes.name.as_deref())
    .bind(changes.company.as_deref())
    .bind(changes.title.as_deref())
    .bind(changes.email.as_deref())
    .bind(changes.linkedin_url.as_deref())
    .bind(changes.phone.as_deref())
    .bind(changes.notes.as_deref())
    .bind(changes.strength.map(|s| s.as_str()))
    .bind(changes.tags.as_deref())
    .fetch_optional(pool)
    .await?)
}

/// Soft delete. Returns false when nothing was archived.
pub async fn archive_contact(pool: &PgPool, user_id: Uuid, contact_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE contacts SET archived_at = now(), updated_at = now()
        WHERE id = $1 AND user_id = $2 AND archived_at IS NULL
        "#,
    )
    .bind(contact_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Records that the contact was reached at `at`; never moves backward.
pub async fn mark_contacted(
    conn: &mut PgConnection,
    contact_id: Uuid,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE contacts SET
            last_contacted_at = GREATEST(COALESCE(last_contacted_at, $2), $2),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(contact_id)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
