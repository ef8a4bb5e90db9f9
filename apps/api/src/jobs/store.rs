use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::db::contains_pattern;
use crate::jobs::heat::{HeatInputs, ReferralSignal};
use crate::models::contact::ContactStrength;
use crate::models::job::{
    ApplicationChannel, JobApplicationRow, JobRow, JobStage, JobStatusHistoryRow,
};
use crate::pagination::PageParams;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct JobFilter {
    pub stage: Option<JobStage>,
    pub q: Option<String>,
    /// Minimum heat level (0..=3); applied after heat is computed.
    pub min_heat: Option<u8>,
    #[serde(default)]
    pub include_archived: bool,
    pub sort: Option<JobSort>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSort {
    #[default]
    Updated,
    Created,
    Company,
    Heat,
}

pub struct NewJob<'a> {
    pub user_id: Uuid,
    pub company: &'a str,
    pub role: &'a str,
    pub url: Option<&'a str>,
    pub source: Option<&'a str>,
    pub location: Option<&'a str>,
    pub salary: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub stage: JobStage,
}

/// `None` leaves a column untouched; `Some("")` clears an optional column.
#[derive(Debug, Default)]
pub struct JobChanges {
    pub company: Option<String>,
    pub role: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub notes: Option<String>,
}

pub struct NewApplication<'a> {
    pub job_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub channel: ApplicationChannel,
    pub resume_version: Option<&'a str>,
    pub cover_letter: bool,
    pub notes: Option<&'a str>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filter: &JobFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if !filter.include_archived {
        qb.push(" AND archived_at IS NULL");
    }
    if let Some(stage) = filter.stage {
        qb.push(" AND stage = ").push_bind(stage.as_str());
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = contains_pattern(q);
        qb.push(" AND (company ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR role ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn order_clause(sort: JobSort) -> &'static str {
    match sort {
        JobSort::Created => " ORDER BY created_at DESC, id",
        JobSort::Company => " ORDER BY lower(company) ASC, lower(role) ASC, id",
        JobSort::Updated | JobSort::Heat => " ORDER BY updated_at DESC, id",
    }
}

pub async fn count_jobs(pool: &PgPool, user_id: Uuid, filter: &JobFilter) -> Result<i64> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM jobs");
    push_filters(&mut qb, user_id, filter);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

/// Lists jobs matching `filter`. `page = None` returns every match.
pub async fn list_jobs(
    pool: &PgPool,
    user_id: Uuid,
    filter: &JobFilter,
    page: Option<&PageParams>,
) -> Result<Vec<JobRow>> {
    let mut qb = QueryBuilder::new("SELECT * FROM jobs");
    push_filters(&mut qb, user_id, filter);
    qb.push(order_clause(filter.sort.unwrap_or_default()));
    if let Some(page) = page {
        qb.push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
    }
    Ok(qb.build_query_as::<JobRow>().fetch_all(pool).await?)
}

/// Active (non-archived, non-terminal) jobs, used by the dashboard.
pub async fn list_active_jobs(pool: &PgPool, user_id: Uuid) -> Result<Vec<JobRow>> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        SELECT * FROM jobs
        WHERE user_id = $1 AND archived_at IS NULL AND stage NOT IN ('OFFER', 'REJECTED')
        ORDER BY updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn stage_counts(pool: &PgPool, user_id: Uuid) -> Result<Vec<(String, i64)>> {
    Ok(sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT stage, COUNT(*) FROM jobs
        WHERE user_id = $1 AND archived_at IS NULL
        GROUP BY stage
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn get_job<'e, E>(db: E, user_id: Uuid, job_id: Uuid) -> Result<Option<JobRow>>
where
    E: PgExecutor<'e>,
{
    Ok(
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1 AND user_id = $2")
            .bind(job_id)
            .bind(user_id)
            .fetch_optional(db)
            .await?,
    )
}

/// Row-locking variant for transactional stage changes.
pub async fn get_job_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
    job_id: Uuid,
) -> Result<Option<JobRow>> {
    Ok(sqlx::query_as::<_, JobRow>(
        "SELECT * FROM jobs WHERE id = $1 AND user_id = $2 AND archived_at IS NULL FOR UPDATE",
    )
    .bind(job_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?)
}

pub async fn job_exists<'e, E>(db: E, user_id: Uuid, job_id: Uuid) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = $1 AND user_id = $2 AND archived_at IS NULL)",
    )
    .bind(job_id)
    .bind(user_id)
    .fetch_one(db)
    .await?)
}

/// `(id, company)` pairs for resolving `+company` references.
pub async fn job_candidates(pool: &PgPool, user_id: Uuid) -> Result<Vec<(Uuid, String)>> {
    Ok(sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT id, company FROM jobs
        WHERE user_id = $1 AND archived_at IS NULL
        ORDER BY updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Inserts the job and its initial status-history row.
pub async fn create_job(conn: &mut PgConnection, new: NewJob<'_>) -> Result<JobRow> {
    let job: JobRow = sqlx::query_as(
        r#"
        INSERT INTO jobs (id, user_id, company, role, url, source, location, salary, notes, stage)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.company)
    .bind(new.role)
    .bind(new.url)
    .bind(new.source)
    .bind(new.location)
    .bind(new.salary)
    .bind(new.notes)
    .bind(new.stage.as_str())
    .fetch_one(&mut *conn)
    .await?;

    insert_history(conn, job.id, None, new.stage, Some("Created")).await?;
    Ok(job)
}

pub async fn update_job(
    pool: &PgPool,
    user_id: Uuid,
    job_id: Uuid,
    changes: &JobChanges,
) -> Result<Option<JobRow>> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            company  = COALESCE($3, company),
            role     = COALESCE($4, role),
            url      = CASE WHEN $5::text IS NULL THEN url ELSE NULLIF($5, '') END,
            source   = CASE WHEN $6::text IS NULL THEN source ELSE NULLIF($6, '') END,
            location = CASE WHEN $7::text IS NULL THEN location ELSE NULLIF($7, '') END,
            salary   = CASE WHEN $8::text IS NULL THEN salary ELSE NULLIF($8, '') END,
            notes    = CASE WHEN $9::text IS NULL THEN notes ELSE NULLIF($9, '') END,
            updated_at = now()
        WHERE id = $1 AND user_id = $2 AND archived_at IS NULL
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(user_id)
    .bind(changes.company.as_deref())
    .bind(changes.role.as_deref())
    .bind(changes.url.as_deref())
    .bind(changes.source.as_deref())
    .bind(changes.location.as_deref())
    .bind(changes.salary.as_deref())
    .bind(changes.notes.as_deref())
    .fetch_optional(pool)
    .await?)
}

/// Soft delete. Returns false when nothing was archived.
pub async fn archive_job(pool: &PgPool, user_id: Uuid, job_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE jobs SET archived_at = now(), updated_at = now()
        WHERE id = $1 AND user_id = $2 AND archived_at IS NULL
        "#,
    )
    .bind(job_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Moves the job to `to`, records history and touches the job.
/// The caller has already validated the transition.
pub async fn set_stage(
    conn: &mut PgConnection,
    job: &JobRow,
    to: JobStage,
    note: Option<&str>,
    at: DateTime<Utc>,
) -> Result<JobRow> {
    let updated: JobRow = sqlx::query_as(
        r#"
        UPDATE jobs SET stage = $2,
            last_touch_at = GREATEST(last_touch_at, $3),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job.id)
    .bind(to.as_str())
    .bind(at)
    .fetch_one(&mut *conn)
    .await?;

    insert_history(conn, job.id, Some(job.stage()), to, note).await?;
    Ok(updated)
}

async fn insert_history(
    conn: &mut PgConnection,
    job_id: Uuid,
    from: Option<JobStage>,
    to: JobStage,
    note: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO job_status_history (id, job_id, from_stage, to_stage, note)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job_id)
    .bind(from.map(|s| s.as_str()))
    .bind(to.as_str())
    .bind(note)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Moves `last_touch_at` forward to `at`; never backward.
pub async fn touch_job(conn: &mut PgConnection, job_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE jobs SET last_touch_at = GREATEST(last_touch_at, $2), updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_application(
    conn: &mut PgConnection,
    new: NewApplication<'_>,
) -> Result<JobApplicationRow> {
    Ok(sqlx::query_as::<_, JobApplicationRow>(
        r#"
        INSERT INTO job_applications
            (id, job_id, applied_at, channel, resume_version, cover_letter, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.job_id)
    .bind(new.applied_at)
    .bind(new.channel.as_str())
    .bind(new.resume_version)
    .bind(new.cover_letter)
    .bind(new.notes)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn list_applications(pool: &PgPool, job_id: Uuid) -> Result<Vec<JobApplicationRow>> {
    Ok(sqlx::query_as::<_, JobApplicationRow>(
        "SELECT * FROM job_applications WHERE job_id = $1 ORDER BY applied_at DESC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?)
}

pub async fn count_applications_since(
    pool: &PgPool,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM job_applications a
        JOIN jobs j ON j.id = a.job_id
        WHERE j.user_id = $1 AND a.applied_at >= $2
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?)
}

pub async fn list_history(pool: &PgPool, job_id: Uuid) -> Result<Vec<JobStatusHistoryRow>> {
    Ok(sqlx::query_as::<_, JobStatusHistoryRow>(
        "SELECT * FROM job_status_history WHERE job_id = $1 ORDER BY changed_at ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, FromRow)]
struct HeatSignalRow {
    job_id: Uuid,
    best_contact_rank: Option<i32>,
    referral_given: bool,
    referral_requested: bool,
}

/// Heat inputs for each job in `jobs`, keyed by job id.
///
/// The strongest contact counts both outreach and referral contacts.
pub async fn load_heat_inputs(
    pool: &PgPool,
    user_id: Uuid,
    jobs: &[JobRow],
) -> Result<HashMap<Uuid, HeatInputs>> {
    if jobs.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();

    let signals: Vec<HeatSignalRow> = sqlx::query_as(
        r#"
        SELECT j.id AS job_id,
            (SELECT MAX(CASE c.strength WHEN 'STRONG' THEN 3 WHEN 'MEDIUM' THEN 2 WHEN 'WEAK' THEN 1 ELSE 0 END)
               FROM contacts c
              WHERE c.id IN (SELECT o.contact_id FROM outreach o WHERE o.job_id = j.id
                             UNION
                             SELECT r.contact_id FROM referrals r WHERE r.job_id = j.id)
            ) AS best_contact_rank,
            EXISTS(SELECT 1 FROM referrals r WHERE r.job_id = j.id AND r.status = 'GIVEN') AS referral_given,
            EXISTS(SELECT 1 FROM referrals r WHERE r.job_id = j.id AND r.status = 'REQUESTED') AS referral_requested
        FROM jobs j
        WHERE j.user_id = $1 AND j.id = ANY($2)
        "#,
    )
    .bind(user_id)
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let by_job: HashMap<Uuid, HeatSignalRow> =
        signals.into_iter().map(|s| (s.job_id, s)).collect();

    Ok(jobs
        .iter()
        .map(|job| {
            let signal = by_job.get(&job.id);
            let referral = match signal {
                Some(s) if s.referral_given => ReferralSignal::Given,
                Some(s) if s.referral_requested => ReferralSignal::Requested,
                _ => ReferralSignal::None,
            };
            let inputs = HeatInputs {
                stage: job.stage(),
                last_touch_at: job.last_touch_at,
                best_contact: signal
                    .and_then(|s| s.best_contact_rank)
                    .and_then(ContactStrength::from_rank),
                referral,
            };
            (job.id, inputs)
        })
        .collect())
}
