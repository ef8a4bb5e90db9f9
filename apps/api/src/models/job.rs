use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    /// Pipeline stage. APPLIED < HR < TECH < OFFER; REJECTED ends any of them.
    JobStage {
        Applied => "APPLIED",
        Hr => "HR",
        Tech => "TECH",
        Offer => "OFFER",
        Rejected => "REJECTED",
    }
}

text_enum! {
    ApplicationChannel {
        Portal => "PORTAL",
        Email => "EMAIL",
        Referral => "REFERRAL",
        Recruiter => "RECRUITER",
        Other => "OTHER",
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub role: String,
    pub url: Option<String>,
    pub source: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub notes: Option<String>,
    pub stage: String,
    pub last_touch_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    pub fn stage(&self) -> JobStage {
        self.stage.parse().unwrap_or(JobStage::Applied)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub channel: String,
    pub resume_version: Option<String>,
    pub cover_letter: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobStatusHistoryRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub from_stage: Option<String>,
    pub to_stage: String,
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}
