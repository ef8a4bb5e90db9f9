use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    EventStatus {
        Planned => "PLANNED",
        Attended => "ATTENDED",
        Skipped => "SKIPPED",
    }
}

text_enum! {
    ProjectStatus {
        Idea => "IDEA",
        Active => "ACTIVE",
        Shipped => "SHIPPED",
        Paused => "PAUSED",
    }
}

text_enum! {
    BoostCategory {
        Learning => "LEARNING",
        Portfolio => "PORTFOLIO",
        Networking => "NETWORKING",
        Content => "CONTENT",
        Other => "OTHER",
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub url: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRow {
    pub fn status(&self) -> EventStatus {
        self.status.parse().unwrap_or(EventStatus::Planned)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventContactRow {
    pub event_id: Uuid,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub note: Option<String>,
    pub follow_up_due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub repo_url: Option<String>,
    pub tech_stack: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CodeReviewRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub reviewer_contact_id: Option<Uuid>,
    pub summary: String,
    pub url: Option<String>,
    pub reviewed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BoostTaskRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub category: String,
    pub impact: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
