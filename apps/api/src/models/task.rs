use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    TaskStatus {
        Todo => "TODO",
        InProgress => "IN_PROGRESS",
        Done => "DONE",
        Blocked => "BLOCKED",
    }
}

text_enum! {
    TaskPriority {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Urgent => "URGENT",
    }
}

text_enum! {
    Recurrence {
        Daily => "DAILY",
        Weekdays => "WEEKDAYS",
        Weekly => "WEEKLY",
        Monthly => "MONTHLY",
    }
}

text_enum! {
    /// Which growth entity a task is linked to.
    GrowType {
        Event => "EVENT",
        Project => "PROJECT",
        Boost => "BOOST",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub due_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub checklist: Json<Vec<ChecklistItem>>,
    pub recurrence: Option<String>,
    /// Day of month a MONTHLY series was first due on.
    #[serde(skip)]
    pub recurrence_day: Option<i16>,
    pub job_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub grow_type: Option<String>,
    pub grow_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn status(&self) -> TaskStatus {
        self.status.parse().unwrap_or(TaskStatus::Todo)
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority.parse().unwrap_or(TaskPriority::Medium)
    }

    pub fn recurrence(&self) -> Option<Recurrence> {
        self.recurrence.as_deref().and_then(|r| r.parse().ok())
    }

    pub fn is_open(&self) -> bool {
        self.status() != TaskStatus::Done
    }
}
