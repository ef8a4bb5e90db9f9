use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    OutreachChannel {
        Email => "EMAIL",
        Linkedin => "LINKEDIN",
        Phone => "PHONE",
        InPerson => "IN_PERSON",
        Other => "OTHER",
    }
}

text_enum! {
    OutreachOutcome {
        Pending => "PENDING",
        Replied => "REPLIED",
        Positive => "POSITIVE",
        Negative => "NEGATIVE",
        NoResponse => "NO_RESPONSE",
    }
}

impl OutreachOutcome {
    /// The contact answered, whatever the answer was.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            OutreachOutcome::Replied | OutreachOutcome::Positive | OutreachOutcome::Negative
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OutreachRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contact_id: Uuid,
    pub job_id: Option<Uuid>,
    pub channel: String,
    pub message: Option<String>,
    pub personalization_score: i32,
    pub outcome: String,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutreachRow {
    pub fn outcome(&self) -> OutreachOutcome {
        self.outcome.parse().unwrap_or(OutreachOutcome::Pending)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FollowUpRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub outreach_id: Uuid,
    pub contact_id: Uuid,
    pub job_id: Option<Uuid>,
    pub attempt: i32,
    pub due_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FollowUpRow {
    pub fn is_open(&self) -> bool {
        self.sent_at.is_none() && self.cancelled_at.is_none()
    }
}
