use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    ContactStrength {
        Weak => "WEAK",
        Medium => "MEDIUM",
        Strong => "STRONG",
    }
}

impl ContactStrength {
    /// Inverse of the SQL ordinal: WEAK 1, MEDIUM 2, STRONG 3.
    pub fn from_rank(rank: i32) -> Option<Self> {
        match rank {
            1 => Some(ContactStrength::Weak),
            2 => Some(ContactStrength::Medium),
            3 => Some(ContactStrength::Strong),
            _ => None,
        }
    }
}

text_enum! {
    ReferralStatus {
        Requested => "REQUESTED",
        Given => "GIVEN",
        Declined => "DECLINED",
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContactRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub phone: Option<String>,
    pub strength: String,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactRow {
    pub fn strength(&self) -> ContactStrength {
        self.strength.parse().unwrap_or(ContactStrength::Weak)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReferralRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contact_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
