//! Heat scoring: how warm a job application is right now.
//!
//! score = stage points + recency points + contact points + referral points,
//! clamped to 0..=100. Recency decays with a 7-day half-life from the last
//! touch. A rejected job is always 0.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::contact::ContactStrength;
use crate::models::job::JobStage;
use crate::models::text_enum;

pub const RECENCY_MAX_POINTS: f64 = 30.0;
pub const RECENCY_HALF_LIFE_DAYS: f64 = 7.0;

text_enum! {
    HeatLabel {
        Cold => "COLD",
        Warm => "WARM",
        Hot => "HOT",
        OnFire => "ON_FIRE",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferralSignal {
    #[default]
    None,
    Requested,
    Given,
}

/// Everything heat depends on besides the clock.
#[derive(Debug, Clone)]
pub struct HeatInputs {
    pub stage: JobStage,
    pub last_touch_at: DateTime<Utc>,
    pub best_contact: Option<ContactStrength>,
    pub referral: ReferralSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JobHeat {
    pub score: u32,
    /// 0 COLD, 1 WARM, 2 HOT, 3 ON_FIRE
    pub level: u8,
    pub label: HeatLabel,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatFactor {
    pub factor: &'static str,
    pub points: f64,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatExplanation {
    #[serde(flatten)]
    pub heat: JobHeat,
    pub factors: Vec<HeatFactor>,
}

pub fn stage_points(stage: JobStage) -> f64 {
    match stage {
        JobStage::Applied => 10.0,
        JobStage::Hr => 25.0,
        JobStage::Tech => 40.0,
        JobStage::Offer => 50.0,
        JobStage::Rejected => 0.0,
    }
}

pub fn contact_points(strength: Option<ContactStrength>) -> f64 {
    match strength {
        Some(ContactStrength::Strong) => 15.0,
        Some(ContactStrength::Medium) => 8.0,
        Some(ContactStrength::Weak) => 3.0,
        None => 0.0,
    }
}

pub fn referral_points(referral: ReferralSignal) -> f64 {
    match referral {
        ReferralSignal::Given => 10.0,
        ReferralSignal::Requested => 4.0,
        ReferralSignal::None => 0.0,
    }
}

/// Exponential decay: full points at zero age, half after one half-life.
pub fn recency_points(last_touch_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - last_touch_at).num_seconds() as f64 / 86_400.0;
    if days <= 0.0 {
        return RECENCY_MAX_POINTS;
    }
    RECENCY_MAX_POINTS * 0.5_f64.powf(days / RECENCY_HALF_LIFE_DAYS)
}

pub fn level_for(score: u32) -> (u8, HeatLabel) {
    match score {
        s if s >= 75 => (3, HeatLabel::OnFire),
        s if s >= 50 => (2, HeatLabel::Hot),
        s if s >= 25 => (1, HeatLabel::Warm),
        _ => (0, HeatLabel::Cold),
    }
}

pub fn explain_heat(inputs: &HeatInputs, now: DateTime<Utc>) -> HeatExplanation {
    if inputs.stage == JobStage::Rejected {
        return HeatExplanation {
            heat: JobHeat {
                score: 0,
                level: 0,
                label: HeatLabel::Cold,
            },
            factors: vec![HeatFactor {
                factor: "stage",
                points: 0.0,
                detail: "Rejected applications have no heat".to_string(),
            }],
        };
    }

    let days_idle = (now - inputs.last_touch_at).num_days().max(0);
    let factors = vec![
        HeatFactor {
            factor: "stage",
            points: stage_points(inputs.stage),
            detail: format!("Pipeline stage {}", inputs.stage),
        },
        HeatFactor {
            factor: "recency",
            points: round2(recency_points(inputs.last_touch_at, now)),
            detail: match days_idle {
                0 => "Touched today".to_string(),
                1 => "Last touched 1 day ago".to_string(),
                d => format!("Last touched {d} days ago"),
            },
        },
        HeatFactor {
            factor: "contact",
            points: contact_points(inputs.best_contact),
            detail: match inputs.best_contact {
                Some(s) => format!("Strongest contact on this job is {s}"),
                None => "No contact reached for this job".to_string(),
            },
        },
        HeatFactor {
            factor: "referral",
            points: referral_points(inputs.referral),
            detail: match inputs.referral {
                ReferralSignal::Given => "Referral given".to_string(),
                ReferralSignal::Requested => "Referral requested".to_string(),
                ReferralSignal::None => "No referral".to_string(),
            },
        },
    ];

    let raw: f64 = factors.iter().map(|f| f.points).sum();
    let score = raw.clamp(0.0, 100.0).round() as u32;
    let (level, label) = level_for(score);

    HeatExplanation {
        heat: JobHeat {
            score,
            level,
            label,
        },
        factors,
    }
}

pub fn compute_heat(inputs: &HeatInputs, now: DateTime<Utc>) -> JobHeat {
    explain_heat(inputs, now).heat
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn inputs(stage: JobStage, idle_days: i64) -> (HeatInputs, DateTime<Utc>) {
        let now = Utc::now();
        (
            HeatInputs {
                stage,
                last_touch_at: now - Duration::days(idle_days),
                best_contact: None,
                referral: ReferralSignal::None,
            },
            now,
        )
    }

    #[test]
    fn test_rejected_is_always_cold() {
        let (mut i, now) = inputs(JobStage::Rejected, 0);
        i.best_contact = Some(ContactStrength::Strong);
        i.referral = ReferralSignal::Given;
        let heat = compute_heat(&i, now);
        assert_eq!(heat.score, 0);
        assert_eq!(heat.label, HeatLabel::Cold);
    }

    #[test]
    fn test_fresh_applied_job_is_warm() {
        // 10 stage + 30 recency
        let (i, now) = inputs(JobStage::Applied, 0);
        let heat = compute_heat(&i, now);
        assert_eq!(heat.score, 40);
        assert_eq!(heat.level, 1);
    }

    #[test]
    fn test_recency_halves_every_seven_days() {
        let now = Utc::now();
        let one = recency_points(now - Duration::days(7), now);
        let two = recency_points(now - Duration::days(14), now);
        assert!((one - 15.0).abs() < 0.01, "got {one}");
        assert!((two - 7.5).abs() < 0.01, "got {two}");
    }

    #[test]
    fn test_future_touch_gets_full_recency() {
        let now = Utc::now();
        assert_eq!(
            recency_points(now + Duration::hours(3), now),
            RECENCY_MAX_POINTS
        );
    }

    #[test]
    fn test_everything_maxed_clamps_to_100() {
        let (mut i, now) = inputs(JobStage::Offer, 0);
        i.best_contact = Some(ContactStrength::Strong);
        i.referral = ReferralSignal::Given;
        // 50 + 30 + 15 + 10 = 105
        let heat = compute_heat(&i, now);
        assert_eq!(heat.score, 100);
        assert_eq!(heat.label, HeatLabel::OnFire);
    }

    #[test]
    fn test_stale_tech_job_cools_down() {
        let (i, now) = inputs(JobStage::Tech, 60);
        let heat = compute_heat(&i, now);
        // 40 + ~0.079
        assert_eq!(heat.score, 40);
        assert_eq!(heat.label, HeatLabel::Warm);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for(24), (0, HeatLabel::Cold));
        assert_eq!(level_for(25), (1, HeatLabel::Warm));
        assert_eq!(level_for(49), (1, HeatLabel::Warm));
        assert_eq!(level_for(50), (2, HeatLabel::Hot));
        assert_eq!(level_for(75), (3, HeatLabel::OnFire));
    }

    #[test]
    fn test_explanation_lists_each_factor() {
        let (mut i, now) = inputs(JobStage::Hr, 3);
        i.best_contact = Some(ContactStrength::Medium);
        i.referral = ReferralSignal::Requested;
        let explained = explain_heat(&i, now);
        let names: Vec<_> = explained.factors.iter().map(|f| f.factor).collect();
        assert_eq!(names, vec!["stage", "recency", "contact", "referral"]);
        assert_eq!(explained.factors[1].detail, "Last touched 3 days ago");
        assert_eq!(explained.factors[2].points, 8.0);
        assert_eq!(explained.factors[3].points, 4.0);
    }
}
