//! Personalization score for an outreach message, 0..=100.
//!
//! | signal                                 | points |
//! |----------------------------------------|--------|
//! | mentions the contact's first name      | 30     |
//! | mentions the contact's company         | 25     |
//! | asks a question or has a call to action| 20     |
//! | 200..=1200 characters long             | 15     |
//! | mentions the job's role                | 10     |

use std::sync::LazyLock;

use regex::Regex;

pub const FIRST_NAME_POINTS: i32 = 30;
pub const COMPANY_POINTS: i32 = 25;
pub const CALL_TO_ACTION_POINTS: i32 = 20;
pub const LENGTH_POINTS: i32 = 15;
pub const ROLE_POINTS: i32 = 10;

pub const MIN_GOOD_LENGTH: usize = 200;
pub const MAX_GOOD_LENGTH: usize = 1200;

static CALL_TO_ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(would you|could you|could we|can we|are you open|open to|let me know|happy to chat|grab (a )?coffee|quick (call|chat)|hop on)\b",
    )
    .expect("valid regex")
});

/// What the message is scored against.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub contact_name: &'a str,
    pub company: Option<&'a str>,
    pub role: Option<&'a str>,
}

pub fn personalization_score(message: &str, ctx: &ScoreContext<'_>) -> i32 {
    let message = message.trim();
    if message.is_empty() {
        return 0;
    }
    let lower = message.to_lowercase();
    let mentions = |needle: Option<&str>| {
        needle
            .map(|n| n.trim().to_lowercase())
            .filter(|n| n.chars().count() >= 2)
            .is_some_and(|n| lower.contains(&n))
    };

    let mut score = 0;
    if mentions(ctx.contact_name.split_whitespace().next()) {
        score += FIRST_NAME_POINTS;
    }
    if mentions(ctx.company) {
        score += COMPANY_POINTS;
    }
    if message.contains('?') || CALL_TO_ACTION_RE.is_match(message) {
        score += CALL_TO_ACTION_POINTS;
    }
    if (MIN_GOOD_LENGTH..=MAX_GOOD_LENGTH).contains(&message.chars().count()) {
        score += LENGTH_POINTS;
    }
    if mentions(ctx.role) {
        score += ROLE_POINTS;
    }
    score.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: ScoreContext<'static> = ScoreContext {
        contact_name: "Priya Raman",
        company: Some("Stripe"),
        role: Some("Backend Engineer"),
    };

    #[test]
    fn test_empty_message_scores_zero() {
        assert_eq!(personalization_score("   ", &CTX), 0);
    }

    #[test]
    fn test_generic_message_scores_low() {
        assert_eq!(personalization_score("Hello, I am looking for a job.", &CTX), 0);
    }

    #[test]
    fn test_each_signal_counts() {
        assert_eq!(personalization_score("Hi priya", &CTX), FIRST_NAME_POINTS);
        assert_eq!(personalization_score("Love what STRIPE ships", &CTX), COMPANY_POINTS);
        assert_eq!(
            personalization_score("Are you open to a quick call", &CTX),
            CALL_TO_ACTION_POINTS
        );
        assert_eq!(
            personalization_score("Any tips?", &CTX),
            CALL_TO_ACTION_POINTS
        );
        assert_eq!(
            personalization_score("Applying for the backend engineer opening", &CTX),
            ROLE_POINTS
        );
    }

    #[test]
    fn test_length_window() {
        let short = "x".repeat(MIN_GOOD_LENGTH - 1);
        let good = "x".repeat(MIN_GOOD_LENGTH);
        let long = "x".repeat(MAX_GOOD_LENGTH + 1);
        assert_eq!(personalization_score(&short, &CTX), 0);
        assert_eq!(personalization_score(&good, &CTX), LENGTH_POINTS);
        assert_eq!(personalization_score(&long, &CTX), 0);
    }

    #[test]
    fn test_fully_personalized_message_hits_100() {
        let mut message = String::from(
            "Hi Priya, I saw the Backend Engineer opening at Stripe and would love to hear how \
             your team approaches API versioning. Would you be open to a 15 minute chat next week? ",
        );
        while message.chars().count() < MIN_GOOD_LENGTH {
            message.push_str("Thanks again. ");
        }
        assert_eq!(personalization_score(&message, &CTX), 100);
    }

    #[test]
    fn test_missing_context_is_ignored() {
        let ctx = ScoreContext {
            contact_name: "",
            company: None,
            role: Some(" "),
        };
        assert_eq!(personalization_score("Hello there", &ctx), 0);
    }
}
