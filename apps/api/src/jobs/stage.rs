//! Job pipeline state machine.
//!
//! APPLIED -> HR -> TECH -> OFFER, forward only, skipping allowed.
//! REJECTED is reachable from every non-terminal stage.
//! OFFER and REJECTED are terminal.

use thiserror::Error;

use crate::errors::AppError;
use crate::models::job::JobStage;

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("job is already in stage {0}")]
    SameStage(JobStage),

    #[error("stage {0} is terminal")]
    Terminal(JobStage),

    #[error("cannot move backward from {from} to {to}")]
    Backward { from: JobStage, to: JobStage },
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::InvalidTransition(e.to_string())
    }
}

/// Position in the forward pipeline; `None` for REJECTED.
pub fn pipeline_rank(stage: JobStage) -> Option<u8> {
    match stage {
        JobStage::Applied => Some(0),
        JobStage::Hr => Some(1),
        JobStage::Tech => Some(2),
        JobStage::Offer => Some(3),
        JobStage::Rejected => None,
    }
}

pub fn is_terminal(stage: JobStage) -> bool {
    matches!(stage, JobStage::Offer | JobStage::Rejected)
}

pub fn validate_transition(from: JobStage, to: JobStage) -> Result<(), TransitionError> {
    if from == to {
        return Err(TransitionError::SameStage(from));
    }
    if is_terminal(from) {
        return Err(TransitionError::Terminal(from));
    }
    match (pipeline_rank(from), pipeline_rank(to)) {
        (_, None) => Ok(()),
        (Some(f), Some(t)) if t > f => Ok(()),
        _ => Err(TransitionError::Backward { from, to }),
    }
}

/// Stages reachable from `from` in one move.
pub fn next_stages(from: JobStage) -> Vec<JobStage> {
    JobStage::ALL
        .iter()
        .copied()
        .filter(|to| validate_transition(from, *to).is_ok())
        .collect()
}
