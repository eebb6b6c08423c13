use thiserror::Error;
use types::{ClassId, InputError, LessonId};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid instance: one or more input errors")]
    Invalid(Vec<InputError>),
}

impl ValidationError {
    pub fn errors(&self) -> &[InputError] {
        match self {
            ValidationError::Invalid(errors) => errors,
        }
    }
}

/// Raised when the occupancy indices disagree with the placement list they were built from.
/// Should never happen in practice; existence of this type is itself a design decision -
/// the strict and CSP placers both mutate the index incrementally rather than rebuilding it,
/// so a desync would otherwise surface as a silent double-booking. Per spec.md §7, this is a
/// placer bug, not a recoverable condition: callers are expected to abort the run on it.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index desync: {axis} entry for {id} at {day:?}.{period} was not present to remove")]
    IndexDesync {
        axis: &'static str,
        id: String,
        day: types::Day,
        period: types::Period,
    },
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("backtrack limit exceeded after {0} attempts")]
    BacktrackLimitExceeded(u64),
    #[error("no feasible domain remains for {class_id}/{lesson_id}")]
    DomainExhausted {
        class_id: ClassId,
        lesson_id: LessonId,
    },
    #[error("wall time budget of {0}s exceeded")]
    TimeBudgetExceeded(u64),
}
