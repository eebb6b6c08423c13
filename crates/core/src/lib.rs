pub mod availability;
pub mod block_planner;
pub mod conflict;
pub mod coverage;
pub mod entity_store;
pub mod error;
pub mod explain;
pub mod invariants;
pub mod need;
pub mod priority;
pub mod rooms;
pub mod scoring;
pub mod validate;

use async_trait::async_trait;

pub use availability::AvailabilityCache;
pub use block_planner::BlockPlanner;
pub use conflict::ConflictIndex;
pub use coverage::{Coverage, CoverageAnalyzer};
pub use entity_store::{EntityStore, InMemoryStore};
pub use error::{IndexError, SolveError, ValidationError};
pub use types::InputError;
pub use explain::Explainer;
pub use invariants::{is_contiguous, would_create_three_consecutive};
pub use need::derive_needs;
pub use priority::PriorityRegistry;
pub use rooms::pick_room;
pub use scoring::SoftConstraintScorer;
pub use validate::validate;

use types::{ScheduleResult, SolveRequest};

/// The seam every placement strategy - and the orchestrator itself - implements. Mirrors the
/// teacher's `Solver::solve` trait: one uniform async entry point per strategy family, so the
/// job queue can hold any of them behind an `InMemJobs<S: Solver>` without knowing which
/// algorithm produced the result.
#[async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(&self, req: SolveRequest) -> anyhow::Result<ScheduleResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Class, Lesson, SchoolType};

    #[test]
    fn validate_rejects_duplicate_class_ids() {
        let store = InMemoryStore::new(types::Snapshot {
            school_type: SchoolType::HighSchool,
            classes: vec![
                Class {
                    class_id: "c1".into(),
                    name: "9A".into(),
                    grade: 9,
                    school_type: SchoolType::HighSchool,
                },
                Class {
                    class_id: "c1".into(),
                    name: "9B".into(),
                    grade: 9,
                    school_type: SchoolType::HighSchool,
                },
            ],
            teachers: vec![],
            lessons: vec![Lesson {
                lesson_id: "math".into(),
                name: "Math".into(),
                school_type: SchoolType::HighSchool,
                is_difficult: true,
                is_light_activity: false,
            }],
            classrooms: vec![types::Classroom {
                room_id: "r1".into(),
                name: "101".into(),
                capacity: 30,
            }],
            curriculum: vec![],
            assignments: vec![],
            availability: vec![],
        });
        assert!(validate(&store).is_err());
    }
}
