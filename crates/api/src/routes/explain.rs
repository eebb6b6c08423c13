use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use sched_core::{derive_needs, ConflictIndex, CoverageAnalyzer, Explainer, InMemoryStore, SoftConstraintScorer};
use types::{ExplainReport, FailureReason, Placement, Snapshot};

#[derive(Deserialize, ToSchema)]
pub struct ExplainIn {
    pub snapshot: Snapshot,
    pub placements: Vec<Placement>,
}

#[derive(Serialize, ToSchema)]
pub struct ExplainOut {
    pub coverage_pct: f64,
    pub soft_score: f64,
    pub conflicts: usize,
    pub report: ExplainReport,
}

/// Re-derives a `Coverage`/`ConflictIndex` view of a caller-supplied schedule and walks any
/// shortfall through `Explainer` to produce the same recommendations a solve run would have
/// logged, without re-running a solver.
#[utoipa::path(
    post,
    path = "/v1/explain",
    request_body = ExplainIn,
    responses(
    (status = 200, description = "Coverage, soft-score, and failure breakdown for a supplied schedule", body = ExplainOut)
    )
)]
pub async fn explain(Json(input): Json<ExplainIn>) -> Json<ExplainOut> {
    let store = InMemoryStore::new(input.snapshot);
    let needs = derive_needs(&store);
    let placements = input.placements;

    let coverage = CoverageAnalyzer::analyze(&needs, &placements);
    let conflicts = ConflictIndex::check_all(&placements, false);
    let scorer = SoftConstraintScorer::new();
    let soft_score = scorer.score(&placements, store.snapshot().lessons.as_slice()).total;

    let mut explainer = Explainer::new();
    for need in &needs {
        let remaining = coverage.remaining_for(&need.class_id, &need.lesson_id);
        if remaining > 0 {
            explainer.log_failure(
                need.class_id.clone(),
                need.lesson_id.clone(),
                need.teacher_id.clone(),
                need.required_hours,
                need.required_hours - remaining,
                FailureReason::NoSlots,
            );
        }
    }

    Json(ExplainOut {
        coverage_pct: coverage.coverage_pct,
        soft_score,
        conflicts: conflicts.len(),
        report: explainer.analyze(),
    })
}
