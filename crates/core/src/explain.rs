use std::collections::{BTreeMap, HashMap};

use types::{ClassId, ExplainReport, Failure, FailureReason, LessonId, TeacherId};

fn reason_key(reason: FailureReason) -> &'static str {
    match reason {
        FailureReason::TeacherUnavailable => "teacher_unavailable",
        FailureReason::NoSlots => "no_available_slots",
        FailureReason::TeacherConflict => "teacher_conflict",
        FailureReason::ClassConflict => "class_conflict",
        FailureReason::DomainExhausted => "domain_exhausted",
        FailureReason::ConstraintViolation => "constraint_violation",
        FailureReason::BacktrackLimit => "backtrack_limit_exceeded",
    }
}

/// Accumulates structured placement failures during a run and, on request, turns them into a
/// frequency-keyed report plus a short list of human-readable recommendations. Owns no
/// scheduling decisions - placers call `log_failure`, the orchestrator calls `analyze` once at
/// the end. Grounded in `scheduler_explainer.py`'s `SchedulerExplainer`.
#[derive(Clone, Debug, Default)]
pub struct Explainer {
    failures: Vec<Failure>,
}

impl Explainer {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_failure(
        &mut self,
        class_id: ClassId,
        lesson_id: LessonId,
        teacher_id: TeacherId,
        required_hours: u32,
        scheduled_hours: u32,
        reason: FailureReason,
    ) {
        tracing::debug!(%class_id, %lesson_id, %teacher_id, ?reason, "scheduling failure recorded");
        self.failures.push(Failure {
            class_id,
            lesson_id,
            teacher_id,
            required_hours,
            scheduled_hours,
            reason,
        });
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    fn count(&self, reason: FailureReason) -> u64 {
        self.failures.iter().filter(|f| f.reason == reason).count() as u64
    }

    fn teacher_loads(&self) -> HashMap<&TeacherId, u32> {
        let mut loads: HashMap<&TeacherId, u32> = HashMap::new();
        for f in &self.failures {
            *loads.entry(&f.teacher_id).or_insert(0) += f.scheduled_hours;
        }
        loads
    }

    fn critical_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let unavailable = self.count(FailureReason::TeacherUnavailable);
        if unavailable > 5 {
            issues.push(format!(
                "teacher availability: {unavailable} placements failed because the assigned teacher was unavailable; review availability windows"
            ));
        }

        let no_slots = self.count(FailureReason::NoSlots);
        if no_slots > 5 {
            issues.push(format!(
                "slot shortage: {no_slots} lessons found no compliant slot; increase weekly periods or reduce class count"
            ));
        }

        let conflicts = self.count(FailureReason::TeacherConflict) + self.count(FailureReason::ClassConflict);
        if conflicts > 10 {
            issues.push(format!(
                "conflict pressure: {conflicts} teacher/class conflicts detected; add teachers or rebalance the lesson distribution"
            ));
        }

        let backtrack = self.count(FailureReason::BacktrackLimit);
        if backtrack > 0 {
            issues.push(format!(
                "backtrack limit: the search hit its backtrack budget {backtrack} time(s); the instance may be over-constrained"
            ));
        }

        let overloaded = self.teacher_loads().values().filter(|&&load| load > 30).count();
        if overloaded > 0 {
            issues.push(format!(
                "teacher overload: {overloaded} teacher(s) carry 30+ failed hours/week; consider hiring more teachers"
            ));
        }

        issues
    }

    fn recommendations(&self) -> Vec<String> {
        let mut recs = Vec::new();

        if self.count(FailureReason::TeacherUnavailable) > 0 {
            recs.push("extend teacher availability windows to open more candidate slots".to_string());
        }
        if self.count(FailureReason::NoSlots) > 0 {
            recs.push("increase the weekly period count (e.g. 7 -> 8) to create more room".to_string());
        }
        if self.count(FailureReason::DomainExhausted) > 0 {
            recs.push("reduce weekly hours for some lessons; CSP domains are exhausted".to_string());
        }
        if self.failures.len() > 10 {
            recs.push("the instance looks highly constrained; consider the Simple strategy instead".to_string());
        }

        let total_required: u64 = self.failures.iter().map(|f| f.required_hours as u64).sum();
        let total_scheduled: u64 = self.failures.iter().map(|f| f.scheduled_hours as u64).sum();
        let success_rate = if total_required == 0 {
            100.0
        } else {
            total_scheduled as f64 / total_required as f64 * 100.0
        };
        if success_rate < 80.0 {
            recs.push(format!(
                "success rate on failed needs is {success_rate:.1}%; consider reducing classes or lessons"
            ));
        }

        recs
    }

    pub fn analyze(&self) -> ExplainReport {
        if self.failures.is_empty() {
            return ExplainReport::default();
        }

        let mut reason_counts: BTreeMap<String, u64> = BTreeMap::new();
        for f in &self.failures {
            *reason_counts.entry(reason_key(f.reason).to_string()).or_insert(0) += 1;
        }

        ExplainReport {
            failures: self.failures.clone(),
            reason_counts,
            critical_issues: self.critical_issues(),
            recommendations: self.recommendations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_explainer_reports_nothing() {
        let explainer = Explainer::new();
        let report = explainer.analyze();
        assert_eq!(report.failures.len(), 0);
        assert!(report.critical_issues.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn reason_counts_are_keyed_by_frequency() {
        let mut explainer = Explainer::new();
        for _ in 0..3 {
            explainer.log_failure(
                "c1".into(),
                "math".into(),
                "t1".into(),
                2,
                0,
                FailureReason::TeacherUnavailable,
            );
        }
        let report = explainer.analyze();
        assert_eq!(report.reason_counts.get("teacher_unavailable"), Some(&3));
    }

    #[test]
    fn six_unavailable_failures_trip_the_critical_issue_threshold() {
        let mut explainer = Explainer::new();
        for _ in 0..6 {
            explainer.log_failure(
                "c1".into(),
                "math".into(),
                "t1".into(),
                2,
                0,
                FailureReason::TeacherUnavailable,
            );
        }
        let report = explainer.analyze();
        assert_eq!(report.critical_issues.len(), 1);
        assert!(report.recommendations.iter().any(|r| r.contains("availability")));
    }
}
