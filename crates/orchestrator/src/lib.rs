//! Strategy dispatch and arbitration (spec.md §4.11). Grounded in the teacher's
//! `DispatchSolver` (`api/src/state.rs`) for the "one `Solver` impl picks among sub-algorithms"
//! shape, and in `jobs/src/lib.rs`'s `tokio::spawn` race pattern for `Parallel`'s concurrency.
//!
//! Every strategy works on its own fresh `ConflictIndex` and `AvailabilityCache` built from the
//! same read-only `EntityStore` snapshot - spec.md §5's "no shared mutable state across
//! strategies" - so `Parallel` can run several at once without coordination.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use sched_core::{
    derive_needs, AvailabilityCache, ConflictIndex, CoverageAnalyzer, EntityStore, Explainer,
    InMemoryStore, Solver, SoftConstraintScorer,
};
use solver_csp::{adaptive_backtrack_limit, CSPEngine};
use solver_repair::{AggressiveFiller, Annealer, AnnealerConfig};
use solver_strict::{PlaceOptions, Phase, StrictPlacer};
use types::{
    BacktrackBudget, ClassId, Conflict, ExplainReport, Need, Placement, RelaxationPolicy,
    RoomPolicy, RunConfig, ScheduleResult, ScheduleStatus, SolveRequest, Strategy,
};

/// Bound on how many aggressive-filler rounds the `Hybrid` strategy is allowed to spend once
/// it escalates past `StrictPlacer` - spec.md §4.11's "never runs more than a bounded number
/// of aggressive iterations", set below `AggressiveFiller`'s own `max_iterations` default of
/// 5000 so Hybrid stays meaningfully cheaper than a dedicated gap-filling pass.
const HYBRID_MAX_AGGRESSIVE_ITERS: u32 = 2000;

/// Coverage threshold below which `Hybrid` escalates past `StrictPlacer` into the aggressive
/// filler (spec.md §4.11).
const HYBRID_ESCALATION_THRESHOLD: f64 = 95.0;

/// One strategy's raw output before it is turned into a `ScheduleResult` by `finalize`.
struct RunOutput {
    placements: Vec<Placement>,
    explainer: Explainer,
    relaxed_count: u32,
    stats: serde_json::Value,
}

/// The seam every placement strategy is dispatched through. Stateless - every call rebuilds
/// its working structures from the `EntityStore` it is handed, per spec.md §5.
#[derive(Clone, Copy, Debug, Default)]
pub struct Orchestrator;

impl Orchestrator {
    /// Resolves `Strategy::Auto` per spec.md §4.11's scale-based default: `<=5` classes ->
    /// Hybrid, `6..=20` -> Parallel if a worker pool is available else Hybrid, `>20` -> Simple.
    /// "Worker pool available" is grounded as more than one usable OS thread, since this
    /// workspace has no explicit thread-pool handle to query.
    pub fn default_strategy(num_classes: usize) -> Strategy {
        let worker_pool_available = std::thread::available_parallelism().map(|n| n.get() > 1).unwrap_or(false);
        match num_classes {
            0..=5 => Strategy::Hybrid,
            6..=20 if worker_pool_available => Strategy::Parallel,
            6..=20 => Strategy::Hybrid,
            _ => Strategy::Simple,
        }
    }

    fn resolve_strategy(store: &dyn EntityStore, config: &RunConfig) -> Strategy {
        match config.strategy {
            Strategy::Auto => Self::default_strategy(store.classes().len()),
            s => s,
        }
    }

    fn backtrack_limit(store: &dyn EntityStore, needs: &[Need], config: &RunConfig) -> u32 {
        match config.backtrack_budget {
            BacktrackBudget::Fixed { limit } => limit,
            BacktrackBudget::Auto => {
                let num_classes = store.classes().len();
                let num_teachers = store.teachers().len();
                let mut per_class: HashMap<&ClassId, u32> = HashMap::new();
                for n in needs {
                    *per_class.entry(&n.class_id).or_insert(0) += 1;
                }
                let avg_lessons_per_class = if per_class.is_empty() {
                    0.0
                } else {
                    per_class.values().sum::<u32>() as f64 / per_class.len() as f64
                };
                adaptive_backtrack_limit(num_classes, num_teachers, avg_lessons_per_class)
            }
        }
    }

    fn enforce_room(config: &RunConfig) -> bool {
        matches!(config.room_policy, RoomPolicy::Enforce)
    }

    /// spec.md §4.7: StrictPlacer only. The fastest, deterministic strategy.
    fn run_simple(store: &dyn EntityStore, needs: &[Need], config: &RunConfig, deadline: Option<Instant>) -> anyhow::Result<RunOutput> {
        let availability = AvailabilityCache::build(store);
        let mut index = ConflictIndex::new(Self::enforce_room(config));
        let result = StrictPlacer::place(store, needs, &availability, &mut index, &PlaceOptions::default(), deadline);
        Ok(RunOutput {
            placements: result.placements,
            explainer: result.explainer,
            relaxed_count: result.relaxed_count,
            stats: serde_json::json!({ "residual_needs": result.residual.len() }),
        })
    }

    /// spec.md §4.11: StrictPlacer, then - if coverage is still under 95% - a relaxed
    /// `StrictPlacer` retry on the residual (spec.md §4.7's own aggressive-phase fallback, for
    /// needs of 4+ hours) followed by a bounded `AggressiveFiller` pass on whatever slots are
    /// still empty.
    fn run_hybrid(store: &dyn EntityStore, needs: &[Need], config: &RunConfig, deadline: Option<Instant>) -> anyhow::Result<RunOutput> {
        let availability = AvailabilityCache::build(store);
        let mut index = ConflictIndex::new(Self::enforce_room(config));
        let primary = StrictPlacer::place(store, needs, &availability, &mut index, &PlaceOptions::default(), deadline);

        let mut placements = primary.placements;
        let mut explainer = primary.explainer;
        let mut relaxed_count = primary.relaxed_count;
        let mut residual = primary.residual;

        let coverage = CoverageAnalyzer::analyze(needs, &placements);
        let mut escalated = false;
        let mut filler_stats = serde_json::json!(null);

        if coverage.coverage_pct < HYBRID_ESCALATION_THRESHOLD {
            escalated = true;

            if matches!(config.relaxation_policy, RelaxationPolicy::AllowAfterIters(_)) && !residual.is_empty() {
                let retry = StrictPlacer::place(
                    store,
                    &residual,
                    &availability,
                    &mut index,
                    &PlaceOptions { phase: Phase::Aggressive },
                    deadline,
                );
                placements.extend(retry.placements);
                relaxed_count += retry.relaxed_count;
                residual = retry.residual;
                for f in retry.explainer.failures() {
                    explainer.log_failure(
                        f.class_id.clone(),
                        f.lesson_id.clone(),
                        f.teacher_id.clone(),
                        f.required_hours,
                        f.scheduled_hours,
                        f.reason,
                    );
                }
            }

            let allow_relaxation = !matches!(config.relaxation_policy, RelaxationPolicy::Strict);
            let filler = AggressiveFiller::fill(
                store,
                needs,
                &mut placements,
                &availability,
                &mut index,
                config.seed,
                HYBRID_MAX_AGGRESSIVE_ITERS,
                allow_relaxation,
                deadline,
            )?;
            relaxed_count += filler.relaxed_count;
            filler_stats = serde_json::json!({
                "iterations_run": filler.iterations_run,
                "duplicates_removed": filler.duplicates_removed,
                "relaxed_count": filler.relaxed_count,
            });
            for f in filler.explainer.failures() {
                explainer.log_failure(
                    f.class_id.clone(),
                    f.lesson_id.clone(),
                    f.teacher_id.clone(),
                    f.required_hours,
                    f.scheduled_hours,
                    f.reason,
                );
            }
        }

        Ok(RunOutput {
            placements,
            explainer,
            relaxed_count,
            stats: serde_json::json!({ "escalated": escalated, "aggressive_filler": filler_stats }),
        })
    }

    /// spec.md §4.8: `CSPEngine` over every Need, adaptive backtrack budget.
    fn run_csp_full(store: &dyn EntityStore, needs: &[Need], config: &RunConfig, deadline: Option<Instant>) -> anyhow::Result<RunOutput> {
        let availability = AvailabilityCache::build(store);
        let mut index = ConflictIndex::new(Self::enforce_room(config));
        let limit = Self::backtrack_limit(store, needs, config);
        let result = CSPEngine::solve(store, needs, &availability, &mut index, limit, deadline);
        Ok(RunOutput {
            placements: result.placements,
            explainer: result.explainer,
            relaxed_count: 0,
            stats: serde_json::json!({
                "attempts": result.attempts,
                "backtrack_limit": limit,
                "budget_exceeded": result.budget_exceeded,
                "residual_needs": result.residual.len(),
            }),
        })
    }

    /// spec.md §4.10: `StrictPlacer` builds a hard-constraint-satisfying seed, then `Annealer`
    /// optimizes the soft score while never regressing below that seed's feasibility.
    fn run_annealed(store: &dyn EntityStore, needs: &[Need], config: &RunConfig, deadline: Option<Instant>) -> anyhow::Result<RunOutput> {
        let availability = AvailabilityCache::build(store);
        let mut index = ConflictIndex::new(Self::enforce_room(config));
        let seed_run = StrictPlacer::place(store, needs, &availability, &mut index, &PlaceOptions::default(), deadline);

        let lessons = store.lessons().to_vec();
        let scorer = SoftConstraintScorer::new();
        let anneal_config = AnnealerConfig {
            seed: config.seed,
            ..AnnealerConfig::default()
        };
        let enforce_room = Self::enforce_room(config);
        let anneal = Annealer::run(seed_run.placements, &lessons, &scorer, &availability, enforce_room, &anneal_config, deadline);

        Ok(RunOutput {
            placements: anneal.placements,
            explainer: seed_run.explainer,
            relaxed_count: seed_run.relaxed_count,
            stats: serde_json::json!({
                "anneal_iterations": anneal.iterations,
                "best_score": anneal.best_score,
                "residual_needs": seed_run.residual.len(),
            }),
        })
    }

    /// spec.md §4.11's `Parallel`: race Simple, Hybrid and Annealed, each against its own
    /// `ConflictIndex`, and arbitrate on `score`. Compute-bound placers run on the blocking
    /// thread pool so none of them ever shares a runtime worker mid-algorithm.
    async fn run_parallel(store: Arc<dyn EntityStore>, needs: Vec<Need>, config: RunConfig, deadline: Option<Instant>) -> anyhow::Result<(Strategy, RunOutput)> {
        let candidates = [Strategy::Simple, Strategy::Hybrid, Strategy::Annealed];

        let started = Instant::now();
        let mut handles = Vec::new();
        for strategy in candidates {
            let store = store.clone();
            let needs = needs.clone();
            let config = config.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let out = match strategy {
                    Strategy::Simple => Self::run_simple(store.as_ref(), &needs, &config, deadline),
                    Strategy::Hybrid => Self::run_hybrid(store.as_ref(), &needs, &config, deadline),
                    Strategy::Annealed => Self::run_annealed(store.as_ref(), &needs, &config, deadline),
                    _ => unreachable!("candidate list only names Simple/Hybrid/Annealed"),
                };
                (strategy, out)
            }));
        }

        let enforce_room = Self::enforce_room(&config);
        let mut best: Option<(Strategy, RunOutput, f64)> = None;
        for handle in handles {
            let Ok((strategy, out)) = handle.await else {
                continue; // a panicking strategy forfeits the race, never the whole run
            };
            let out = match out {
                Ok(out) => out,
                Err(e) => {
                    tracing::error!(?strategy, error = %e, "strategy aborted on an internal error, forfeiting the race");
                    continue;
                }
            };
            let elapsed_secs = started.elapsed().as_secs_f64();
            let score = arbitration_score(&needs, &out.placements, enforce_room, elapsed_secs);
            let replace = match &best {
                None => true,
                Some((_, _, best_score)) => score > *best_score,
            };
            if replace {
                best = Some((strategy, out, score));
            }
        }

        let (strategy, out, _) = best.ok_or_else(|| anyhow::anyhow!("every parallel strategy aborted on an internal error"))?;
        Ok((strategy, out))
    }

    /// Runs a solve against an already-validated store, dispatching and arbitrating exactly as
    /// spec.md §4.11 describes. This is the entry point both the job queue and direct callers
    /// use; `Solver::solve` below only adds the `EntityStore` construction and input validation
    /// spec.md §7 requires before a run starts.
    pub async fn run(store: Arc<dyn EntityStore>, config: RunConfig) -> anyhow::Result<ScheduleResult> {
        let started = Instant::now();
        let deadline = Some(started + Duration::from_secs(config.max_wall_time_secs));
        let needs = derive_needs(store.as_ref());
        let strategy = Self::resolve_strategy(store.as_ref(), &config);
        tracing::info!(?strategy, requested = ?config.strategy, needs = needs.len(), "strategy selected");

        let (strategy_used, out) = match strategy {
            Strategy::Simple => (Strategy::Simple, Self::run_simple(store.as_ref(), &needs, &config, deadline)?),
            Strategy::Hybrid => (Strategy::Hybrid, Self::run_hybrid(store.as_ref(), &needs, &config, deadline)?),
            Strategy::CspFull => (Strategy::CspFull, Self::run_csp_full(store.as_ref(), &needs, &config, deadline)?),
            Strategy::Annealed => (Strategy::Annealed, Self::run_annealed(store.as_ref(), &needs, &config, deadline)?),
            Strategy::Parallel => Self::run_parallel(store.clone(), needs.clone(), config.clone(), deadline).await?,
            Strategy::Auto => unreachable!("resolve_strategy never returns Auto"),
        };

        let result = finalize(store.as_ref(), &needs, out, strategy_used, started, Self::enforce_room(&config));
        tracing::info!(
            status = ?result.status,
            coverage_pct = result.coverage_pct,
            conflicts = result.conflicts.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "run finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl Solver for Orchestrator {
    async fn solve(&self, req: SolveRequest) -> anyhow::Result<ScheduleResult> {
        let store: Arc<dyn EntityStore> = Arc::new(InMemoryStore::new(req.snapshot));
        sched_core::validate(store.as_ref())?;
        Self::run(store, req.config).await
    }
}

/// spec.md §4.11: `score = coverage_pct - 10*|conflicts| + time_bonus + entries_bonus`.
fn arbitration_score(needs: &[Need], placements: &[Placement], enforce_room: bool, elapsed_secs: f64) -> f64 {
    let coverage = CoverageAnalyzer::analyze(needs, placements);
    let conflicts = ConflictIndex::check_all(placements, enforce_room).len();

    let time_bonus = if elapsed_secs < 10.0 {
        10.0
    } else if elapsed_secs < 30.0 {
        5.0
    } else if elapsed_secs < 60.0 {
        2.0
    } else {
        0.0
    };

    let expected: u64 = needs.iter().map(|n| n.required_hours as u64).sum();
    let placed: u64 = needs
        .iter()
        .map(|n| coverage.scheduled_for(&n.class_id, &n.lesson_id).min(n.required_hours) as u64)
        .sum();
    let entries_bonus = if expected == 0 {
        10.0
    } else {
        (10.0 * placed as f64 / expected as f64).min(10.0)
    };

    coverage.coverage_pct - 10.0 * conflicts as f64 + time_bonus + entries_bonus
}

fn finalize(
    store: &dyn EntityStore,
    needs: &[Need],
    out: RunOutput,
    strategy_used: Strategy,
    started: Instant,
    enforce_room: bool,
) -> ScheduleResult {
    let elapsed_secs = started.elapsed().as_secs_f64();
    let mut placements = out.placements;
    let room_conflicts_repaired = ConflictIndex::dedupe_conflicts(&mut placements, enforce_room);
    if room_conflicts_repaired > 0 {
        tracing::warn!(
            ?strategy_used,
            dropped = room_conflicts_repaired,
            "dropped conflicting placements at finalize - StrictPlacer/CSPEngine don't room-check pre-commit"
        );
    }
    let coverage = CoverageAnalyzer::analyze(needs, &placements);
    let conflicts: Vec<Conflict> = ConflictIndex::check_all(&placements, enforce_room);

    let lessons = store.lessons().to_vec();
    let scorer = SoftConstraintScorer::new();
    let score = scorer.score(&placements, &lessons).total;

    let status = if needs.is_empty() || coverage.is_complete() {
        ScheduleStatus::Complete
    } else if placements.is_empty() {
        ScheduleStatus::Infeasible
    } else {
        ScheduleStatus::Partial
    };

    let explain: ExplainReport = out.explainer.analyze();

    let mut stats = out.stats;
    if let serde_json::Value::Object(ref mut map) = stats {
        map.insert("elapsed_secs".to_string(), serde_json::json!(elapsed_secs));
        map.insert("relaxed_count".to_string(), serde_json::json!(out.relaxed_count));
        map.insert("room_conflicts_repaired".to_string(), serde_json::json!(room_conflicts_repaired));
    }

    ScheduleResult {
        status,
        placements,
        conflicts,
        score,
        coverage_pct: coverage.coverage_pct,
        strategy_used,
        explain,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::InMemoryStore;
    use types::{Class, Classroom, CurriculumEntry, Lesson, SchoolType, Snapshot, Teacher};

    fn snapshot_one_class_two_hour_lesson() -> Snapshot {
        Snapshot {
            school_type: SchoolType::HighSchool,
            classes: vec![Class { class_id: "c1".into(), name: "9A".into(), grade: 9, school_type: SchoolType::HighSchool }],
            teachers: vec![Teacher { teacher_id: "t1".into(), name: "Ada".into(), subject: "math".into() }],
            lessons: vec![Lesson {
                lesson_id: "math".into(),
                name: "Math".into(),
                school_type: SchoolType::HighSchool,
                is_difficult: true,
                is_light_activity: false,
            }],
            classrooms: vec![Classroom { room_id: "r1".into(), name: "101".into(), capacity: 30 }],
            curriculum: vec![CurriculumEntry { lesson_id: "math".into(), grade: 9, weekly_hours: 2 }],
            assignments: vec![types::Assignment { class_id: "c1".into(), lesson_id: "math".into(), teacher_id: "t1".into() }],
            availability: vec![],
        }
    }

    #[tokio::test]
    async fn simple_strategy_places_the_two_hour_block_and_reports_complete() {
        let store: Arc<dyn EntityStore> = Arc::new(InMemoryStore::new(snapshot_one_class_two_hour_lesson()));
        let config = RunConfig { strategy: Strategy::Simple, ..RunConfig::default() };
        let result = Orchestrator::run(store, config).await.unwrap();

        assert_eq!(result.status, ScheduleStatus::Complete);
        assert_eq!(result.placements.len(), 2);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.strategy_used, Strategy::Simple);
    }

    #[tokio::test]
    async fn auto_strategy_resolves_to_hybrid_for_a_small_instance() {
        let store: Arc<dyn EntityStore> = Arc::new(InMemoryStore::new(snapshot_one_class_two_hour_lesson()));
        let config = RunConfig::default();
        let result = Orchestrator::run(store, config).await.unwrap();

        assert_eq!(result.strategy_used, Strategy::Hybrid);
        assert_eq!(result.status, ScheduleStatus::Complete);
    }

    #[tokio::test]
    async fn csp_full_strategy_also_reaches_completion_on_a_trivial_instance() {
        let store: Arc<dyn EntityStore> = Arc::new(InMemoryStore::new(snapshot_one_class_two_hour_lesson()));
        let config = RunConfig { strategy: Strategy::CspFull, ..RunConfig::default() };
        let result = Orchestrator::run(store, config).await.unwrap();

        assert_eq!(result.strategy_used, Strategy::CspFull);
        assert_eq!(result.status, ScheduleStatus::Complete);
    }

    #[tokio::test]
    async fn parallel_strategy_never_shares_conflicts_and_picks_a_winner() {
        let store: Arc<dyn EntityStore> = Arc::new(InMemoryStore::new(snapshot_one_class_two_hour_lesson()));
        let config = RunConfig { strategy: Strategy::Parallel, ..RunConfig::default() };
        let result = Orchestrator::run(store, config).await.unwrap();

        assert!(matches!(result.strategy_used, Strategy::Simple | Strategy::Hybrid | Strategy::Annealed));
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn default_strategy_follows_the_scale_table() {
        assert_eq!(Orchestrator::default_strategy(0), Strategy::Hybrid);
        assert_eq!(Orchestrator::default_strategy(5), Strategy::Hybrid);
        assert_eq!(Orchestrator::default_strategy(21), Strategy::Simple);
    }
}
