//! Coverage-first repair loop (spec.md §4.9), grounded in `ultra_aggressive_scheduler.py`:
//! pick the worst-covered class, try a random empty slot, escalate to scanning every empty
//! cell with availability (I4) relaxed once the normal pass stalls, and finish with a
//! mandatory duplicate-removal validation pass.

use std::collections::HashMap;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use sched_core::{pick_room, would_create_three_consecutive, AvailabilityCache, ConflictIndex, Coverage, CoverageAnalyzer, EntityStore, Explainer, IndexError};
use types::{ClassId, FailureReason, Need, Placement, Slot, DAYS};

const NO_IMPROVEMENT_THRESHOLD: u32 = 50;

pub struct FillerResult {
    pub relaxed_count: u32,
    pub iterations_run: u32,
    pub explainer: Explainer,
    pub duplicates_removed: u32,
}

pub struct AggressiveFiller;

impl AggressiveFiller {
    /// Mutates `placements` and `index` in place, filling empty cells up to `max_iterations`
    /// rounds. `needs` is the full (not residual) need set - coverage is measured against it.
    /// `allow_relaxation` gates step 4's escalation to I4-relaxed placement (spec.md §9's open
    /// question on whether deployments want relaxation at all, surfaced here via
    /// `RunConfig.relaxation_policy`); when `false` the loop keeps retrying non-relaxed slots
    /// until `max_iterations` rather than ever waiving availability. `deadline` is checked once
    /// per outer-loop round alongside `max_iterations` (spec.md §4's cancellation requirement).
    #[allow(clippy::too_many_arguments)]
    pub fn fill(
        store: &dyn EntityStore,
        needs: &[Need],
        placements: &mut Vec<Placement>,
        availability: &AvailabilityCache,
        index: &mut ConflictIndex,
        seed: u64,
        max_iterations: u32,
        allow_relaxation: bool,
        deadline: Option<Instant>,
    ) -> Result<FillerResult, IndexError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut explainer = Explainer::new();
        let mut relaxed_count = 0u32;
        let periods_per_day = store.school_type().periods_per_day();
        let class_ids: Vec<ClassId> = store.classes().iter().map(|c| c.class_id.clone()).collect();

        let mut by_class: HashMap<ClassId, Vec<&Need>> = HashMap::new();
        for n in needs {
            by_class.entry(n.class_id.clone()).or_default().push(n);
        }

        let mut no_improvement = 0u32;
        let mut iterations = 0u32;
        let mut aggressive = false;

        loop {
            if iterations >= max_iterations || deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            let coverage = CoverageAnalyzer::analyze(needs, placements);
            if coverage.is_complete() {
                break;
            }
            iterations += 1;

            let slot_cov = CoverageAnalyzer::slot_coverage(&class_ids, placements, periods_per_day);
            let Some(target) = class_ids
                .iter()
                .min_by(|a, b| slot_cov.pct_for(a).partial_cmp(&slot_cov.pct_for(b)).unwrap())
                .cloned()
            else {
                break;
            };

            let placed = if !aggressive {
                let empty = CoverageAnalyzer::empty_slots(&target, placements, periods_per_day);
                match empty.choose(&mut rng) {
                    Some(&slot) => Self::try_fill_slot(store, &by_class, &coverage, &target, slot, availability, index, placements, true),
                    None => false,
                }
            } else {
                let mut found = false;
                'outer: for &day in DAYS.iter() {
                    for period in 0..periods_per_day {
                        let slot = Slot::new(day, period);
                        if Self::try_fill_slot(store, &by_class, &coverage, &target, slot, availability, index, placements, false) {
                            found = true;
                            relaxed_count += 1;
                            tracing::debug!(class_id = %target, day = ?day, period, "aggressive mode relaxed I4 to fill a slot");
                            break 'outer;
                        }
                    }
                }
                found
            };

            if placed {
                no_improvement = 0;
            } else {
                no_improvement += 1;
                if allow_relaxation && no_improvement >= NO_IMPROVEMENT_THRESHOLD {
                    aggressive = true;
                }
            }
        }

        let duplicates_removed = Self::remove_duplicate_conflicts(placements, index)?;

        let final_coverage = CoverageAnalyzer::analyze(needs, placements);
        for need in needs {
            let remaining = final_coverage.remaining_for(&need.class_id, &need.lesson_id);
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

        Ok(FillerResult { relaxed_count, iterations_run: iterations, explainer, duplicates_removed })
    }

    #[allow(clippy::too_many_arguments)]
    fn try_fill_slot(
        store: &dyn EntityStore,
        by_class: &HashMap<ClassId, Vec<&Need>>,
        coverage: &Coverage,
        class_id: &ClassId,
        slot: Slot,
        availability: &AvailabilityCache,
        index: &mut ConflictIndex,
        placements: &mut Vec<Placement>,
        check_availability: bool,
    ) -> bool {
        let Some(candidates) = by_class.get(class_id) else {
            return false;
        };
        for need in candidates {
            if coverage.remaining_for(&need.class_id, &need.lesson_id) == 0 {
                continue;
            }
            let candidate = Placement {
                class_id: need.class_id.clone(),
                teacher_id: need.teacher_id.clone(),
                lesson_id: need.lesson_id.clone(),
                room_id: "".into(),
                day: slot.day,
                period: slot.period,
            };
            if !index.is_free(&candidate) {
                continue;
            }
            if check_availability && !availability.is_available(&need.teacher_id, slot) {
                continue;
            }
            let existing: Vec<u32> = placements
                .iter()
                .filter(|p| p.class_id == need.class_id && p.lesson_id == need.lesson_id && p.day == slot.day)
                .map(|p| p.period)
                .collect();
            if would_create_three_consecutive(&existing, &[slot.period]) {
                continue;
            }
            // I3: no real room, no placement - never fall back to a fake/conflicting room_id.
            let Some(room_id) = pick_room(store, index, slot.day, slot.period) else {
                continue;
            };
            let p = Placement { room_id, ..candidate };
            index.commit(&p);
            placements.push(p);
            return true;
        }
        false
    }

    /// Mandatory exit step: re-validate the full placement list independent of the incremental
    /// index, and drop every placement but the first in each conflicting group. Finding any
    /// conflict here at all means the incremental index and the placement list have already
    /// diverged (every commit path is gated on `is_free`) - spec.md §4.2/§7's `IndexDesync`
    /// case - so each dropped duplicate is unwound through `index.remove` rather than papered
    /// over by rebuilding the index from the surviving placements.
    fn remove_duplicate_conflicts(placements: &mut Vec<Placement>, index: &mut ConflictIndex) -> Result<u32, IndexError> {
        let enforce_room = index.enforce_room();
        let drop = ConflictIndex::conflicting_indices(placements, enforce_room);
        if drop.is_empty() {
            return Ok(0);
        }

        for &pos in &drop {
            index.remove(&placements[pos])?;
        }

        let mut i = 0;
        placements.retain(|_| {
            let keep = !drop.contains(&i);
            i += 1;
            keep
        });

        Ok(drop.len() as u32)
    }
}
