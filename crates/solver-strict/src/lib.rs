//! The primary placer (spec.md §4.7): greedy, block-preserving, pressure-aware. Grounded in
//! `enhanced_strict_scheduler.py` - class-then-need ordering, slot-pressure-sorted candidate
//! search, and the must-block rule for 2-hour Needs (no any-slot fallback when
//! `required_hours == 2`).

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use sched_core::{pick_room, would_create_three_consecutive, AvailabilityCache, BlockPlanner, ConflictIndex, EntityStore, Explainer};
use types::{ClassId, Day, FailureReason, LessonId, Need, Placement, DAYS};

/// Whether this invocation runs under the orchestrator's normal pass or its aggressive
/// (gap-filling) phase. Only the aggressive phase may use the relaxed-availability fallback,
/// and only for Needs with `required_hours >= 4` (spec.md §4.7).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Normal,
    Aggressive,
}

pub struct PlaceOptions {
    pub phase: Phase,
}

impl Default for PlaceOptions {
    fn default() -> Self {
        Self { phase: Phase::Normal }
    }
}

pub struct StrictResult {
    pub placements: Vec<Placement>,
    /// Needs that could not be fully placed, carrying only the unplaced hour shortfall.
    pub residual: Vec<Need>,
    pub explainer: Explainer,
    pub relaxed_count: u32,
}

/// Slot pressure: how many placements (across every class) already compete for a `(day,
/// period)` pair. Candidates are tried in ascending pressure order to spread load.
type Pressure = HashMap<(Day, u32), u32>;

pub struct StrictPlacer;

impl StrictPlacer {
    /// `deadline` is checked once per Need (spec.md §4's cancellation-at-iteration-boundary
    /// requirement applied to the outer placement loop); a Need reached after the deadline, and
    /// every Need still queued behind it, is reported unplaced in full rather than partially
    /// attempted.
    pub fn place(
        store: &dyn EntityStore,
        needs: &[Need],
        availability: &AvailabilityCache,
        index: &mut ConflictIndex,
        opts: &PlaceOptions,
        deadline: Option<Instant>,
    ) -> StrictResult {
        let mut placements = Vec::new();
        let mut explainer = Explainer::new();
        let mut pressure: Pressure = HashMap::new();
        let mut residual = Vec::new();
        let mut relaxed_count = 0u32;
        let mut cancelled = false;

        let periods_per_day = store.school_type().periods_per_day();
        let grade_by_class: HashMap<&ClassId, u32> =
            store.classes().iter().map(|c| (&c.class_id, c.grade)).collect();
        let lesson_name: HashMap<&LessonId, &str> =
            store.lessons().iter().map(|l| (&l.lesson_id, l.name.as_str())).collect();

        let mut by_class: HashMap<&ClassId, Vec<&Need>> = HashMap::new();
        for n in needs {
            by_class.entry(&n.class_id).or_default().push(n);
        }

        // Sort classes by grade descending so higher-grade constraints settle first; break
        // ties on id for determinism (P12).
        let mut classes: Vec<&ClassId> = by_class.keys().copied().collect();
        classes.sort_by(|a, b| {
            let ga = grade_by_class.get(*a).copied().unwrap_or(0);
            let gb = grade_by_class.get(*b).copied().unwrap_or(0);
            gb.cmp(&ga).then_with(|| a.0.cmp(&b.0))
        });

        for class_id in classes {
            let mut class_needs = by_class.remove(class_id).expect("class present in map");
            class_needs.sort_by(|a, b| {
                b.required_hours
                    .cmp(&a.required_hours)
                    .then_with(|| lesson_name.get(&a.lesson_id).cmp(&lesson_name.get(&b.lesson_id)))
            });

            for need in class_needs {
                if cancelled || deadline.is_some_and(|d| Instant::now() >= d) {
                    cancelled = true;
                    residual.push(need.clone());
                    continue;
                }
                let shortfall = Self::place_need(
                    store,
                    need,
                    availability,
                    index,
                    &mut pressure,
                    periods_per_day,
                    opts,
                    &mut placements,
                    &mut explainer,
                    &mut relaxed_count,
                );
                if shortfall > 0 {
                    residual.push(Need {
                        class_id: need.class_id.clone(),
                        lesson_id: need.lesson_id.clone(),
                        teacher_id: need.teacher_id.clone(),
                        required_hours: shortfall,
                    });
                }
            }
        }

        StrictResult { placements, residual, explainer, relaxed_count }
    }

    /// Places every block of one Need in turn. Returns the unplaced hour count (0 if the Need
    /// was fully satisfied).
    #[allow(clippy::too_many_arguments)]
    fn place_need(
        store: &dyn EntityStore,
        need: &Need,
        availability: &AvailabilityCache,
        index: &mut ConflictIndex,
        pressure: &mut Pressure,
        periods_per_day: u32,
        opts: &PlaceOptions,
        placements: &mut Vec<Placement>,
        explainer: &mut Explainer,
        relaxed_count: &mut u32,
    ) -> u32 {
        let blocks = BlockPlanner::plan(need.required_hours);
        let must_block = need.required_hours == 2;

        let mut used_days: HashSet<Day> = HashSet::new();
        // Periods already placed today for this exact (class, lesson) - scoped locally since
        // I6 only ever compares within one (class, day, lesson) triple.
        let mut day_periods: HashMap<Day, Vec<u32>> = HashMap::new();
        let mut shortfall = 0u32;

        for size in blocks {
            let placed = Self::place_block(
                store,
                need,
                size,
                availability,
                index,
                pressure,
                periods_per_day,
                &mut used_days,
                &mut day_periods,
                false,
                placements,
            );
            if placed {
                continue;
            }

            if must_block {
                // The 2-hour invariant (P7): no any-slot or relaxed fallback permitted.
                let reason = Self::classify_failure(
                    store, need, size, availability, index, periods_per_day, &used_days, &day_periods,
                );
                explainer.log_failure(
                    need.class_id.clone(),
                    need.lesson_id.clone(),
                    need.teacher_id.clone(),
                    need.required_hours,
                    0,
                    reason,
                );
                shortfall += size;
                continue;
            }

            // Any-slot fallback: ignore pressure, any compliant (day, start).
            let any_slot_placed = Self::place_block(
                store,
                need,
                size,
                availability,
                index,
                pressure,
                periods_per_day,
                &mut used_days,
                &mut day_periods,
                true,
                placements,
            );
            if any_slot_placed {
                continue;
            }

            // Relaxed fallback: aggressive phase only, and only for 4+ hour Needs - I4 waived.
            if opts.phase == Phase::Aggressive && need.required_hours >= 4 {
                if Self::place_block_relaxed(
                    store,
                    need,
                    size,
                    index,
                    pressure,
                    periods_per_day,
                    &mut used_days,
                    &mut day_periods,
                    placements,
                ) {
                    *relaxed_count += 1;
                    continue;
                }
            }

            let reason = Self::classify_failure(
                store, need, size, availability, index, periods_per_day, &used_days, &day_periods,
            );
            explainer.log_failure(
                need.class_id.clone(),
                need.lesson_id.clone(),
                need.teacher_id.clone(),
                need.required_hours,
                0,
                reason,
            );
            shortfall += size;
        }

        shortfall
    }

    /// Tries to place one block of `size` contiguous periods. When `ignore_pressure` is false,
    /// candidates are tried in ascending slot-pressure order (the normal pass); when true, in
    /// plain `(day, start)` order (the any-slot fallback). Honors I1, I2, I4, I6, I8.
    #[allow(clippy::too_many_arguments)]
    fn place_block(
        store: &dyn EntityStore,
        need: &Need,
        size: u32,
        availability: &AvailabilityCache,
        index: &mut ConflictIndex,
        pressure: &mut Pressure,
        periods_per_day: u32,
        used_days: &mut HashSet<Day>,
        day_periods: &mut HashMap<Day, Vec<u32>>,
        ignore_pressure: bool,
        placements: &mut Vec<Placement>,
    ) -> bool {
        let mut candidates = Self::candidate_anchors(periods_per_day, size, used_days);

        if !ignore_pressure {
            candidates.sort_by_key(|&(day, start)| {
                let p: u32 = (start..start + size).map(|s| pressure.get(&(day, s)).copied().unwrap_or(0)).sum();
                (p, day.index(), start)
            });
        }

        for (day, start) in candidates {
            let periods: Vec<u32> = (start..start + size).collect();
            if !Self::block_compliant(store, need, day, &periods, availability, index, day_periods, true) {
                continue;
            }
            Self::commit_block(store, need, day, &periods, index, pressure, used_days, day_periods, placements);
            return true;
        }
        false
    }

    /// Relaxed variant: same candidate scan but with I4 (availability) waived.
    #[allow(clippy::too_many_arguments)]
    fn place_block_relaxed(
        store: &dyn EntityStore,
        need: &Need,
        size: u32,
        index: &mut ConflictIndex,
        pressure: &mut Pressure,
        periods_per_day: u32,
        used_days: &mut HashSet<Day>,
        day_periods: &mut HashMap<Day, Vec<u32>>,
        placements: &mut Vec<Placement>,
    ) -> bool {
        let candidates = Self::candidate_anchors(periods_per_day, size, used_days);
        for (day, start) in candidates {
            let periods: Vec<u32> = (start..start + size).collect();
            if !Self::block_compliant(
                store,
                need,
                day,
                &periods,
                // availability is intentionally not consulted in relaxed mode
                &AvailabilityCache::default(),
                index,
                day_periods,
                false,
            ) {
                continue;
            }
            Self::commit_block(store, need, day, &periods, index, pressure, used_days, day_periods, placements);
            return true;
        }
        false
    }

    fn candidate_anchors(periods_per_day: u32, size: u32, used_days: &HashSet<Day>) -> Vec<(Day, u32)> {
        let mut out = Vec::new();
        for &day in DAYS.iter() {
            if used_days.contains(&day) {
                continue; // I8: distinct blocks of the same (class, lesson) use distinct days
            }
            if size > periods_per_day {
                continue;
            }
            for start in 0..=(periods_per_day - size) {
                out.push((day, start));
            }
        }
        out
    }

    fn block_compliant(
        store: &dyn EntityStore,
        need: &Need,
        day: Day,
        periods: &[u32],
        availability: &AvailabilityCache,
        index: &ConflictIndex,
        day_periods: &HashMap<Day, Vec<u32>>,
        check_availability: bool,
    ) -> bool {
        for &period in periods {
            let candidate = Placement {
                class_id: need.class_id.clone(),
                teacher_id: need.teacher_id.clone(),
                lesson_id: need.lesson_id.clone(),
                room_id: "".into(),
                day,
                period,
            };
            if index.conflicts_for(&candidate).iter().any(|k| {
                matches!(k, types::ConflictKind::Class | types::ConflictKind::Teacher)
            }) {
                return false;
            }
            if check_availability && !availability.is_available(&need.teacher_id, types::Slot::new(day, period)) {
                return false;
            }
            // I3: a block is only compliant if every period in it can still get a real room -
            // commit_block must never fall back to a conflicting or fake room.
            if pick_room(store, index, day, period).is_none() {
                return false;
            }
        }
        let existing = day_periods.get(&day).cloned().unwrap_or_default();
        !would_create_three_consecutive(&existing, periods)
    }

    #[allow(clippy::too_many_arguments)]
    fn commit_block(
        store: &dyn EntityStore,
        need: &Need,
        day: Day,
        periods: &[u32],
        index: &mut ConflictIndex,
        pressure: &mut Pressure,
        used_days: &mut HashSet<Day>,
        day_periods: &mut HashMap<Day, Vec<u32>>,
        placements: &mut Vec<Placement>,
    ) {
        for &period in periods {
            let room_id = pick_room(store, index, day, period).unwrap_or_else(|| "".into());
            let p = Placement {
                class_id: need.class_id.clone(),
                teacher_id: need.teacher_id.clone(),
                lesson_id: need.lesson_id.clone(),
                room_id,
                day,
                period,
            };
            index.commit(&p);
            *pressure.entry((day, period)).or_insert(0) += 1;
            placements.push(p);
        }
        used_days.insert(day);
        day_periods.entry(day).or_default().extend_from_slice(periods);
    }

    /// Post-hoc classification of why a block failed, for the Explainer. Re-scans ignoring I4
    /// to see whether availability alone was the blocker.
    #[allow(clippy::too_many_arguments)]
    fn classify_failure(
        store: &dyn EntityStore,
        need: &Need,
        size: u32,
        availability: &AvailabilityCache,
        index: &ConflictIndex,
        periods_per_day: u32,
        used_days: &HashSet<Day>,
        day_periods: &HashMap<Day, Vec<u32>>,
    ) -> FailureReason {
        let _ = store;
        let candidates = Self::candidate_anchors(periods_per_day, size, used_days);
        let mut any_conflict_free_ignoring_availability = false;
        for (day, start) in &candidates {
            let periods: Vec<u32> = (*start..*start + size).collect();
            if Self::block_compliant(store, need, *day, &periods, availability, index, day_periods, false) {
                any_conflict_free_ignoring_availability = true;
                break;
            }
        }
        if any_conflict_free_ignoring_availability {
            FailureReason::TeacherUnavailable
        } else {
            FailureReason::NoSlots
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::InMemoryStore;
    use types::{Availability, Class, Classroom, CurriculumEntry, Lesson, SchoolType, Snapshot, Teacher};

    fn base_snapshot() -> Snapshot {
        Snapshot {
            school_type: SchoolType::HighSchool,
            classes: vec![Class {
                class_id: "c1".into(),
                name: "9A".into(),
                grade: 9,
                school_type: SchoolType::HighSchool,
            }],
            teachers: vec![Teacher {
                teacher_id: "t1".into(),
                name: "Ada".into(),
                subject: "math".into(),
            }],
            lessons: vec![Lesson {
                lesson_id: "math".into(),
                name: "Math".into(),
                school_type: SchoolType::HighSchool,
                is_difficult: true,
                is_light_activity: false,
            }],
            classrooms: vec![Classroom {
                room_id: "r1".into(),
                name: "101".into(),
                capacity: 30,
            }],
            curriculum: vec![],
            assignments: vec![],
            availability: vec![],
        }
    }

    #[test]
    fn s1_minimal_single_class_single_lesson_places_a_contiguous_two_block() {
        let store = InMemoryStore::new(base_snapshot());
        let needs = vec![Need {
            class_id: "c1".into(),
            lesson_id: "math".into(),
            teacher_id: "t1".into(),
            required_hours: 2,
        }];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);
        let result = StrictPlacer::place(&store, &needs, &availability, &mut index, &PlaceOptions::default(), None);

        assert_eq!(result.placements.len(), 2);
        assert!(result.residual.is_empty());
        let mut periods: Vec<u32> = result.placements.iter().map(|p| p.period).collect();
        periods.sort_unstable();
        assert_eq!(periods, vec![0, 1]);
        let day = result.placements[0].day;
        assert!(result.placements.iter().all(|p| p.day == day));
    }

    #[test]
    fn s2_six_hours_decompose_into_three_two_blocks_on_distinct_days() {
        let store = InMemoryStore::new(base_snapshot());
        let needs = vec![Need {
            class_id: "c1".into(),
            lesson_id: "math".into(),
            teacher_id: "t1".into(),
            required_hours: 6,
        }];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);
        let result = StrictPlacer::place(&store, &needs, &availability, &mut index, &PlaceOptions::default(), None);

        assert_eq!(result.placements.len(), 6);
        let days: std::collections::HashSet<Day> = result.placements.iter().map(|p| p.day).collect();
        assert_eq!(days.len(), 3);
    }

    #[test]
    fn s3_teacher_unavailable_all_day_forces_shift_off_that_day() {
        let mut snapshot = base_snapshot();
        for period in 0..SchoolType::HighSchool.periods_per_day() {
            snapshot.availability.push(Availability {
                teacher_id: "t1".into(),
                day: Day::Mon,
                period,
                available: false,
            });
        }
        let store = InMemoryStore::new(snapshot);
        let needs = vec![Need {
            class_id: "c1".into(),
            lesson_id: "math".into(),
            teacher_id: "t1".into(),
            required_hours: 4,
        }];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);
        let result = StrictPlacer::place(&store, &needs, &availability, &mut index, &PlaceOptions::default(), None);

        assert_eq!(result.placements.len(), 4);
        assert!(result.placements.iter().all(|p| p.day != Day::Mon));
        let days: std::collections::HashSet<Day> = result.placements.iter().map(|p| p.day).collect();
        assert_eq!(days.len(), 2);
    }

    #[test]
    fn must_block_need_never_falls_back_to_any_slot() {
        // Pin every slot on every day except one isolated period so a 2-hour block can never
        // land contiguously; the Need must fail rather than split into 1+1.
        let mut snapshot = base_snapshot();
        snapshot.curriculum.push(CurriculumEntry {
            lesson_id: "math".into(),
            grade: 9,
            weekly_hours: 2,
        });
        let store = InMemoryStore::new(snapshot);
        let needs = vec![Need {
            class_id: "c1".into(),
            lesson_id: "math".into(),
            teacher_id: "t1".into(),
            required_hours: 2,
        }];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);

        // Pre-occupy every second period across the week so no two consecutive periods are
        // ever both free for this teacher's class.
        for &day in DAYS.iter() {
            for period in (1..SchoolType::HighSchool.periods_per_day()).step_by(2) {
                index.commit(&Placement {
                    class_id: "other".into(),
                    teacher_id: "t1".into(),
                    lesson_id: "other".into(),
                    room_id: "r1".into(),
                    day,
                    period,
                });
            }
        }

        let result = StrictPlacer::place(&store, &needs, &availability, &mut index, &PlaceOptions::default(), None);
        assert!(result.placements.is_empty());
        assert_eq!(result.residual.len(), 1);
        assert_eq!(result.residual[0].required_hours, 2);
    }
}
