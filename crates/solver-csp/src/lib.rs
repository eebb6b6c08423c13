//! Constraint-satisfaction placer (spec.md §4.8), grounded in `csp_solver.py`'s
//! `CSPVariable`/`CSPConstraint`/`ArcConsistency` trio.
//!
//! One `CspVariable` is created per *block* of a Need (as planned by `BlockPlanner`), not one
//! per Need: spec.md models "one variable per Need" but also requires block-coherence (I5/I7)
//! and same-day exclusion across a Need's own blocks (I8), which only has a natural expression
//! once a Need's hours are already split into blocks. Modeling at block granularity lets I8
//! fall out of the ordinary binary "no shared day" constraint between two variables of the
//! same Need, instead of a bespoke partition constraint bolted onto a Need-level variable.
//!
//! A variable's domain is a set of `(day, start_period)` anchors; its block occupies
//! `start_period..start_period+size`. Binary constraints connect any two variables that share
//! a class or a teacher (this also covers the same-Need case, since both blocks of one Need
//! share a class).

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use sched_core::{pick_room, AvailabilityCache, BlockPlanner, ConflictIndex, EntityStore, Explainer};
use types::{ClassId, Day, FailureReason, LessonId, Need, Placement, Slot, TeacherId, DAYS};

/// Ported from `local_search.py`: base 2000, scaled by class/teacher/complexity load, clamped
/// to `[1000, 20000]`.
pub fn adaptive_backtrack_limit(num_classes: usize, num_teachers: usize, avg_lessons_per_class: f64) -> u32 {
    let factor =
        ((num_classes as f64 / 10.0) * (num_teachers as f64 / 15.0) * (avg_lessons_per_class / 8.0)).max(1.0);
    (2000.0 * factor).clamp(1000.0, 20000.0) as u32
}

type Anchor = (Day, u32);

#[derive(Clone, Debug)]
struct CspVariable {
    need_index: usize,
    size: u32,
    class_id: ClassId,
    teacher_id: TeacherId,
    lesson_id: LessonId,
}

pub struct CspResult {
    pub placements: Vec<Placement>,
    pub residual: Vec<Need>,
    pub explainer: Explainer,
    /// Total backtracking attempts made (nodes expanded), for diagnostics.
    pub attempts: u32,
    pub budget_exceeded: bool,
}

pub struct CSPEngine;

impl CSPEngine {
    /// `index` carries any placements already committed by an earlier pass (e.g. StrictPlacer) -
    /// the initial domains are filtered against it so the search never reopens an occupied slot.
    /// `deadline` is checked at every backtracking node expansion (spec.md §4's cancellation
    /// requirement); a variable still unassigned when the deadline trips is reported via
    /// `FailureReason::BacktrackLimit`, same as hitting the attempt budget.
    pub fn solve(
        store: &dyn EntityStore,
        needs: &[Need],
        availability: &AvailabilityCache,
        index: &mut ConflictIndex,
        backtrack_limit: u32,
        deadline: Option<Instant>,
    ) -> CspResult {
        let periods_per_day = store.school_type().periods_per_day();

        let mut variables: Vec<CspVariable> = Vec::new();
        for (ni, need) in needs.iter().enumerate() {
            for size in BlockPlanner::plan(need.required_hours) {
                variables.push(CspVariable {
                    need_index: ni,
                    size,
                    class_id: need.class_id.clone(),
                    teacher_id: need.teacher_id.clone(),
                    lesson_id: need.lesson_id.clone(),
                });
            }
        }
        let n = variables.len();

        let mut domains: Vec<Vec<Anchor>> = Vec::with_capacity(n);
        for v in &variables {
            let mut d = Vec::new();
            if v.size <= periods_per_day {
                for &day in DAYS.iter() {
                    for start in 0..=(periods_per_day - v.size) {
                        let periods: Vec<u32> = (start..start + v.size).collect();
                        if Self::unary_ok(v, day, &periods, availability, index) {
                            d.push((day, start));
                        }
                    }
                }
            }
            domains.push(d);
        }
        let empty_at_start: HashSet<usize> = (0..n).filter(|&i| domains[i].is_empty()).collect();

        let mut neighbors: Vec<HashSet<usize>> = vec![HashSet::new(); n];
        for i in 0..n {
            for j in (i + 1)..n {
                if Self::shares_constraint(&variables[i], &variables[j]) {
                    neighbors[i].insert(j);
                    neighbors[j].insert(i);
                }
            }
        }

        Self::ac3(&variables, &mut domains, &neighbors, None);

        let mut assignment: Vec<Option<Anchor>> = vec![None; n];
        let mut attempts = 0u32;
        let mut time_exceeded = false;
        let solved = Self::backtrack(
            &variables,
            &mut domains,
            &neighbors,
            &mut assignment,
            backtrack_limit,
            &mut attempts,
            deadline,
            &mut time_exceeded,
        );
        let budget_exceeded = !solved && (attempts > backtrack_limit || time_exceeded);

        tracing::debug!(n, attempts, solved, "csp search finished");

        let mut placements = Vec::new();
        let mut explainer = Explainer::new();
        let mut residual_hours: std::collections::HashMap<usize, u32> = std::collections::HashMap::new();

        for (vi, var) in variables.iter().enumerate() {
            match assignment[vi] {
                Some((day, start)) => {
                    let periods: Vec<u32> = (start..start + var.size).collect();
                    // Room is not a CSP decision variable, so a block the search placed can still
                    // turn out unplaceable for real once rooms are considered (spec.md §4/I3) -
                    // check every period can get a real room before committing any of them, same
                    // as StrictPlacer's `block_compliant` does up front.
                    let rooms: Option<Vec<_>> = periods.iter().map(|&period| pick_room(store, index, day, period)).collect();
                    match rooms {
                        Some(rooms) => {
                            for (period, room_id) in periods.into_iter().zip(rooms) {
                                let p = Placement {
                                    class_id: var.class_id.clone(),
                                    teacher_id: var.teacher_id.clone(),
                                    lesson_id: var.lesson_id.clone(),
                                    room_id,
                                    day,
                                    period,
                                };
                                index.commit(&p);
                                placements.push(p);
                            }
                        }
                        None => {
                            *residual_hours.entry(var.need_index).or_insert(0) += var.size;
                            let need = &needs[var.need_index];
                            explainer.log_failure(
                                need.class_id.clone(),
                                need.lesson_id.clone(),
                                need.teacher_id.clone(),
                                need.required_hours,
                                0,
                                FailureReason::NoSlots,
                            );
                        }
                    }
                }
                None => {
                    *residual_hours.entry(var.need_index).or_insert(0) += var.size;
                    let need = &needs[var.need_index];
                    let reason = if empty_at_start.contains(&vi) {
                        FailureReason::DomainExhausted
                    } else if budget_exceeded {
                        FailureReason::BacktrackLimit
                    } else {
                        FailureReason::ConstraintViolation
                    };
                    explainer.log_failure(
                        need.class_id.clone(),
                        need.lesson_id.clone(),
                        need.teacher_id.clone(),
                        need.required_hours,
                        0,
                        reason,
                    );
                }
            }
        }

        let residual = residual_hours
            .into_iter()
            .map(|(ni, hours)| {
                let need = &needs[ni];
                Need {
                    class_id: need.class_id.clone(),
                    lesson_id: need.lesson_id.clone(),
                    teacher_id: need.teacher_id.clone(),
                    required_hours: hours,
                }
            })
            .collect();

        CspResult { placements, residual, explainer, attempts, budget_exceeded }
    }

    /// Class/teacher/availability feasibility only - room is a shared scarce resource assigned
    /// after backtracking finishes (see `solve`'s assignment loop), not a per-variable domain
    /// constraint, so there is nothing room-related to check against here yet.
    fn unary_ok(v: &CspVariable, day: Day, periods: &[u32], availability: &AvailabilityCache, index: &ConflictIndex) -> bool {
        for &period in periods {
            let candidate = Placement {
                class_id: v.class_id.clone(),
                teacher_id: v.teacher_id.clone(),
                lesson_id: v.lesson_id.clone(),
                room_id: "".into(),
                day,
                period,
            };
            if index
                .conflicts_for(&candidate)
                .iter()
                .any(|k| matches!(k, types::ConflictKind::Class | types::ConflictKind::Teacher))
            {
                return false;
            }
            if !availability.is_available(&v.teacher_id, Slot::new(day, period)) {
                return false;
            }
        }
        true
    }

    /// Whether a binary constraint connects `a` and `b` at all: shared class (which also
    /// covers two blocks of the same Need) or shared teacher (I1/I2).
    fn shares_constraint(a: &CspVariable, b: &CspVariable) -> bool {
        a.class_id == b.class_id || a.teacher_id == b.teacher_id
    }

    /// Whether value `av` for `a` and `bv` for `b` can coexist.
    fn compatible(a: &CspVariable, av: Anchor, b: &CspVariable, bv: Anchor) -> bool {
        if a.need_index == b.need_index {
            return av.0 != bv.0; // I8: a Need's own blocks never share a day
        }
        if a.class_id == b.class_id || a.teacher_id == b.teacher_id {
            if av.0 != bv.0 {
                return true;
            }
            let occupied: HashSet<u32> = (av.1..av.1 + a.size).collect();
            return !(bv.1..bv.1 + b.size).any(|p| occupied.contains(&p));
        }
        true
    }

    fn revise(variables: &[CspVariable], domains: &mut [Vec<Anchor>], i: usize, j: usize) -> bool {
        let before = domains[i].len();
        let dj = domains[j].clone();
        domains[i].retain(|&vi_val| dj.iter().any(|&vj_val| Self::compatible(&variables[i], vi_val, &variables[j], vj_val)));
        domains[i].len() != before
    }

    /// `seed = None` runs a full pass over every directed arc (the initial AC-3); `seed =
    /// Some(k)` restricts the starting queue to arcs incident to `k` (MAC after assigning `k`).
    fn ac3(variables: &[CspVariable], domains: &mut [Vec<Anchor>], neighbors: &[HashSet<usize>], seed: Option<usize>) -> bool {
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        match seed {
            None => {
                for i in 0..variables.len() {
                    for &j in &neighbors[i] {
                        queue.push_back((i, j));
                    }
                }
            }
            Some(k) => {
                for &i in &neighbors[k] {
                    queue.push_back((i, k));
                }
            }
        }

        while let Some((i, j)) = queue.pop_front() {
            if Self::revise(variables, domains, i, j) {
                if domains[i].is_empty() {
                    return false;
                }
                for &k in &neighbors[i] {
                    if k != j {
                        queue.push_back((k, i));
                    }
                }
            }
        }
        true
    }

    fn eliminated_count(variables: &[CspVariable], domains: &[Vec<Anchor>], neighbors: &[HashSet<usize>], vi: usize, val: Anchor) -> usize {
        let mut count = 0;
        for &nb in &neighbors[vi] {
            for &other in &domains[nb] {
                if !Self::compatible(&variables[vi], val, &variables[nb], other) {
                    count += 1;
                }
            }
        }
        count
    }

    #[allow(clippy::too_many_arguments)]
    fn backtrack(
        variables: &[CspVariable],
        domains: &mut Vec<Vec<Anchor>>,
        neighbors: &[HashSet<usize>],
        assignment: &mut Vec<Option<Anchor>>,
        limit: u32,
        attempts: &mut u32,
        deadline: Option<Instant>,
        time_exceeded: &mut bool,
    ) -> bool {
        if assignment.iter().all(|a| a.is_some()) {
            return true;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            *time_exceeded = true;
            return false;
        }

        let next = (0..variables.len())
            .filter(|&i| assignment[i].is_none())
            .min_by_key(|&i| (domains[i].len(), std::cmp::Reverse(neighbors[i].len())));
        let vi = match next {
            Some(vi) => vi,
            None => return true,
        };
        if domains[vi].is_empty() {
            return false;
        }

        let mut values = domains[vi].clone();
        values.sort_by_key(|&val| Self::eliminated_count(variables, domains, neighbors, vi, val));

        for val in values {
            *attempts += 1;
            if *attempts > limit {
                return false;
            }

            let saved = domains.clone();
            assignment[vi] = Some(val);
            domains[vi] = vec![val];

            if Self::ac3(variables, domains, neighbors, Some(vi))
                && Self::backtrack(variables, domains, neighbors, assignment, limit, attempts, deadline, time_exceeded)
            {
                return true;
            }

            *domains = saved;
            assignment[vi] = None;

            if *time_exceeded {
                return false;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::InMemoryStore;
    use types::{Class, Classroom, Lesson, SchoolType, Snapshot, Teacher};

    fn store_two_classes_one_teacher() -> InMemoryStore {
        InMemoryStore::new(Snapshot {
            school_type: SchoolType::HighSchool,
            classes: vec![
                Class { class_id: "c1".into(), name: "9A".into(), grade: 9, school_type: SchoolType::HighSchool },
                Class { class_id: "c2".into(), name: "9B".into(), grade: 9, school_type: SchoolType::HighSchool },
            ],
            teachers: vec![Teacher { teacher_id: "t1".into(), name: "Ada".into(), subject: "math".into() }],
            lessons: vec![Lesson {
                lesson_id: "math".into(),
                name: "Math".into(),
                school_type: SchoolType::HighSchool,
                is_difficult: true,
                is_light_activity: false,
            }],
            classrooms: vec![Classroom { room_id: "r1".into(), name: "101".into(), capacity: 30 }],
            curriculum: vec![],
            assignments: vec![],
            availability: vec![],
        })
    }

    #[test]
    fn places_a_single_two_hour_need_contiguously() {
        let store = store_two_classes_one_teacher();
        let needs = vec![Need { class_id: "c1".into(), lesson_id: "math".into(), teacher_id: "t1".into(), required_hours: 2 }];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);
        let result = CSPEngine::solve(&store, &needs, &availability, &mut index, 2000, None);

        assert_eq!(result.placements.len(), 2);
        assert!(result.residual.is_empty());
        let mut periods: Vec<u32> = result.placements.iter().map(|p| p.period).collect();
        periods.sort_unstable();
        assert_eq!(periods, vec![0, 1]);
    }

    #[test]
    fn same_teacher_two_classes_never_double_book() {
        let store = store_two_classes_one_teacher();
        let needs = vec![
            Need { class_id: "c1".into(), lesson_id: "math".into(), teacher_id: "t1".into(), required_hours: 2 },
            Need { class_id: "c2".into(), lesson_id: "math".into(), teacher_id: "t1".into(), required_hours: 2 },
        ];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);
        let result = CSPEngine::solve(&store, &needs, &availability, &mut index, 2000, None);

        assert_eq!(result.placements.len(), 4);
        let slots: HashSet<(Day, u32)> = result.placements.iter().map(|p| (p.day, p.period)).collect();
        assert_eq!(slots.len(), 4, "the shared teacher must never hold two placements at once");
    }

    #[test]
    fn pre_seeded_conflict_index_is_respected() {
        let store = store_two_classes_one_teacher();
        let needs = vec![Need { class_id: "c1".into(), lesson_id: "math".into(), teacher_id: "t1".into(), required_hours: 2 }];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);
        index.commit(&Placement {
            class_id: "c1".into(),
            teacher_id: "t1".into(),
            lesson_id: "other".into(),
            room_id: "r1".into(),
            day: Day::Mon,
            period: 0,
        });

        let result = CSPEngine::solve(&store, &needs, &availability, &mut index, 2000, None);
        assert_eq!(result.placements.len(), 2);
        assert!(result.placements.iter().all(|p| !(p.day == Day::Mon && p.period == 0)));
    }

    #[test]
    fn a_single_contested_room_sends_the_loser_to_residual_instead_of_a_fake_room() {
        let store = InMemoryStore::new(Snapshot {
            school_type: SchoolType::HighSchool,
            classes: vec![
                Class { class_id: "c1".into(), name: "9A".into(), grade: 9, school_type: SchoolType::HighSchool },
                Class { class_id: "c2".into(), name: "9B".into(), grade: 9, school_type: SchoolType::HighSchool },
            ],
            teachers: vec![
                Teacher { teacher_id: "t1".into(), name: "Ada".into(), subject: "math".into() },
                Teacher { teacher_id: "t2".into(), name: "Bea".into(), subject: "math".into() },
            ],
            lessons: vec![Lesson {
                lesson_id: "math".into(),
                name: "Math".into(),
                school_type: SchoolType::HighSchool,
                is_difficult: false,
                is_light_activity: false,
            }],
            classrooms: vec![Classroom { room_id: "r1".into(), name: "101".into(), capacity: 30 }],
            curriculum: vec![],
            assignments: vec![],
            availability: vec![],
        });
        let needs = vec![
            Need { class_id: "c1".into(), lesson_id: "math".into(), teacher_id: "t1".into(), required_hours: 1 },
            Need { class_id: "c2".into(), lesson_id: "math".into(), teacher_id: "t2".into(), required_hours: 1 },
        ];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(true);
        let result = CSPEngine::solve(&store, &needs, &availability, &mut index, 2000, None);

        assert_eq!(result.placements.len() + result.residual.iter().map(|n| n.required_hours).sum::<u32>() as usize, 2);
        assert!(ConflictIndex::check_all(&result.placements, true).is_empty());
    }

    #[test]
    fn adaptive_limit_is_clamped_into_range() {
        assert_eq!(adaptive_backtrack_limit(1, 1, 1.0), 1000);
        assert!(adaptive_backtrack_limit(1000, 1000, 1000.0) <= 20000);
    }
}
