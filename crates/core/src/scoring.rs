use std::collections::{BTreeMap, HashMap, HashSet};

use types::{ClassId, Day, Lesson, LessonId, Placement, TeacherId, DAYS};

use crate::priority::PriorityRegistry;

/// Raw (pre-weight) score per named rule plus the weighted total `SoftConstraintScorer::score`
/// returns. Kept around mainly so the explainer and the annealer's logging can cite which rule
/// moved when a candidate is accepted or rejected.
#[derive(Clone, Debug, Default)]
pub struct ScoreBreakdown {
    pub raw: BTreeMap<&'static str, f64>,
    pub total: f64,
}

fn stdev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Weighted sum over the eight named soft rules from spec §4.4, each a pure function of the
/// full placement list. Grounded in `soft_constraints.py`'s per-event deltas; weights are
/// pulled from a `PriorityRegistry` (defaulting to the `balanced` preset) rather than a fixed
/// table, per spec §4.4's "weights derive from PriorityRegistry".
pub struct SoftConstraintScorer {
    registry: PriorityRegistry,
}

impl Default for SoftConstraintScorer {
    fn default() -> Self {
        Self {
            registry: PriorityRegistry::default(),
        }
    }
}

impl SoftConstraintScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: PriorityRegistry) -> Self {
        Self { registry }
    }

    pub fn score(&self, placements: &[Placement], lessons: &[Lesson]) -> ScoreBreakdown {
        let lesson_by_id: HashMap<&LessonId, &Lesson> = lessons.iter().map(|l| (&l.lesson_id, l)).collect();

        let mut raw: BTreeMap<&'static str, f64> = BTreeMap::new();
        raw.insert("teacher_time_pref", Self::teacher_time_pref(placements));
        raw.insert("balanced_daily_load", Self::balanced_daily_load(placements));
        raw.insert("lesson_spacing", Self::lesson_spacing(placements));
        raw.insert("difficult_morning", Self::difficult_morning(placements, &lesson_by_id));
        raw.insert("teacher_load_balance", Self::teacher_load_balance(placements));
        raw.insert("consecutive_block_bonus", Self::consecutive_block_bonus(placements));
        raw.insert("no_gaps", Self::no_gaps(placements));
        raw.insert("lunch_light", Self::lunch_light(placements, &lesson_by_id));

        let total = raw
            .iter()
            .map(|(id, value)| value * self.registry.scoring_weight(id))
            .sum();

        ScoreBreakdown { raw, total }
    }

    /// `+2` for a placement in the morning (`period < 4`), `-1` for one in the late band
    /// (`period >= 6`).
    fn teacher_time_pref(placements: &[Placement]) -> f64 {
        placements
            .iter()
            .map(|p| if p.period < 4 { 2.0 } else if p.period >= 6 { -1.0 } else { 0.0 })
            .sum()
    }

    /// `-5 * stdev(daily hour counts)` per class, summed over classes.
    fn balanced_daily_load(placements: &[Placement]) -> f64 {
        let mut by_class: HashMap<&ClassId, [u32; 5]> = HashMap::new();
        for p in placements {
            by_class.entry(&p.class_id).or_insert([0; 5])[p.day.index()] += 1;
        }
        by_class
            .values()
            .map(|counts| -5.0 * stdev(&counts.iter().map(|&c| c as f64).collect::<Vec<_>>()))
            .sum()
    }

    /// For each `(class, lesson)`, walk the sorted distinct days it occupies and score the gap
    /// between consecutive occurrences: `+5` for a 2-3 day gap, `-2` for a 1-day gap, `-3` for
    /// a gap of 4 or more.
    fn lesson_spacing(placements: &[Placement]) -> f64 {
        let mut days_by_pair: HashMap<(&ClassId, &LessonId), HashSet<usize>> = HashMap::new();
        for p in placements {
            days_by_pair.entry((&p.class_id, &p.lesson_id)).or_default().insert(p.day.index());
        }
        let mut score = 0.0;
        for days in days_by_pair.values() {
            let mut sorted: Vec<usize> = days.iter().copied().collect();
            sorted.sort_unstable();
            for w in sorted.windows(2) {
                let gap = w[1] - w[0];
                score += match gap {
                    2 | 3 => 5.0,
                    1 => -2.0,
                    g if g >= 4 => -3.0,
                    _ => 0.0,
                };
            }
        }
        score
    }

    /// `+3` for a difficult lesson placed in the morning, `-3` for one placed in the late band.
    fn difficult_morning(placements: &[Placement], lesson_by_id: &HashMap<&LessonId, &Lesson>) -> f64 {
        placements
            .iter()
            .filter(|p| lesson_by_id.get(&p.lesson_id).map(|l| l.is_difficult).unwrap_or(false))
            .map(|p| if p.period <= 3 { 3.0 } else if p.period >= 6 { -3.0 } else { 0.0 })
            .sum()
    }

    /// `-3 * stdev(daily hour counts)` per teacher, summed over teachers.
    fn teacher_load_balance(placements: &[Placement]) -> f64 {
        let mut by_teacher: HashMap<&TeacherId, [u32; 5]> = HashMap::new();
        for p in placements {
            by_teacher.entry(&p.teacher_id).or_insert([0; 5])[p.day.index()] += 1;
        }
        by_teacher
            .values()
            .map(|counts| -3.0 * stdev(&counts.iter().map(|&c| c as f64).collect::<Vec<_>>()))
            .sum()
    }

    /// `+5` for each pair of adjacent periods on the same `(class, lesson, day)` - rewards
    /// keeping 2-hour blocks contiguous rather than fragmenting them.
    fn consecutive_block_bonus(placements: &[Placement]) -> f64 {
        let mut occupied: HashSet<(&ClassId, &LessonId, Day, u32)> = HashSet::new();
        for p in placements {
            occupied.insert((&p.class_id, &p.lesson_id, p.day, p.period));
        }
        let mut score = 0.0;
        for &(class_id, lesson_id, day, period) in &occupied {
            if period > 0 && occupied.contains(&(class_id, lesson_id, day, period - 1)) {
                continue;
            }
            if occupied.contains(&(class_id, lesson_id, day, period + 1)) {
                score += 5.0;
            }
        }
        score
    }

    /// `-10` per empty period strictly between a class's first and last occupied period on a
    /// given day - the classic "window" penalty.
    fn no_gaps(placements: &[Placement]) -> f64 {
        let mut by_class_day: HashMap<(&ClassId, Day), Vec<u32>> = HashMap::new();
        for p in placements {
            by_class_day.entry((&p.class_id, p.day)).or_default().push(p.period);
        }
        let mut score = 0.0;
        for periods in by_class_day.values() {
            let min = *periods.iter().min().unwrap();
            let max = *periods.iter().max().unwrap();
            if max <= min {
                continue;
            }
            let occupied: HashSet<u32> = periods.iter().copied().collect();
            let gaps = (min..=max).filter(|p| !occupied.contains(p)).count();
            score -= 10.0 * gaps as f64;
        }
        score
    }

    /// `+2` for a light-activity lesson at a lunch-adjacent slot (`period` in `{3, 4}`), `-1`
    /// for a non-light (heavy) lesson at the same slots.
    fn lunch_light(placements: &[Placement], lesson_by_id: &HashMap<&LessonId, &Lesson>) -> f64 {
        placements
            .iter()
            .filter(|p| p.period == 3 || p.period == 4)
            .map(|p| {
                let light = lesson_by_id.get(&p.lesson_id).map(|l| l.is_light_activity).unwrap_or(false);
                if light {
                    2.0
                } else {
                    -1.0
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::SchoolType;

    fn lesson(id: &str, difficult: bool, light: bool) -> Lesson {
        Lesson {
            lesson_id: id.into(),
            name: id.into(),
            school_type: SchoolType::HighSchool,
            is_difficult: difficult,
            is_light_activity: light,
        }
    }

    fn p(class: &str, teacher: &str, lesson: &str, day: Day, period: u32) -> Placement {
        Placement {
            class_id: class.into(),
            teacher_id: teacher.into(),
            lesson_id: lesson.into(),
            room_id: "r1".into(),
            day,
            period,
        }
    }

    #[test]
    fn empty_schedule_scores_zero() {
        let scorer = SoftConstraintScorer::new();
        let breakdown = scorer.score(&[], &[]);
        assert_eq!(breakdown.total, 0.0);
    }

    #[test]
    fn score_is_pure_and_idempotent() {
        let lessons = vec![lesson("math", true, false)];
        let placements = vec![
            p("c1", "t1", "math", Day::Mon, 0),
            p("c1", "t1", "math", Day::Mon, 1),
        ];
        let scorer = SoftConstraintScorer::new();
        let a = scorer.score(&placements, &lessons).total;
        let b = scorer.score(&placements, &lessons).total;
        assert_eq!(a, b);
    }

    #[test]
    fn consecutive_same_lesson_pair_is_rewarded_once() {
        let placements = vec![
            p("c1", "t1", "math", Day::Mon, 2),
            p("c1", "t1", "math", Day::Mon, 3),
        ];
        assert_eq!(SoftConstraintScorer::consecutive_block_bonus(&placements), 5.0);
    }

    #[test]
    fn a_single_gap_costs_ten() {
        let placements = vec![
            p("c1", "t1", "math", Day::Mon, 0),
            p("c1", "t2", "eng", Day::Mon, 2),
        ];
        assert_eq!(SoftConstraintScorer::no_gaps(&placements), -10.0);
    }
}
