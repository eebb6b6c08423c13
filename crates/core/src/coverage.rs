use std::collections::{HashMap, HashSet};

use types::{ClassId, LessonId, Need, Placement, Slot, DAYS};

/// Per-need scheduled-hours tally plus the overall percentage the aggressive filler and the
/// orchestrator both watch to decide whether another pass is worth running.
#[derive(Clone, Debug, Default)]
pub struct Coverage {
    pub scheduled_hours: HashMap<(ClassId, LessonId), u32>,
    pub required_hours: HashMap<(ClassId, LessonId), u32>,
    pub coverage_pct: f64,
}

impl Coverage {
    pub fn scheduled_for(&self, class_id: &ClassId, lesson_id: &LessonId) -> u32 {
        self.scheduled_hours
            .get(&(class_id.clone(), lesson_id.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn remaining_for(&self, class_id: &ClassId, lesson_id: &LessonId) -> u32 {
        let required = self
            .required_hours
            .get(&(class_id.clone(), lesson_id.clone()))
            .copied()
            .unwrap_or(0);
        required.saturating_sub(self.scheduled_for(class_id, lesson_id))
    }

    pub fn is_complete(&self) -> bool {
        self.required_hours
            .iter()
            .all(|(k, &req)| self.scheduled_hours.get(k).copied().unwrap_or(0) >= req)
    }
}

/// Per-class and global grid fill ratios - the complement view to `Coverage`'s curricular
/// tally. Grounded in `ultra_aggressive_scheduler.py`'s `_analyze_coverage`.
#[derive(Clone, Debug, Default)]
pub struct SlotCoverage {
    pub filled_by_class: HashMap<ClassId, u32>,
    pub total_slots_per_class: u32,
    pub global_filled: u32,
    pub global_total: u32,
}

impl SlotCoverage {
    pub fn pct_for(&self, class_id: &ClassId) -> f64 {
        if self.total_slots_per_class == 0 {
            return 100.0;
        }
        let filled = self.filled_by_class.get(class_id).copied().unwrap_or(0);
        filled as f64 / self.total_slots_per_class as f64 * 100.0
    }

    pub fn global_pct(&self) -> f64 {
        if self.global_total == 0 {
            100.0
        } else {
            self.global_filled as f64 / self.global_total as f64 * 100.0
        }
    }
}

pub struct CoverageAnalyzer;

impl CoverageAnalyzer {
    /// Grid fill ratio per class (`filled / 5*periods_per_day`) and globally
    /// (`filled / |classes|*5*periods_per_day`).
    pub fn slot_coverage(class_ids: &[ClassId], placements: &[Placement], periods_per_day: u32) -> SlotCoverage {
        let total_slots_per_class = DAYS.len() as u32 * periods_per_day;

        let mut filled_sets: HashMap<&ClassId, HashSet<Slot>> = HashMap::new();
        for p in placements {
            filled_sets.entry(&p.class_id).or_default().insert(Slot::new(p.day, p.period));
        }

        let mut filled_by_class = HashMap::new();
        let mut global_filled = 0u32;
        for class_id in class_ids {
            let filled = filled_sets.get(class_id).map(|s| s.len() as u32).unwrap_or(0);
            filled_by_class.insert(class_id.clone(), filled);
            global_filled += filled;
        }

        SlotCoverage {
            filled_by_class,
            total_slots_per_class,
            global_filled,
            global_total: total_slots_per_class * class_ids.len() as u32,
        }
    }

    /// The complement of one class's occupied `(day, period)` set within the full weekly grid,
    /// in stable `(day, period)` order - used by the aggressive filler to pick deterministic
    /// gap-filling targets.
    pub fn empty_slots(class_id: &ClassId, placements: &[Placement], periods_per_day: u32) -> Vec<Slot> {
        let occupied: HashSet<Slot> = placements
            .iter()
            .filter(|p| &p.class_id == class_id)
            .map(|p| Slot::new(p.day, p.period))
            .collect();

        let mut empty = Vec::new();
        for &day in DAYS.iter() {
            for period in 0..periods_per_day {
                let slot = Slot::new(day, period);
                if !occupied.contains(&slot) {
                    empty.push(slot);
                }
            }
        }
        empty
    }

    pub fn analyze(needs: &[Need], placements: &[Placement]) -> Coverage {
        let mut required_hours = HashMap::new();
        for n in needs {
            required_hours.insert((n.class_id.clone(), n.lesson_id.clone()), n.required_hours);
        }

        let mut scheduled_hours: HashMap<(ClassId, LessonId), u32> = HashMap::new();
        for p in placements {
            *scheduled_hours.entry((p.class_id.clone(), p.lesson_id.clone())).or_insert(0) += 1;
        }

        let total_required: u64 = required_hours.values().map(|&v| v as u64).sum();
        let total_scheduled: u64 = required_hours
            .keys()
            .map(|k| scheduled_hours.get(k).copied().unwrap_or(0).min(required_hours[k]) as u64)
            .sum();
        let coverage_pct = if total_required == 0 {
            100.0
        } else {
            total_scheduled as f64 / total_required as f64 * 100.0
        };

        Coverage {
            scheduled_hours,
            required_hours,
            coverage_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Day;

    #[test]
    fn empty_needs_is_fully_covered() {
        let cov = CoverageAnalyzer::analyze(&[], &[]);
        assert_eq!(cov.coverage_pct, 100.0);
        assert!(cov.is_complete());
    }

    #[test]
    fn partial_coverage_reports_percentage() {
        let needs = vec![Need {
            class_id: "c1".into(),
            lesson_id: "math".into(),
            teacher_id: "t1".into(),
            required_hours: 4,
        }];
        let placements = vec![Placement {
            class_id: "c1".into(),
            teacher_id: "t1".into(),
            lesson_id: "math".into(),
            room_id: "r1".into(),
            day: Day::Mon,
            period: 0,
        }];
        let cov = CoverageAnalyzer::analyze(&needs, &placements);
        assert_eq!(cov.coverage_pct, 25.0);
        assert!(!cov.is_complete());
    }

    #[test]
    fn empty_slots_excludes_occupied_and_keeps_stable_order() {
        let placements = vec![Placement {
            class_id: "c1".into(),
            teacher_id: "t1".into(),
            lesson_id: "math".into(),
            room_id: "r1".into(),
            day: Day::Mon,
            period: 0,
        }];
        let empty = CoverageAnalyzer::empty_slots(&"c1".into(), &placements, 7);
        assert_eq!(empty.len(), 5 * 7 - 1);
        assert!(!empty.contains(&Slot::new(Day::Mon, 0)));
        assert_eq!(empty[0], Slot::new(Day::Mon, 1));
    }

    #[test]
    fn slot_coverage_splits_filled_per_class_and_globally() {
        let placements = vec![Placement {
            class_id: "c1".into(),
            teacher_id: "t1".into(),
            lesson_id: "math".into(),
            room_id: "r1".into(),
            day: Day::Mon,
            period: 0,
        }];
        let classes = vec!["c1".into(), "c2".into()];
        let cov = CoverageAnalyzer::slot_coverage(&classes, &placements, 7);
        assert_eq!(cov.total_slots_per_class, 35);
        assert_eq!(cov.global_total, 70);
        assert_eq!(cov.global_filled, 1);
        assert_eq!(cov.pct_for(&"c2".into()), 0.0);
    }
}
