pub mod aggressive_filler;
pub mod annealer;

pub use aggressive_filler::{AggressiveFiller, FillerResult};
pub use annealer::{AnnealResult, Annealer, AnnealerConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{AvailabilityCache, ConflictIndex, InMemoryStore, SoftConstraintScorer};
    use types::{Class, Classroom, Day, Lesson, Need, Placement, SchoolType, Snapshot, Teacher};

    fn store() -> InMemoryStore {
        InMemoryStore::new(Snapshot {
            school_type: SchoolType::HighSchool,
            classes: vec![Class { class_id: "c1".into(), name: "9A".into(), grade: 9, school_type: SchoolType::HighSchool }],
            teachers: vec![Teacher { teacher_id: "t1".into(), name: "Ada".into(), subject: "math".into() }],
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
        })
    }

    #[test]
    fn filler_reaches_full_coverage_from_empty() {
        let store = store();
        let needs = vec![Need { class_id: "c1".into(), lesson_id: "math".into(), teacher_id: "t1".into(), required_hours: 2 }];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);
        let mut placements = Vec::new();

        let result = AggressiveFiller::fill(&store, &needs, &mut placements, &availability, &mut index, 7, 5000, true, None).unwrap();

        assert_eq!(placements.len(), 2);
        assert_eq!(result.duplicates_removed, 0);
        assert!(result.explainer.is_empty());
    }

    #[test]
    fn filler_stops_at_max_iterations_on_an_unsatisfiable_need() {
        let store = store();
        // Required hours exceed what a single week can ever hold for one class/lesson pair
        // isn't really possible here, so instead starve the teacher of every slot.
        let mut snapshot = store.snapshot().clone();
        for &day in types::DAYS.iter() {
            for period in 0..SchoolType::HighSchool.periods_per_day() {
                snapshot.availability.push(types::Availability { teacher_id: "t1".into(), day, period, available: false });
            }
        }
        let store = InMemoryStore::new(snapshot);
        let needs = vec![Need { class_id: "c1".into(), lesson_id: "math".into(), teacher_id: "t1".into(), required_hours: 2 }];
        let availability = AvailabilityCache::build(&store);
        let mut index = ConflictIndex::new(false);
        let mut placements = Vec::new();

        let result = AggressiveFiller::fill(&store, &needs, &mut placements, &availability, &mut index, 1, 200, true, None).unwrap();

        assert!(result.iterations_run <= 200);
        assert!(!result.explainer.is_empty());
    }

    #[test]
    fn annealer_never_lowers_the_best_observed_score() {
        let lessons = vec![Lesson {
            lesson_id: "math".into(),
            name: "Math".into(),
            school_type: SchoolType::HighSchool,
            is_difficult: false,
            is_light_activity: false,
        }];
        let placements = vec![
            Placement { class_id: "c1".into(), teacher_id: "t1".into(), lesson_id: "math".into(), room_id: "r1".into(), day: Day::Mon, period: 0 },
            Placement { class_id: "c1".into(), teacher_id: "t1".into(), lesson_id: "math".into(), room_id: "r1".into(), day: Day::Mon, period: 1 },
        ];
        let scorer = SoftConstraintScorer::new();
        let availability = AvailabilityCache::default();
        let config = AnnealerConfig { initial_temperature: 50.0, cooling_rate: 0.5, min_temperature: 10.0, iters_per_temp: 5, seed: 3 };

        let before = scorer.score(&placements, &lessons).total;
        let result = Annealer::run(placements, &lessons, &scorer, &availability, false, &config, None);

        assert!(result.best_score >= before);
        assert_eq!(result.placements.len(), 2);
    }
}
