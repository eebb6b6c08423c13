use std::collections::HashMap;

use types::{ClassId, LessonId, Need};

use crate::entity_store::EntityStore;

/// Turns the declarative (assignment + curriculum) tables into the scheduler's actual unit of
/// work: one `Need` per (class, lesson) carrying the weekly hour count that must be placed.
pub fn derive_needs(store: &dyn EntityStore) -> Vec<Need> {
    let mut hours_by_lesson_grade: HashMap<(LessonId, u32), u32> = HashMap::new();
    for entry in store.curriculum() {
        hours_by_lesson_grade.insert((entry.lesson_id.clone(), entry.grade), entry.weekly_hours);
    }

    let grade_by_class: HashMap<&ClassId, u32> = store.classes().iter().map(|c| (&c.class_id, c.grade)).collect();

    let mut needs = Vec::new();
    for a in store.assignments() {
        let Some(&grade) = grade_by_class.get(&a.class_id) else {
            continue;
        };
        let Some(&required_hours) = hours_by_lesson_grade.get(&(a.lesson_id.clone(), grade)) else {
            continue;
        };
        if required_hours == 0 {
            continue;
        }
        needs.push(Need {
            class_id: a.class_id.clone(),
            lesson_id: a.lesson_id.clone(),
            teacher_id: a.teacher_id.clone(),
            required_hours,
        });
    }
    needs
}
